//! Wire-level tests for bind handling and the bind-response hook.
//!
//! The raw tests speak LDAP through the `ldap3_proto` codec so they can
//! observe the notice of disconnect and the closed transport directly.

use std::time::Duration;

use bindstorm_directory::resources::DEFAULT_LDIF;
use bindstorm_directory::{EmbeddedDirectory, KeepSession};
use futures::{SinkExt, StreamExt};
use ldap3::{LdapConnAsync, Scope, SearchEntry};
use ldap3_proto::proto::{LdapBindCred, LdapBindRequest, LdapMsg, LdapOp, LdapResultCode};
use ldap3_proto::LdapCodec;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

const BASE_DN: &str = "o=sevenSeas";
const PRINCIPAL: &str = "cn=Horatio Hornblower,ou=people,o=sevenSeas";
const SECRET: &str = "secret";
const NOTICE_OF_DISCONNECT_OID: &str = "1.3.6.1.4.1.1466.20036";

// =============================================================================
// Test Helpers
// =============================================================================

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

async fn start(directory: EmbeddedDirectory) -> EmbeddedDirectory {
    init_test_logging();
    let mut directory = directory;
    directory.start().await.unwrap();
    directory.apply_ldif(DEFAULT_LDIF).unwrap();
    directory
}

async fn seven_seas() -> EmbeddedDirectory {
    start(EmbeddedDirectory::with_base_dn(BASE_DN).unwrap()).await
}

async fn seven_seas_keep_sessions() -> EmbeddedDirectory {
    start(
        EmbeddedDirectory::with_base_dn(BASE_DN)
            .unwrap()
            .with_bind_hook(KeepSession),
    )
    .await
}

async fn raw_connect(port: u16) -> Framed<TcpStream, LdapCodec> {
    let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    Framed::new(stream, LdapCodec::default())
}

fn bind_request(msgid: i32, dn: &str, password: &str) -> LdapMsg {
    LdapMsg {
        msgid,
        op: LdapOp::BindRequest(LdapBindRequest {
            dn: dn.to_string(),
            cred: LdapBindCred::Simple(password.to_string()),
        }),
        ctrl: Vec::new(),
    }
}

async fn next_msg(framed: &mut Framed<TcpStream, LdapCodec>) -> Option<LdapMsg> {
    match tokio::time::timeout(Duration::from_secs(5), framed.next())
        .await
        .expect("server response timed out")
    {
        Some(Ok(msg)) => Some(msg),
        _ => None,
    }
}

fn bind_code(msg: &LdapMsg) -> LdapResultCode {
    match &msg.op {
        LdapOp::BindResponse(resp) => resp.res.code.clone(),
        other => panic!("expected bind response, got {other:?}"),
    }
}

fn assert_notice_of_disconnect(msg: &LdapMsg) {
    assert_eq!(msg.msgid, 0, "notices are unsolicited");
    match &msg.op {
        LdapOp::ExtendedResponse(resp) => {
            assert_eq!(resp.name.as_deref(), Some(NOTICE_OF_DISCONNECT_OID));
            assert_eq!(resp.res.code, LdapResultCode::Unavailable);
        }
        other => panic!("expected notice of disconnect, got {other:?}"),
    }
}

async fn wait_for_no_sessions(directory: &EmbeddedDirectory) {
    for _ in 0..50 {
        if directory.active_sessions() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("sessions still registered: {}", directory.active_sessions());
}

// =============================================================================
// Disconnect-after-bind Tests
// =============================================================================

#[tokio::test]
async fn test_successful_bind_then_disconnect() {
    let mut directory = seven_seas().await;
    let mut framed = raw_connect(directory.bound_port().unwrap()).await;

    framed.send(bind_request(1, PRINCIPAL, SECRET)).await.unwrap();

    let response = next_msg(&mut framed).await.expect("bind response");
    assert_eq!(response.msgid, 1);
    assert_eq!(bind_code(&response), LdapResultCode::Success);

    let notice = next_msg(&mut framed).await.expect("notice of disconnect");
    assert_notice_of_disconnect(&notice);

    // The transport is closed after the notice.
    assert!(next_msg(&mut framed).await.is_none());
    wait_for_no_sessions(&directory).await;

    directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_failed_bind_also_disconnects() {
    let mut directory = seven_seas().await;
    let mut framed = raw_connect(directory.bound_port().unwrap()).await;

    framed.send(bind_request(1, PRINCIPAL, "wrong")).await.unwrap();

    let response = next_msg(&mut framed).await.expect("bind response");
    assert_eq!(bind_code(&response), LdapResultCode::InvalidCredentials);

    let notice = next_msg(&mut framed).await.expect("notice of disconnect");
    assert_notice_of_disconnect(&notice);
    assert!(next_msg(&mut framed).await.is_none());

    directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_reusing_disconnected_session_fails() {
    let mut directory = seven_seas().await;
    let mut framed = raw_connect(directory.bound_port().unwrap()).await;

    framed.send(bind_request(1, PRINCIPAL, SECRET)).await.unwrap();
    next_msg(&mut framed).await.expect("bind response");
    next_msg(&mut framed).await.expect("notice of disconnect");
    assert!(next_msg(&mut framed).await.is_none());

    // A second bind on the same transport gets no answer.
    let _ = framed.send(bind_request(2, PRINCIPAL, SECRET)).await;
    assert!(next_msg(&mut framed).await.is_none());

    directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_ldap3_bind_succeeds_once_per_connection() {
    let mut directory = seven_seas().await;
    let url = format!("ldap://127.0.0.1:{}", directory.bound_port().unwrap());

    for _ in 0..5 {
        let (conn, mut ldap) = LdapConnAsync::new(&url).await.unwrap();
        ldap3::drive!(conn);

        let result = ldap.simple_bind(PRINCIPAL, SECRET).await.unwrap();
        assert_eq!(result.rc, 0);
        let _ = ldap.unbind().await;
    }

    wait_for_no_sessions(&directory).await;
    directory.stop().await.unwrap();
}

// =============================================================================
// KeepSession Tests
// =============================================================================

#[tokio::test]
async fn test_keep_session_allows_whoami_and_search() {
    let mut directory = seven_seas_keep_sessions().await;
    let url = format!("ldap://127.0.0.1:{}", directory.bound_port().unwrap());

    let (conn, mut ldap) = LdapConnAsync::new(&url).await.unwrap();
    ldap3::drive!(conn);

    ldap.simple_bind(PRINCIPAL, SECRET)
        .await
        .unwrap()
        .success()
        .unwrap();
    assert_eq!(directory.active_sessions(), 1);

    let (exop, _res) = ldap
        .extended(ldap3::exop::WhoAmI)
        .await
        .unwrap()
        .success()
        .unwrap();
    let whoami: ldap3::exop::WhoAmIResp = exop.parse();
    assert_eq!(
        whoami.authzid,
        "dn:cn=Horatio Hornblower,ou=people,o=sevenSeas"
    );

    let (entries, _res) = ldap
        .search(BASE_DN, Scope::Subtree, "(objectClass=person)", vec!["sn"])
        .await
        .unwrap()
        .success()
        .unwrap();
    assert_eq!(entries.len(), 1);
    let person = SearchEntry::construct(entries.into_iter().next().unwrap());
    assert_eq!(person.attrs["sn"], vec!["Hornblower".to_string()]);
    assert!(!person.attrs.contains_key("userPassword"));

    ldap.unbind().await.unwrap();
    wait_for_no_sessions(&directory).await;
    directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_search_unknown_base_is_no_such_object() {
    let mut directory = seven_seas_keep_sessions().await;
    let url = format!("ldap://127.0.0.1:{}", directory.bound_port().unwrap());

    let (conn, mut ldap) = LdapConnAsync::new(&url).await.unwrap();
    ldap3::drive!(conn);

    let result = ldap
        .search("ou=ships,o=sevenSeas", Scope::Base, "(objectClass=*)", vec!["*"])
        .await
        .unwrap();
    assert_eq!(result.1.rc, 32);

    ldap.unbind().await.unwrap();
    directory.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_notifies_open_sessions() {
    let mut directory = seven_seas_keep_sessions().await;
    let mut framed = raw_connect(directory.bound_port().unwrap()).await;

    framed.send(bind_request(1, PRINCIPAL, SECRET)).await.unwrap();
    let response = next_msg(&mut framed).await.expect("bind response");
    assert_eq!(bind_code(&response), LdapResultCode::Success);

    directory.stop().await.unwrap();

    let notice = next_msg(&mut framed).await.expect("notice on shutdown");
    assert_notice_of_disconnect(&notice);
    assert!(next_msg(&mut framed).await.is_none());
}
