//! LDAP sessions
//!
//! One task per accepted connection. Requests are decoded with the
//! `ldap3_proto` codec, answered by the [`DirectoryService`], and every bind
//! response is passed through the installed [`BindResponseHook`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use ldap3_proto::proto::{
    LdapBindResponse, LdapFilter, LdapMsg, LdapOp, LdapPartialAttribute, LdapResult,
    LdapResultCode, LdapSearchResultEntry, LdapSearchScope,
};
use ldap3_proto::simple::{DisconnectionNotice, ServerOps};
use ldap3_proto::LdapCodec;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::entry::Entry;
use crate::hook::{BindResponseHook, SessionAction, SessionId, SessionInfo};
use crate::partition::SearchScope;
use crate::service::{BindStatus, DirectoryService, Filter, SearchFailure, SearchQuery};

/// Registry of open sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionInfo>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session and return its id.
    pub fn register(&self, peer: SocketAddr) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.sessions.insert(
            id,
            SessionInfo {
                id,
                peer,
                bound_dn: None,
            },
        );
        id
    }

    /// Remove a session; returns whether it was present.
    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn get(&self, id: SessionId) -> Option<SessionInfo> {
        self.sessions.get(&id).map(|s| s.value().clone())
    }

    fn set_bound_dn(&self, id: SessionId, dn: Option<String>) {
        if let Some(mut session) = self.sessions.get_mut(&id) {
            session.bound_dn = dn;
        }
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Shared state handed to every session task.
pub(crate) struct SessionContext {
    pub service: Arc<DirectoryService>,
    pub registry: Arc<SessionRegistry>,
    pub hook: Arc<dyn BindResponseHook>,
    pub shutdown: CancellationToken,
}

type LdapFramed = Framed<TcpStream, LdapCodec>;

/// Serve one connection until the client leaves, the hook disconnects it,
/// or the server shuts down.
pub(crate) async fn serve(stream: TcpStream, peer: SocketAddr, ctx: Arc<SessionContext>) {
    let id = ctx.registry.register(peer);
    debug!(session = id, peer = %peer, "Session opened");

    let mut framed = Framed::new(stream, LdapCodec::default());
    run(&mut framed, id, &ctx).await;

    ctx.registry.remove(id);
    debug!(session = id, "Session closed");
}

async fn run(framed: &mut LdapFramed, id: SessionId, ctx: &SessionContext) {
    loop {
        let next = tokio::select! {
            _ = ctx.shutdown.cancelled() => {
                let notice = DisconnectionNotice::gen(
                    LdapResultCode::Unavailable,
                    "server shutting down",
                );
                let _ = send(framed, id, notice).await;
                return;
            }
            next = framed.next() => next,
        };

        let msg = match next {
            None => return,
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(session = id, error = ?e, "Failed to decode LDAP message");
                return;
            }
        };

        let op = match ServerOps::try_from(msg) {
            Ok(op) => op,
            Err(_) => {
                let notice =
                    DisconnectionNotice::gen(LdapResultCode::ProtocolError, "unsupported operation");
                let _ = send(framed, id, notice).await;
                return;
            }
        };

        match op {
            ServerOps::SimpleBind(sbr) => {
                let outcome = ctx.service.bind(&sbr.dn, &sbr.pw);
                trace!(session = id, dn = %sbr.dn, status = ?outcome.status, "Simple bind");

                if !send(framed, id, bind_response(sbr.msgid, outcome.status, &outcome.message))
                    .await
                {
                    return;
                }

                ctx.registry
                    .set_bound_dn(id, outcome.identity.as_ref().map(ToString::to_string));

                let Some(info) = ctx.registry.get(id) else {
                    return;
                };
                if ctx.hook.on_bind_response(&info, &outcome) == SessionAction::Disconnect {
                    let notice =
                        DisconnectionNotice::gen(LdapResultCode::Unavailable, "session terminated");
                    let _ = send(framed, id, notice).await;
                    ctx.registry.remove(id);
                    return;
                }
            }
            ServerOps::Search(sr) => {
                let query = SearchQuery {
                    base: sr.base.clone(),
                    scope: convert_scope(&sr.scope),
                    filter: convert_filter(&sr.filter),
                    attrs: sr.attrs.clone(),
                };

                let replies = match ctx.service.search(&query) {
                    Ok(entries) => {
                        let mut replies: Vec<LdapMsg> = entries
                            .iter()
                            .map(|entry| sr.gen_result_entry(result_entry(entry)))
                            .collect();
                        replies.push(sr.gen_success());
                        replies
                    }
                    Err(SearchFailure::NoSuchObject(base)) => vec![search_done(
                        sr.msgid,
                        LdapResultCode::NoSuchObject,
                        format!("no such object: {base}"),
                    )],
                    Err(SearchFailure::InvalidDnSyntax(message)) => vec![search_done(
                        sr.msgid,
                        LdapResultCode::InvalidDNSyntax,
                        message,
                    )],
                };

                for reply in replies {
                    if !send(framed, id, reply).await {
                        return;
                    }
                }
            }
            ServerOps::Whoami(wr) => {
                let authz = ctx
                    .registry
                    .get(id)
                    .and_then(|s| s.bound_dn)
                    .map(|dn| format!("dn:{dn}"))
                    .unwrap_or_default();
                if !send(framed, id, wr.gen_success(&authz)).await {
                    return;
                }
            }
            ServerOps::Unbind(_) => return,
            #[allow(unreachable_patterns)]
            _ => {
                let notice =
                    DisconnectionNotice::gen(LdapResultCode::ProtocolError, "unsupported operation");
                let _ = send(framed, id, notice).await;
                return;
            }
        }
    }
}

/// Write one message; false when the transport is gone.
async fn send(framed: &mut LdapFramed, id: SessionId, msg: LdapMsg) -> bool {
    match framed.send(msg).await {
        Ok(()) => true,
        Err(e) => {
            debug!(session = id, error = ?e, "Failed to write LDAP message");
            false
        }
    }
}

fn result_code(status: BindStatus) -> LdapResultCode {
    match status {
        BindStatus::Success => LdapResultCode::Success,
        BindStatus::InvalidCredentials => LdapResultCode::InvalidCredentials,
        BindStatus::InvalidDnSyntax => LdapResultCode::InvalidDNSyntax,
        BindStatus::UnwillingToPerform => LdapResultCode::UnwillingToPerform,
        BindStatus::InappropriateAuthentication => LdapResultCode::InappropriateAuthentication,
    }
}

fn ldap_result(code: LdapResultCode, message: impl Into<String>) -> LdapResult {
    LdapResult {
        code,
        matcheddn: String::new(),
        message: message.into(),
        referral: Vec::new(),
    }
}

fn bind_response(msgid: i32, status: BindStatus, message: &str) -> LdapMsg {
    LdapMsg {
        msgid,
        op: LdapOp::BindResponse(LdapBindResponse {
            res: ldap_result(result_code(status), message),
            saslcreds: None,
        }),
        ctrl: Vec::new(),
    }
}

fn search_done(msgid: i32, code: LdapResultCode, message: String) -> LdapMsg {
    LdapMsg {
        msgid,
        op: LdapOp::SearchResultDone(ldap_result(code, message)),
        ctrl: Vec::new(),
    }
}

fn result_entry(entry: &Entry) -> LdapSearchResultEntry {
    LdapSearchResultEntry {
        dn: entry.dn().to_string(),
        attributes: entry
            .attributes()
            .iter()
            .map(|attr| LdapPartialAttribute {
                atype: attr.name.clone(),
                vals: attr.values.iter().map(|v| v.as_bytes().to_vec()).collect(),
            })
            .collect(),
    }
}

fn convert_scope(scope: &LdapSearchScope) -> SearchScope {
    match scope {
        LdapSearchScope::Base => SearchScope::Base,
        LdapSearchScope::OneLevel => SearchScope::OneLevel,
        _ => SearchScope::Subtree,
    }
}

fn convert_filter(filter: &LdapFilter) -> Filter {
    match filter {
        LdapFilter::And(filters) => Filter::And(filters.iter().map(convert_filter).collect()),
        LdapFilter::Or(filters) => Filter::Or(filters.iter().map(convert_filter).collect()),
        LdapFilter::Not(inner) => Filter::Not(Box::new(convert_filter(inner))),
        LdapFilter::Equality(attr, value) => Filter::Equality(attr.clone(), value.clone()),
        LdapFilter::Present(attr) => Filter::Present(attr.clone()),
        _ => Filter::Unsupported,
    }
}
