//! Directory service
//!
//! Protocol-independent directory semantics: simple-bind authentication,
//! search over the partition and the root DSE, and the admin session used
//! for bulk imports. The wire layer in [`crate::session`] translates LDAP
//! messages into calls on this type.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::dn::Dn;
use crate::entry::Entry;
use crate::error::PartitionError;
use crate::partition::{Partition, SearchScope};

/// OID of the "Who am I?" extended operation (RFC 4532).
pub const WHOAMI_OID: &str = "1.3.6.1.4.1.4203.1.11.3";

/// Password attribute; its values compare byte for byte.
const USER_PASSWORD: &str = "userPassword";

/// Authentication and presentation settings of a service instance.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub admin_dn: Dn,
    pub admin_password: String,
    pub allow_anonymous: bool,
    pub change_log_enabled: bool,
    pub vendor_name: String,
}

/// Outcome class of a simple bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStatus {
    Success,
    InvalidCredentials,
    InvalidDnSyntax,
    UnwillingToPerform,
    InappropriateAuthentication,
}

/// Result of a simple bind as seen by the session and the bind hook.
#[derive(Debug, Clone)]
pub struct BindOutcome {
    /// Bind DN as sent by the client.
    pub requested_dn: String,
    /// Authenticated identity, `None` for anonymous or failed binds.
    pub identity: Option<Dn>,
    pub status: BindStatus,
    pub message: String,
}

impl BindOutcome {
    pub fn is_success(&self) -> bool {
        self.status == BindStatus::Success
    }

    fn failure(requested_dn: &str, status: BindStatus, message: impl Into<String>) -> Self {
        Self {
            requested_dn: requested_dn.to_string(),
            identity: None,
            status,
            message: message.into(),
        }
    }
}

/// Search filter subset understood by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equality(String, String),
    Present(String),
    /// Any filter kind the service does not evaluate; matches nothing.
    Unsupported,
}

impl Filter {
    /// Evaluate against an entry. Comparisons are case-insensitive except
    /// for `userPassword`.
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Filter::Not(filter) => !filter.matches(entry),
            Filter::Equality(attr, value) if attr.eq_ignore_ascii_case(USER_PASSWORD) => {
                entry.values(attr).iter().any(|v| v == value)
            }
            Filter::Equality(attr, value) => entry.has_value(attr, value),
            Filter::Present(attr) => {
                attr.eq_ignore_ascii_case("objectClass") || entry.has_attribute(attr)
            }
            Filter::Unsupported => false,
        }
    }
}

/// A search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub base: String,
    pub scope: SearchScope,
    pub filter: Filter,
    pub attrs: Vec<String>,
}

/// Why a search could not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFailure {
    InvalidDnSyntax(String),
    NoSuchObject(String),
}

/// An add recorded by the change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub revision: u64,
    pub dn: String,
}

/// Append-only record of admin writes, active only when enabled.
#[derive(Debug, Default)]
pub struct ChangeLog {
    enabled: bool,
    events: Mutex<Vec<ChangeEvent>>,
}

impl ChangeLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn record(&self, dn: &Dn) {
        if !self.enabled {
            return;
        }
        let mut events = self.events.lock();
        let revision = events.len() as u64 + 1;
        events.push(ChangeEvent {
            revision,
            dn: dn.to_string(),
        });
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }
}

/// The directory service backing one embedded server instance.
#[derive(Debug)]
pub struct DirectoryService {
    settings: ServiceSettings,
    partition: Arc<Partition>,
    change_log: ChangeLog,
}

impl DirectoryService {
    pub fn new(settings: ServiceSettings, partition: Arc<Partition>) -> Self {
        let change_log = ChangeLog::new(settings.change_log_enabled);
        Self {
            settings,
            partition,
            change_log,
        }
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn change_log(&self) -> &ChangeLog {
        &self.change_log
    }

    /// Session that writes with administrative rights.
    pub fn admin_session(&self) -> AdminSession<'_> {
        AdminSession { service: self }
    }

    /// Authenticate a simple bind.
    pub fn bind(&self, dn: &str, password: &str) -> BindOutcome {
        if dn.trim().is_empty() {
            if !password.is_empty() {
                return BindOutcome::failure(
                    dn,
                    BindStatus::InvalidCredentials,
                    "password supplied without a bind DN",
                );
            }
            if !self.settings.allow_anonymous {
                return BindOutcome::failure(
                    dn,
                    BindStatus::InappropriateAuthentication,
                    "anonymous access is disabled",
                );
            }
            return BindOutcome {
                requested_dn: dn.to_string(),
                identity: None,
                status: BindStatus::Success,
                message: String::new(),
            };
        }

        if password.is_empty() {
            return BindOutcome::failure(
                dn,
                BindStatus::UnwillingToPerform,
                "unauthenticated binds are not allowed",
            );
        }

        let parsed = match Dn::parse(dn) {
            Ok(parsed) => parsed,
            Err(e) => {
                return BindOutcome::failure(dn, BindStatus::InvalidDnSyntax, e.to_string());
            }
        };

        let authenticated = if parsed == self.settings.admin_dn {
            password == self.settings.admin_password
        } else {
            self.partition
                .lookup(&parsed)
                .is_some_and(|entry| entry.values(USER_PASSWORD).iter().any(|p| p == password))
        };

        if !authenticated {
            debug!(dn = %parsed, "Simple bind rejected");
            return BindOutcome::failure(dn, BindStatus::InvalidCredentials, "invalid credentials");
        }

        BindOutcome {
            requested_dn: dn.to_string(),
            identity: Some(parsed),
            status: BindStatus::Success,
            message: String::new(),
        }
    }

    /// Run a search, projecting attributes per the request.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<Entry>, SearchFailure> {
        let base = Dn::parse(&query.base)
            .map_err(|e| SearchFailure::InvalidDnSyntax(e.to_string()))?;

        let found = if base.is_root() {
            if query.scope != SearchScope::Base {
                return Err(SearchFailure::NoSuchObject(query.base.clone()));
            }
            let dse = self.root_dse();
            if query.filter.matches(&dse) {
                vec![dse]
            } else {
                Vec::new()
            }
        } else {
            self.partition
                .search(&base, query.scope, |e| query.filter.matches(e))
                .ok_or_else(|| SearchFailure::NoSuchObject(query.base.clone()))?
        };

        Ok(found
            .into_iter()
            .map(|entry| project(entry, &query.attrs))
            .collect())
    }

    /// The root DSE describing this server.
    pub fn root_dse(&self) -> Entry {
        Entry::new(Dn::root())
            .with_value("objectClass", "top")
            .with_value("objectClass", "extensibleObject")
            .with_value("namingContexts", self.partition.suffix().to_string())
            .with_value("supportedLDAPVersion", "3")
            .with_value("supportedExtension", WHOAMI_OID)
            .with_value("vendorName", self.settings.vendor_name.clone())
    }
}

fn project(entry: Entry, attrs: &[String]) -> Entry {
    if attrs.is_empty() || attrs.iter().any(|a| a == "*") {
        return entry;
    }

    let mut projected = Entry::new(entry.dn().clone());
    for attr in entry.attributes() {
        if attrs.iter().any(|wanted| attr.is(wanted)) {
            for value in &attr.values {
                projected.add_value(&attr.name, value.clone());
            }
        }
    }
    projected
}

/// Administrative session used for imports; bypasses access checks.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession<'a> {
    service: &'a DirectoryService,
}

impl AdminSession<'_> {
    /// Add an entry to the partition.
    pub fn add(&self, entry: Entry) -> Result<(), PartitionError> {
        let dn = entry.dn().clone();
        self.service.partition.add(entry)?;
        self.service.change_log.record(&dn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON: &str = "cn=Horatio Hornblower,ou=people,o=sevenSeas";

    fn settings() -> ServiceSettings {
        ServiceSettings {
            admin_dn: Dn::parse("uid=admin,ou=system").unwrap(),
            admin_password: "secret".to_string(),
            allow_anonymous: true,
            change_log_enabled: false,
            vendor_name: "bindstorm".to_string(),
        }
    }

    fn service_with(settings: ServiceSettings) -> DirectoryService {
        let partition = Arc::new(Partition::new(
            "sevenSeas",
            Dn::parse("o=sevenSeas").unwrap(),
        ));
        let service = DirectoryService::new(settings, partition);
        let admin = service.admin_session();
        admin
            .add(
                Entry::new(Dn::parse("o=sevenSeas").unwrap())
                    .with_value("objectClass", "organization"),
            )
            .unwrap();
        admin
            .add(
                Entry::new(Dn::parse("ou=people,o=sevenSeas").unwrap())
                    .with_value("objectClass", "organizationalUnit"),
            )
            .unwrap();
        admin
            .add(
                Entry::new(Dn::parse(PERSON).unwrap())
                    .with_value("objectClass", "person")
                    .with_value("sn", "Hornblower")
                    .with_value("userPassword", "secret"),
            )
            .unwrap();
        service
    }

    fn service() -> DirectoryService {
        service_with(settings())
    }

    fn query(base: &str, scope: SearchScope, filter: Filter) -> SearchQuery {
        SearchQuery {
            base: base.to_string(),
            scope,
            filter,
            attrs: Vec::new(),
        }
    }

    #[test]
    fn test_bind_person_success() {
        let outcome = service().bind(PERSON, "secret");
        assert!(outcome.is_success());
        assert_eq!(outcome.identity.unwrap(), Dn::parse(PERSON).unwrap());
    }

    #[test]
    fn test_bind_dn_is_case_insensitive() {
        let outcome = service().bind("CN=horatio hornblower,ou=People,o=SEVENSEAS", "secret");
        assert!(outcome.is_success());
    }

    #[test]
    fn test_bind_wrong_password() {
        let outcome = service().bind(PERSON, "wrong");
        assert_eq!(outcome.status, BindStatus::InvalidCredentials);
        assert!(outcome.identity.is_none());
    }

    #[test]
    fn test_bind_unknown_entry() {
        let outcome = service().bind("cn=Bush,ou=people,o=sevenSeas", "secret");
        assert_eq!(outcome.status, BindStatus::InvalidCredentials);
    }

    #[test]
    fn test_bind_entry_without_password() {
        let outcome = service().bind("ou=people,o=sevenSeas", "secret");
        assert_eq!(outcome.status, BindStatus::InvalidCredentials);
    }

    #[test]
    fn test_bind_admin() {
        assert!(service().bind("uid=admin,ou=system", "secret").is_success());
        assert_eq!(
            service().bind("uid=admin,ou=system", "nope").status,
            BindStatus::InvalidCredentials
        );
    }

    #[test]
    fn test_bind_anonymous() {
        let outcome = service().bind("", "");
        assert!(outcome.is_success());
        assert!(outcome.identity.is_none());

        let mut restricted = settings();
        restricted.allow_anonymous = false;
        assert_eq!(
            service_with(restricted).bind("", "").status,
            BindStatus::InappropriateAuthentication
        );
    }

    #[test]
    fn test_bind_unauthenticated() {
        assert_eq!(
            service().bind(PERSON, "").status,
            BindStatus::UnwillingToPerform
        );
    }

    #[test]
    fn test_bind_malformed_dn() {
        assert_eq!(
            service().bind("Horatio", "secret").status,
            BindStatus::InvalidDnSyntax
        );
    }

    #[test]
    fn test_search_subtree_with_filter() {
        let found = service()
            .search(&query(
                "o=sevenSeas",
                SearchScope::Subtree,
                Filter::Equality("objectClass".into(), "PERSON".into()),
            ))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].dn(), &Dn::parse(PERSON).unwrap());
    }

    #[test]
    fn test_search_boolean_filters() {
        let svc = service();
        let not_person = Filter::And(vec![
            Filter::Present("objectClass".into()),
            Filter::Not(Box::new(Filter::Equality(
                "objectClass".into(),
                "person".into(),
            ))),
        ]);
        let found = svc
            .search(&query("o=sevenSeas", SearchScope::Subtree, not_person))
            .unwrap();
        assert_eq!(found.len(), 2);

        let either = Filter::Or(vec![
            Filter::Equality("sn".into(), "hornblower".into()),
            Filter::Equality("ou".into(), "people".into()),
        ]);
        let found = svc
            .search(&query("o=sevenSeas", SearchScope::Subtree, either))
            .unwrap();
        assert_eq!(found.len(), 2);

        let found = svc
            .search(&query("o=sevenSeas", SearchScope::Subtree, Filter::Unsupported))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_password_equality_is_case_sensitive() {
        let svc = service();
        let search = |value: &str| {
            svc.search(&query(
                "o=sevenSeas",
                SearchScope::Subtree,
                Filter::Equality("userpassword".into(), value.into()),
            ))
            .unwrap()
        };

        assert_eq!(search("secret").len(), 1);
        assert!(search("SECRET").is_empty());
    }

    #[test]
    fn test_search_missing_base() {
        let err = service()
            .search(&query(
                "ou=ships,o=sevenSeas",
                SearchScope::Base,
                Filter::Present("objectClass".into()),
            ))
            .unwrap_err();
        assert!(matches!(err, SearchFailure::NoSuchObject(_)));
    }

    #[test]
    fn test_search_bad_base() {
        let err = service()
            .search(&query(
                "sevenSeas",
                SearchScope::Base,
                Filter::Present("objectClass".into()),
            ))
            .unwrap_err();
        assert!(matches!(err, SearchFailure::InvalidDnSyntax(_)));
    }

    #[test]
    fn test_search_projection() {
        let mut q = query(
            PERSON,
            SearchScope::Base,
            Filter::Present("objectClass".into()),
        );
        q.attrs = vec!["SN".to_string()];
        let found = service().search(&q).unwrap();
        assert_eq!(found[0].attributes().len(), 1);
        assert_eq!(found[0].values("sn"), ["Hornblower".to_string()]);

        q.attrs = vec!["1.1".to_string()];
        let found = service().search(&q).unwrap();
        assert!(found[0].attributes().is_empty());
    }

    #[test]
    fn test_root_dse() {
        let found = service()
            .search(&query("", SearchScope::Base, Filter::Present("objectClass".into())))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].has_value("namingContexts", "o=sevenSeas"));
        assert!(found[0].has_value("supportedExtension", WHOAMI_OID));
    }

    #[test]
    fn test_change_log_disabled_records_nothing() {
        let svc = service();
        assert!(!svc.change_log().is_enabled());
        assert!(svc.change_log().events().is_empty());
    }

    #[test]
    fn test_change_log_enabled_records_adds() {
        let mut with_log = settings();
        with_log.change_log_enabled = true;
        let svc = service_with(with_log);
        let events = svc.change_log().events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].revision, 1);
        assert_eq!(events[2].dn, PERSON);
    }
}
