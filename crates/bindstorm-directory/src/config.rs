//! Embedded directory configuration

use serde::{Deserialize, Serialize};

use crate::dn::Dn;
use crate::error::{DirectoryError, DirectoryResult};

/// Configuration for an embedded directory instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Instance name; prefixes the working directory and names the partition.
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Suffix of the single partition (e.g. "o=sevenSeas").
    pub base_dn: String,

    /// Address the listener binds to.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    /// Listener port; 0 lets the OS pick one.
    #[serde(default)]
    pub port: u16,

    /// Administrator principal.
    #[serde(default = "default_admin_dn")]
    pub admin_dn: String,

    /// Administrator password.
    #[serde(default = "default_admin_password", skip_serializing)]
    pub admin_password: String,

    /// Accept binds with an empty DN and password.
    #[serde(default = "default_true")]
    pub allow_anonymous: bool,

    /// Record admin writes in the change log.
    #[serde(default)]
    pub change_log_enabled: bool,

    /// `vendorName` published in the root DSE.
    #[serde(default = "default_vendor_name")]
    pub vendor_name: String,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("instance_name", &self.instance_name)
            .field("base_dn", &self.base_dn)
            .field("listen_host", &self.listen_host)
            .field("port", &self.port)
            .field("admin_dn", &self.admin_dn)
            .field("admin_password", &"***REDACTED***")
            .field("allow_anonymous", &self.allow_anonymous)
            .field("change_log_enabled", &self.change_log_enabled)
            .field("vendor_name", &self.vendor_name)
            .finish()
    }
}

fn default_instance_name() -> String {
    "sevenSeas".to_string()
}

fn default_listen_host() -> String {
    "127.0.0.1".to_string()
}

fn default_admin_dn() -> String {
    "uid=admin,ou=system".to_string()
}

fn default_admin_password() -> String {
    "secret".to_string()
}

fn default_vendor_name() -> String {
    "bindstorm".to_string()
}

fn default_true() -> bool {
    true
}

impl DirectoryConfig {
    /// Create a config for the given partition suffix.
    pub fn new(base_dn: impl Into<String>) -> Self {
        Self {
            instance_name: default_instance_name(),
            base_dn: base_dn.into(),
            listen_host: default_listen_host(),
            port: 0,
            admin_dn: default_admin_dn(),
            admin_password: default_admin_password(),
            allow_anonymous: true,
            change_log_enabled: false,
            vendor_name: default_vendor_name(),
        }
    }

    /// Set the instance name.
    pub fn with_instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = name.into();
        self
    }

    /// Set administrator credentials.
    pub fn with_admin(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.admin_dn = dn.into();
        self.admin_password = password.into();
        self
    }

    /// Reject anonymous binds.
    #[must_use]
    pub fn without_anonymous(mut self) -> Self {
        self.allow_anonymous = false;
        self
    }

    /// Validate the configuration and return the parsed suffix.
    pub fn validate(&self) -> DirectoryResult<Dn> {
        if self.instance_name.trim().is_empty() {
            return Err(DirectoryError::bootstrap("instance name must not be empty"));
        }

        let suffix = Dn::parse(&self.base_dn).map_err(|e| {
            DirectoryError::bootstrap_with_source(
                format!("invalid partition suffix '{}'", self.base_dn),
                e,
            )
        })?;
        if suffix.is_root() {
            return Err(DirectoryError::bootstrap("partition suffix must not be empty"));
        }

        Dn::parse(&self.admin_dn).map_err(|e| {
            DirectoryError::bootstrap_with_source(
                format!("invalid admin DN '{}'", self.admin_dn),
                e,
            )
        })?;

        if self.listen_host.parse::<std::net::IpAddr>().is_err() {
            return Err(DirectoryError::bootstrap(format!(
                "listen host '{}' is not an IP address",
                self.listen_host
            )));
        }

        Ok(suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DirectoryConfig::new("o=sevenSeas");
        assert_eq!(config.instance_name, "sevenSeas");
        assert_eq!(config.listen_host, "127.0.0.1");
        assert_eq!(config.port, 0);
        assert_eq!(config.admin_dn, "uid=admin,ou=system");
        assert!(config.allow_anonymous);
        assert!(!config.change_log_enabled);
    }

    #[test]
    fn test_validate_returns_suffix() {
        let suffix = DirectoryConfig::new("o=sevenSeas").validate().unwrap();
        assert_eq!(suffix.to_string(), "o=sevenSeas");
    }

    #[test]
    fn test_validate_rejects_bad_suffix() {
        let err = DirectoryConfig::new("sevenSeas").validate().unwrap_err();
        assert!(matches!(err, DirectoryError::Bootstrap { .. }));

        let err = DirectoryConfig::new("").validate().unwrap_err();
        assert!(matches!(err, DirectoryError::Bootstrap { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_host() {
        let mut config = DirectoryConfig::new("o=sevenSeas");
        config.listen_host = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = DirectoryConfig::new("o=sevenSeas").with_admin("uid=admin,ou=system", "hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
