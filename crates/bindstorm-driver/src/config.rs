//! Bind loop configuration

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};

/// Configuration for the connector and the bind loop.
#[derive(Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// LDAP server hostname or IP address.
    pub host: String,

    /// LDAP server port.
    pub port: u16,

    /// Bind DN.
    pub principal: String,

    /// Bind password.
    #[serde(skip_serializing)]
    pub credential: String,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Successful binds between progress log lines.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Stop after this many successful binds; unbounded when unset.
    #[serde(default)]
    pub max_binds: Option<u64>,
}

impl std::fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("principal", &self.principal)
            .field("credential", &"***REDACTED***")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("progress_interval", &self.progress_interval)
            .field("max_binds", &self.max_binds)
            .finish()
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_progress_interval() -> u64 {
    100
}

impl DriverConfig {
    /// Create a new driver config with required fields.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        principal: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            principal: principal.into(),
            credential: credential.into(),
            connect_timeout_secs: default_connect_timeout_secs(),
            progress_interval: default_progress_interval(),
            max_binds: None,
        }
    }

    /// Set the progress log interval.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Bound the loop.
    #[must_use]
    pub fn with_max_binds(mut self, max_binds: u64) -> Self {
        self.max_binds = Some(max_binds);
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// LDAP URL of the target server.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ldap://{}:{}", self.host, self.port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DriverResult<()> {
        if self.host.trim().is_empty() {
            return Err(DriverError::invalid_configuration("host must not be empty"));
        }
        if self.port == 0 {
            return Err(DriverError::invalid_configuration("port must not be 0"));
        }
        if self.progress_interval == 0 {
            return Err(DriverError::invalid_configuration(
                "progress interval must be greater than 0",
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(DriverError::invalid_configuration(
                "connect timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}
