use bindstorm_directory::resources::DEFAULT_LDIF;
use bindstorm_directory::DirectoryConfig;
use bindstorm_driver::DriverConfig;

use crate::logging::LogFormat;

/// Configuration for the bindstorm harness.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Embedded directory settings.
    pub directory: DirectoryConfig,

    /// LDIF resource applied after start.
    pub ldif: String,

    /// Host the driver dials.
    pub host: String,

    /// Bind DN used by the loop.
    pub principal: String,

    /// Bind password used by the loop.
    pub credential: String,

    /// Successful binds between progress lines.
    pub progress_interval: u64,

    /// Optional bound on successful binds.
    pub max_binds: Option<u64>,

    pub connect_timeout_secs: u64,

    /// Whether the server drops every session after its bind response.
    pub disconnect_after_bind: bool,

    /// Log output format.
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let base_dn = reader("BINDSTORM_BASE_DN").unwrap_or_else(|_| "o=sevenSeas".to_string());
        let instance_name =
            reader("BINDSTORM_INSTANCE_NAME").unwrap_or_else(|_| "sevenSeas".to_string());
        let directory = DirectoryConfig::new(base_dn).with_instance_name(instance_name);
        directory
            .validate()
            .map_err(|e| ConfigError::InvalidValue("BINDSTORM_BASE_DN".into(), e.to_string()))?;

        let ldif = reader("BINDSTORM_LDIF").unwrap_or_else(|_| DEFAULT_LDIF.to_string());

        let host = reader("BINDSTORM_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let principal = reader("BINDSTORM_PRINCIPAL")
            .unwrap_or_else(|_| "cn=Horatio Hornblower,ou=people,o=sevenSeas".to_string());

        let credential = reader("BINDSTORM_CREDENTIAL").unwrap_or_else(|_| "secret".to_string());

        let progress_interval = reader("BINDSTORM_PROGRESS_INTERVAL")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidValue("BINDSTORM_PROGRESS_INTERVAL".into(), e.to_string())
            })?;
        if progress_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "BINDSTORM_PROGRESS_INTERVAL".into(),
                "must be greater than 0".into(),
            ));
        }

        let max_binds = match reader("BINDSTORM_MAX_BINDS") {
            Ok(value) => Some(value.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("BINDSTORM_MAX_BINDS".into(), e.to_string())
            })?),
            Err(_) => None,
        };

        let connect_timeout_secs = reader("BINDSTORM_CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidValue("BINDSTORM_CONNECT_TIMEOUT_SECS".into(), e.to_string())
            })?;

        let disconnect_after_bind = reader("BINDSTORM_DISCONNECT_AFTER_BIND")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .map_err(|e| {
                ConfigError::InvalidValue("BINDSTORM_DISCONNECT_AFTER_BIND".into(), e.to_string())
            })?;

        let log_format = reader("BINDSTORM_LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string())
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::InvalidValue("BINDSTORM_LOG_FORMAT".into(), e))?;

        Ok(Self {
            directory,
            ldif,
            host,
            principal,
            credential,
            progress_interval,
            max_binds,
            connect_timeout_secs,
            disconnect_after_bind,
            log_format,
        })
    }

    /// Driver settings targeting the given port.
    pub fn driver_config(&self, port: u16) -> DriverConfig {
        let config = DriverConfig::new(&self.host, port, &self.principal, &self.credential)
            .with_progress_interval(self.progress_interval)
            .with_connect_timeout_secs(self.connect_timeout_secs);
        match self.max_binds {
            Some(max) => config.with_max_binds(max),
            None => config,
        }
    }
}

/// Configuration errors.
///
/// Every variable has a default, so only malformed values are errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
