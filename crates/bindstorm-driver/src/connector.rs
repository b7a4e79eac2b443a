//! One-shot LDAP simple-bind connector.
//!
//! Every call opens a fresh connection. The embedded directory drops the
//! session after each bind response, so a connection is never reused.

use std::time::Duration;

use ldap3::{LdapConnAsync, LdapConnSettings};
use tracing::{debug, instrument};

use crate::config::DriverConfig;
use crate::error::{DriverError, DriverResult};

/// Result code for rejected credentials.
const INVALID_CREDENTIALS: u32 = 49;

/// Opens a connection, binds, and releases it.
pub struct LdapConnector {
    url: String,
    principal: String,
    credential: String,
    connect_timeout: Duration,
}

impl LdapConnector {
    /// Create a connector for the configured target and credentials.
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            url: config.url(),
            principal: config.principal.clone(),
            credential: config.credential.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bind DN.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Perform one simple bind on a new connection.
    ///
    /// Releasing the connection afterwards is best effort; the server may
    /// already have closed it.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn bind(&self) -> DriverResult<()> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.connect_timeout);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .map_err(|e| {
                DriverError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {}", self.url),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                debug!(error = %e, "LDAP connection driver ended");
            }
        });

        let result = ldap
            .simple_bind(&self.principal, &self.credential)
            .await
            .map_err(|e| {
                DriverError::connection_failed_with_source(
                    format!("LDAP bind failed for {}", self.principal),
                    e,
                )
            })?;

        if let Err(e) = ldap.unbind().await {
            debug!(error = %e, "Ignoring error while releasing LDAP connection");
        }

        match result.rc {
            0 => Ok(()),
            INVALID_CREDENTIALS => Err(DriverError::AuthenticationFailed),
            code => Err(DriverError::BindFailed {
                code,
                message: result.text,
            }),
        }
    }
}

impl std::fmt::Debug for LdapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnector")
            .field("url", &self.url)
            .field("principal", &self.principal)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
