//! The bind loop.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::DriverConfig;
use crate::connector::LdapConnector;
use crate::counter::SuccessCounter;
use crate::error::DriverResult;

/// Lifecycle of a [`BindLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    NotStarted,
    Running,
    /// Ended by cancellation or by reaching the bind limit.
    Stopped,
    /// Ended by a bind error.
    Crashed,
}

/// Repeatedly connects and binds until cancelled, bounded, or failed.
#[derive(Debug)]
pub struct BindLoop {
    connector: LdapConnector,
    max_binds: Option<u64>,
    state: DriverState,
}

impl BindLoop {
    /// Create a loop from a validated configuration.
    pub fn new(config: &DriverConfig) -> DriverResult<Self> {
        config.validate()?;
        Ok(Self {
            connector: LdapConnector::new(config),
            max_binds: config.max_binds,
            state: DriverState::NotStarted,
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Run until `shutdown` fires, the bind limit is reached, or a bind
    /// fails. Cancellation is observed between iterations only.
    ///
    /// The counter is owned by the caller so the total survives a failure.
    pub async fn run(
        &mut self,
        counter: &mut SuccessCounter,
        shutdown: &CancellationToken,
    ) -> DriverResult<()> {
        self.state = DriverState::Running;
        info!(
            url = %self.connector.url(),
            principal = %self.connector.principal(),
            max_binds = ?self.max_binds,
            "Starting LDAP bind loop"
        );

        loop {
            if shutdown.is_cancelled() {
                debug!("Bind loop cancelled");
                break;
            }
            if self.max_binds.is_some_and(|max| counter.value() >= max) {
                debug!(binds = counter.value(), "Bind limit reached");
                break;
            }

            if let Err(e) = self.connector.bind().await {
                error!(error = %e, code = e.error_code(), binds = counter.value(), "LDAP bind failed");
                self.state = DriverState::Crashed;
                return Err(e);
            }

            if counter.record_success() {
                info!("Successfully LDAP binds {}", counter.value());
            }
        }

        self.state = DriverState::Stopped;
        Ok(())
    }
}
