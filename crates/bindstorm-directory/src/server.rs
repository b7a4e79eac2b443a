//! Embedded directory server
//!
//! Lifecycle of one directory instance: a temporary working directory, one
//! in-memory partition, and an LDAP listener on an ephemeral port whose
//! sessions run the installed bind-response hook.

use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DirectoryConfig;
use crate::dn::Dn;
use crate::error::{DirectoryError, DirectoryResult};
use crate::hook::{BindResponseHook, DisconnectAfterBind};
use crate::ldif::LdifFileLoader;
use crate::partition::Partition;
use crate::resources;
use crate::service::{DirectoryService, ServiceSettings};
use crate::session::{self, SessionContext, SessionRegistry};

/// Resources held while the server is running.
struct RunningServer {
    service: Arc<DirectoryService>,
    registry: Arc<SessionRegistry>,
    working_dir: TempDir,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    acceptor: Option<JoinHandle<()>>,
}

impl RunningServer {
    /// Stop accepting, close open sessions, and wait for the accept task.
    async fn stop_listener(&mut self) -> DirectoryResult<()> {
        self.shutdown.cancel();
        match self.acceptor.take() {
            Some(handle) => handle
                .await
                .map_err(|e| DirectoryError::shutdown_with_source("listener task failed", e)),
            None => Ok(()),
        }
    }

    /// Drop partition content and remove the working directory.
    fn shutdown_storage(self) -> DirectoryResult<()> {
        self.service.partition().clear();
        let path = self.working_dir.path().to_path_buf();
        self.working_dir.close().map_err(|e| {
            DirectoryError::shutdown_with_source(
                format!("failed to remove working directory {}", path.display()),
                e,
            )
        })
    }
}

enum ServerState {
    NotStarted,
    Running(RunningServer),
    Stopped,
}

/// An embedded LDAP directory bound to the loopback interface.
pub struct EmbeddedDirectory {
    config: DirectoryConfig,
    suffix: Dn,
    hook: Arc<dyn BindResponseHook>,
    state: ServerState,
}

impl EmbeddedDirectory {
    /// Create a directory for the given configuration.
    ///
    /// Fails with [`DirectoryError::Bootstrap`] when the suffix or admin DN
    /// cannot be parsed.
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        let suffix = config.validate()?;
        Ok(Self {
            config,
            suffix,
            hook: Arc::new(DisconnectAfterBind),
            state: ServerState::NotStarted,
        })
    }

    /// Shorthand for a default configuration with the given suffix.
    pub fn with_base_dn(base_dn: &str) -> DirectoryResult<Self> {
        Self::new(DirectoryConfig::new(base_dn))
    }

    /// Replace the bind-response hook. Takes effect on the next start.
    pub fn with_bind_hook(mut self, hook: impl BindResponseHook) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// The partition suffix.
    pub fn base_dn(&self) -> &Dn {
        &self.suffix
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ServerState::Running(_))
    }

    /// OS-assigned listening port while running.
    pub fn bound_port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            ServerState::Running(running) => Some(running.local_addr),
            _ => None,
        }
    }

    /// Working directory of the running instance.
    pub fn working_dir(&self) -> Option<&Path> {
        match &self.state {
            ServerState::Running(running) => Some(running.working_dir.path()),
            _ => None,
        }
    }

    /// Directory service of the running instance.
    pub fn service(&self) -> Option<&Arc<DirectoryService>> {
        match &self.state {
            ServerState::Running(running) => Some(&running.service),
            _ => None,
        }
    }

    /// Number of client sessions currently registered.
    pub fn active_sessions(&self) -> usize {
        match &self.state {
            ServerState::Running(running) => running.registry.len(),
            _ => 0,
        }
    }

    fn running(&self) -> DirectoryResult<&RunningServer> {
        match &self.state {
            ServerState::Running(running) => Ok(running),
            _ => Err(DirectoryError::AlreadyStopped),
        }
    }

    /// Start the directory and its listener.
    pub async fn start(&mut self) -> DirectoryResult<()> {
        if self.is_running() {
            return Err(DirectoryError::AlreadyRunning);
        }

        let working_dir = tempfile::Builder::new()
            .prefix(&self.config.instance_name)
            .tempdir()
            .map_err(|e| {
                DirectoryError::bootstrap_with_source("failed to create working directory", e)
            })?;

        let admin_dn = Dn::parse(&self.config.admin_dn).map_err(|e| {
            DirectoryError::bootstrap_with_source("invalid admin DN", e)
        })?;

        let settings = ServiceSettings {
            admin_dn,
            admin_password: self.config.admin_password.clone(),
            allow_anonymous: self.config.allow_anonymous,
            change_log_enabled: self.config.change_log_enabled,
            vendor_name: self.config.vendor_name.clone(),
        };
        let partition = Arc::new(Partition::new(
            self.config.instance_name.clone(),
            self.suffix.clone(),
        ));
        let service = Arc::new(DirectoryService::new(settings, partition));

        let host: IpAddr = self.config.listen_host.parse().map_err(|e| {
            DirectoryError::bootstrap_with_source(
                format!("invalid listen host '{}'", self.config.listen_host),
                e,
            )
        })?;
        let listener = TcpListener::bind((host, self.config.port))
            .await
            .map_err(|e| DirectoryError::bootstrap_with_source("failed to bind listener", e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| DirectoryError::bootstrap_with_source("failed to read bound address", e))?;

        let registry = Arc::new(SessionRegistry::new());
        let shutdown = CancellationToken::new();
        let ctx = Arc::new(SessionContext {
            service: Arc::clone(&service),
            registry: Arc::clone(&registry),
            hook: Arc::clone(&self.hook),
            shutdown: shutdown.clone(),
        });

        let acceptor = tokio::spawn(accept_loop(listener, ctx, shutdown.clone()));

        info!(
            partition = service.partition().id(),
            suffix = %self.suffix,
            port = local_addr.port(),
            change_log = service.change_log().is_enabled(),
            working_dir = %working_dir.path().display(),
            "Embedded directory started"
        );

        self.state = ServerState::Running(RunningServer {
            service,
            registry,
            working_dir,
            local_addr,
            shutdown,
            acceptor: Some(acceptor),
        });
        Ok(())
    }

    /// Import a bundled (or filesystem) LDIF resource through the admin session.
    ///
    /// The resource is staged as a file in the working directory first.
    /// Importing nothing is an error.
    pub fn apply_ldif(&self, resource: &str) -> DirectoryResult<usize> {
        let running = self.running()?;

        let content = resources::resolve(resource)
            .map_err(|e| DirectoryError::load(resource, format!("resource not found: {e}")))?;

        let staging = running.working_dir.path().join("ldif");
        std::fs::create_dir_all(&staging)
            .map_err(|e| DirectoryError::load(resource, e.to_string()))?;

        let mut staged = tempfile::Builder::new()
            .prefix("test")
            .suffix(".ldif")
            .tempfile_in(&staging)
            .map_err(|e| DirectoryError::load(resource, e.to_string()))?;
        staged
            .write_all(content.as_bytes())
            .map_err(|e| DirectoryError::load(resource, e.to_string()))?;
        let (_, path) = staged
            .keep()
            .map_err(|e| DirectoryError::load(resource, e.to_string()))?;
        debug!(resource, path = %path.display(), "Staged LDIF resource");

        let count = LdifFileLoader::new(running.service.admin_session(), &path)
            .execute()
            .map_err(|e| match e {
                DirectoryError::Load { message, .. } => DirectoryError::load(resource, message),
                DirectoryError::Ldif(err) => DirectoryError::load(resource, err.to_string()),
                other => other,
            })?;

        if count == 0 {
            return Err(DirectoryError::load(resource, "no entries imported"));
        }
        Ok(count)
    }

    /// Stop the listener, then shut down directory state.
    ///
    /// Storage shutdown runs even when stopping the listener fails; the
    /// first error is returned.
    pub async fn stop(&mut self) -> DirectoryResult<()> {
        let mut running = match std::mem::replace(&mut self.state, ServerState::Stopped) {
            ServerState::Running(running) => running,
            other => {
                self.state = other;
                return Err(DirectoryError::AlreadyStopped);
            }
        };

        let port = running.local_addr.port();
        let listener_result = running.stop_listener().await;
        if let Err(e) = &listener_result {
            warn!(error = %e, "Listener shutdown failed; shutting down storage anyway");
        }
        if !running.registry.is_empty() {
            warn!(
                sessions = running.registry.len(),
                "Sessions still registered after listener shutdown"
            );
        }
        let storage_result = running.shutdown_storage();

        info!(instance = %self.config.instance_name, port, "Embedded directory stopped");
        listener_result.and(storage_result)
    }
}

impl Drop for EmbeddedDirectory {
    fn drop(&mut self) {
        if let ServerState::Running(running) = &self.state {
            warn!(
                instance = %self.config.instance_name,
                "Embedded directory dropped while running; cancelling listener"
            );
            running.shutdown.cancel();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<SessionContext>,
    shutdown: CancellationToken,
) {
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    sessions.spawn(session::serve(stream, peer, Arc::clone(&ctx)));
                }
                Err(e) => warn!(error = %e, "Failed to accept connection"),
            },
        }
    }

    drop(listener);
    while sessions.join_next().await.is_some() {}
    debug!("Accept loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_suffix() {
        let err = EmbeddedDirectory::with_base_dn("sevenSeas").err().unwrap();
        assert!(matches!(err, DirectoryError::Bootstrap { .. }));
    }

    #[test]
    fn test_not_started_accessors() {
        let directory = EmbeddedDirectory::with_base_dn("o=sevenSeas").unwrap();
        assert!(!directory.is_running());
        assert_eq!(directory.bound_port(), None);
        assert!(directory.working_dir().is_none());
        assert_eq!(directory.active_sessions(), 0);
        assert_eq!(directory.base_dn().to_string(), "o=sevenSeas");
    }

    #[test]
    fn test_apply_ldif_before_start() {
        let directory = EmbeddedDirectory::with_base_dn("o=sevenSeas").unwrap();
        let err = directory.apply_ldif(resources::DEFAULT_LDIF).unwrap_err();
        assert!(matches!(err, DirectoryError::AlreadyStopped));
    }

    #[tokio::test]
    async fn test_stop_never_started() {
        let mut directory = EmbeddedDirectory::with_base_dn("o=sevenSeas").unwrap();
        let err = directory.stop().await.unwrap_err();
        assert!(matches!(err, DirectoryError::AlreadyStopped));
        assert!(!directory.is_running());
    }

    #[tokio::test]
    async fn test_working_dir_removed_on_stop() {
        let mut directory = EmbeddedDirectory::with_base_dn("o=sevenSeas").unwrap();
        directory.start().await.unwrap();
        let dir = directory.working_dir().unwrap().to_path_buf();
        assert!(dir.exists());
        assert_eq!(directory.service().unwrap().partition().id(), "sevenSeas");
        assert!(dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("sevenSeas"));

        directory.stop().await.unwrap();
        assert!(!dir.exists());
    }
}
