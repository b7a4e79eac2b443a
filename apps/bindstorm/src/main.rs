//! bindstorm: start an embedded LDAP directory, load the fixture, and bind
//! against it until interrupted.

mod config;
mod error;
mod logging;

use std::future::Future;

use bindstorm_directory::{DirectoryError, EmbeddedDirectory, KeepSession};
use bindstorm_driver::{BindLoop, SuccessCounter};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::logging::{init_logging, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });

    init_logging(DEFAULT_LOG_FILTER, config.log_format);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let mut counter = SuccessCounter::new(config.progress_interval);
    let result = run(&config, &mut counter, &shutdown).await;

    info!("Number of successful LDAP binds {}", counter.value());

    if let Err(e) = result {
        error!(error = %e, code = e.error_code(), "bindstorm failed");
        std::process::exit(1);
    }
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    cancel_on_signal(shutdown, ctrl_c, terminate).await;
}

/// Wait for whichever signal fires first, then cancel the bind loop.
async fn cancel_on_signal(
    shutdown: CancellationToken,
    ctrl_c: impl Future<Output = ()>,
    terminate: impl Future<Output = ()>,
) -> &'static str {
    let received = tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    info!(signal = received, "Received {received}, stopping bind loop");
    shutdown.cancel();
    received
}

/// Start the directory, run the loop, and stop the directory whatever the
/// loop's outcome.
async fn run(
    config: &AppConfig,
    counter: &mut SuccessCounter,
    shutdown: &CancellationToken,
) -> Result<(), AppError> {
    let mut directory = EmbeddedDirectory::new(config.directory.clone())?;
    if !config.disconnect_after_bind {
        directory = directory.with_bind_hook(KeepSession);
    }

    directory.start().await?;

    let outcome = drive(&directory, config, counter, shutdown).await;
    let stopped = directory.stop().await;
    if let Err(e) = &stopped {
        error!(error = %e, "Failed to stop directory service");
    }

    outcome?;
    stopped?;
    Ok(())
}

async fn drive(
    directory: &EmbeddedDirectory,
    config: &AppConfig,
    counter: &mut SuccessCounter,
    shutdown: &CancellationToken,
) -> Result<(), AppError> {
    let imported = directory.apply_ldif(&config.ldif)?;
    let port = directory.bound_port().ok_or(DirectoryError::AlreadyStopped)?;
    info!(
        port,
        entries = imported,
        ldif = %config.ldif,
        "Directory ready"
    );

    let mut bind_loop = BindLoop::new(&config.driver_config(port))?;
    bind_loop.run(counter, shutdown).await?;
    Ok(())
}
