use bindstorm_directory::DirectoryError;
use bindstorm_driver::DriverError;

use crate::config::ConfigError;

/// Top-level error for the harness.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("bind loop error: {0}")]
    Driver(#[from] DriverError),
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG",
            AppError::Directory(e) => e.error_code(),
            AppError::Driver(e) => e.error_code(),
        }
    }
}
