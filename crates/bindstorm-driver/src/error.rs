//! Driver error types

use thiserror::Error;

/// Error that can occur while binding against the directory.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Failed to establish or use the connection.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server rejected the credentials (result code 49).
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    /// The bind completed with another non-success result code.
    #[error("bind failed with code {code}: {message}")]
    BindFailed { code: u32, message: String },

    /// Driver configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl DriverError {
    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            DriverError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            DriverError::AuthenticationFailed => "AUTH_FAILED",
            DriverError::BindFailed { .. } => "BIND_FAILED",
            DriverError::InvalidConfiguration { .. } => "INVALID_CONFIG",
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DriverError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        DriverError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
