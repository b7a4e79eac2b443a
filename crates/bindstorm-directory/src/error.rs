//! Embedded directory error types
//!
//! Lifecycle, bootstrap and fixture-loading errors, plus the parse and
//! storage errors they wrap.

use thiserror::Error;

/// Error that can occur while running the embedded directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    // Lifecycle errors
    /// Schema, partition, working directory or listener setup failed.
    #[error("bootstrap failed: {message}")]
    Bootstrap {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// `start` was called on a running instance.
    #[error("service already running")]
    AlreadyRunning,

    /// `stop` (or an admin operation) was called on an instance that is not running.
    #[error("service is not running")]
    AlreadyStopped,

    /// Listener or storage teardown failed.
    #[error("shutdown failed: {message}")]
    Shutdown {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Fixture errors
    /// A fixture could not be read, parsed, or imported no entries.
    #[error("failed to load LDIF resource '{resource}': {message}")]
    Load { resource: String, message: String },

    // Wrapped errors
    /// Malformed distinguished name.
    #[error(transparent)]
    Dn(#[from] DnError),

    /// Malformed LDIF content.
    #[error(transparent)]
    Ldif(#[from] LdifError),

    /// The partition rejected an entry.
    #[error(transparent)]
    Partition(#[from] PartitionError),
}

impl DirectoryError {
    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::Bootstrap { .. } => "BOOTSTRAP_FAILED",
            DirectoryError::AlreadyRunning => "ALREADY_RUNNING",
            DirectoryError::AlreadyStopped => "ALREADY_STOPPED",
            DirectoryError::Shutdown { .. } => "SHUTDOWN_FAILED",
            DirectoryError::Load { .. } => "LOAD_FAILED",
            DirectoryError::Dn(_) => "INVALID_DN",
            DirectoryError::Ldif(_) => "INVALID_LDIF",
            DirectoryError::Partition(_) => "PARTITION_REJECTED",
        }
    }

    /// Create a bootstrap error.
    pub fn bootstrap(message: impl Into<String>) -> Self {
        DirectoryError::Bootstrap {
            message: message.into(),
            source: None,
        }
    }

    /// Create a bootstrap error with source.
    pub fn bootstrap_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::Bootstrap {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a shutdown error with source.
    pub fn shutdown_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::Shutdown {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a load error.
    pub fn load(resource: impl Into<String>, message: impl Into<String>) -> Self {
        DirectoryError::Load {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// Distinguished name parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnError {
    #[error("invalid DN '{dn}': RDN '{rdn}' has no '=' separator")]
    MissingSeparator { dn: String, rdn: String },

    #[error("invalid DN '{dn}': empty attribute type")]
    EmptyAttributeType { dn: String },

    #[error("invalid DN '{dn}': empty RDN")]
    EmptyRdn { dn: String },

    #[error("invalid DN '{dn}': bad escape sequence at offset {offset}")]
    BadEscape { dn: String, offset: usize },

    #[error("invalid DN '{dn}': unterminated quoted value")]
    UnterminatedQuote { dn: String },
}

/// LDIF parse errors. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LdifError {
    #[error("line {line}: expected 'dn:' to start a record")]
    MissingDn { line: usize },

    #[error("line {line}: missing ':' separator")]
    MissingColon { line: usize },

    #[error("line {line}: continuation line without a preceding attribute")]
    DanglingContinuation { line: usize },

    #[error("line {line}: invalid base64 value for '{attribute}'")]
    InvalidBase64 { line: usize, attribute: String },

    #[error("line {line}: URL values are not supported for '{attribute}'")]
    UrlValue { line: usize, attribute: String },

    #[error("line {line}: unsupported changetype '{changetype}'")]
    UnsupportedChangeType { line: usize, changetype: String },

    #[error("line {line}: unsupported LDIF version '{version}'")]
    UnsupportedVersion { line: usize, version: String },

    #[error("line {line}: {source}")]
    Dn {
        line: usize,
        #[source]
        source: DnError,
    },
}

/// Errors raised when adding entries to a partition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("entry '{dn}' is outside partition suffix '{suffix}'")]
    OutsideSuffix { dn: String, suffix: String },

    #[error("entry already exists: {dn}")]
    AlreadyExists { dn: String },

    #[error("parent entry does not exist for {dn}")]
    NoSuchParent { dn: String },

    #[error("entry '{dn}' has no objectClass attribute")]
    MissingObjectClass { dn: String },
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            DirectoryError::bootstrap("x").error_code(),
            "BOOTSTRAP_FAILED"
        );
        assert_eq!(DirectoryError::AlreadyRunning.error_code(), "ALREADY_RUNNING");
        assert_eq!(DirectoryError::AlreadyStopped.error_code(), "ALREADY_STOPPED");
        assert_eq!(DirectoryError::load("a", "b").error_code(), "LOAD_FAILED");
    }

    #[test]
    fn test_lifecycle_messages() {
        assert_eq!(
            DirectoryError::AlreadyRunning.to_string(),
            "service already running"
        );
        assert_eq!(
            DirectoryError::AlreadyStopped.to_string(),
            "service is not running"
        );
    }

    #[test]
    fn test_load_message_names_resource() {
        let err = DirectoryError::load("test.ldif", "no entries imported");
        assert_eq!(
            err.to_string(),
            "failed to load LDIF resource 'test.ldif': no entries imported"
        );
    }

    #[test]
    fn test_bootstrap_with_source_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err = DirectoryError::bootstrap_with_source("listener bind failed", io);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("listener bind failed"));
    }

    #[test]
    fn test_ldif_error_wraps_dn_error() {
        let err = LdifError::Dn {
            line: 3,
            source: DnError::EmptyAttributeType {
                dn: "=x".to_string(),
            },
        };
        assert!(err.to_string().starts_with("line 3:"));
    }
}
