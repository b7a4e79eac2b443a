//! # bindstorm directory
//!
//! An embedded, in-memory LDAP directory for exercising LDAP clients.
//!
//! The server holds a single partition loaded from LDIF, answers simple
//! binds, searches and the whoami extended operation, and runs a
//! replaceable hook after every bind response. The default hook,
//! [`DisconnectAfterBind`], sends a notice of disconnect and drops the
//! session after each bind, which forces clients to redial for every
//! authentication.
//!
//! ## Example
//!
//! ```ignore
//! use bindstorm_directory::{DirectoryConfig, EmbeddedDirectory};
//!
//! let mut directory = EmbeddedDirectory::new(DirectoryConfig::new("o=sevenSeas"))?;
//! directory.start().await?;
//! directory.apply_ldif("test.ldif")?;
//! let port = directory.bound_port();
//! // ... bind against ldap://127.0.0.1:{port}
//! directory.stop().await?;
//! ```

pub mod config;
pub mod dn;
pub mod entry;
pub mod error;
pub mod hook;
pub mod ldif;
pub mod partition;
pub mod resources;
pub mod server;
pub mod service;
pub mod session;

// Re-exports
pub use config::DirectoryConfig;
pub use dn::Dn;
pub use entry::Entry;
pub use error::{DirectoryError, DirectoryResult};
pub use hook::{BindResponseHook, DisconnectAfterBind, KeepSession, SessionAction, SessionInfo};
pub use server::EmbeddedDirectory;
pub use service::{BindOutcome, BindStatus};
