//! # bindstorm driver
//!
//! Hammers an LDAP server with simple binds, one fresh connection per
//! bind, and reports progress every N successes.
//!
//! ```ignore
//! let config = DriverConfig::new("127.0.0.1", port, principal, "secret");
//! let mut bind_loop = BindLoop::new(&config)?;
//! let mut counter = SuccessCounter::new(config.progress_interval);
//! bind_loop.run(&mut counter, &shutdown).await?;
//! ```

pub mod config;
pub mod connector;
pub mod counter;
pub mod driver;
pub mod error;

pub use config::DriverConfig;
pub use connector::LdapConnector;
pub use counter::SuccessCounter;
pub use driver::{BindLoop, DriverState};
pub use error::{DriverError, DriverResult};
