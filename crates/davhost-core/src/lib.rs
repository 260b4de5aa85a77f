//! Shared building blocks for embedding WebDAV servers behind a C boundary.
//!
//! # Components
//!
//! - [`RawServerConfig`] / [`ServerConfig`] - boundary arguments and their
//!   validated, immutable form
//! - [`ConfigError`] - structural configuration errors
//! - [`HandleTable`] / [`ServerHandle`] - concurrent arena with monotonic,
//!   never-reused integer handles
//! - [`LogLevel`] - process-wide verbosity as exposed to C callers
//!
//! Nothing in this crate performs I/O.
//!
//! # Example
//!
//! ```
//! use davhost_core::{HandleTable, RawServerConfig};
//!
//! let config = RawServerConfig {
//!     address: Some("127.0.0.1".to_string()),
//!     port: 8080,
//!     directory: Some("./root".to_string()),
//!     username: Some("admin".to_string()),
//!     password: Some("password".to_string()),
//!     ..RawServerConfig::default()
//! }
//! .validate()
//! .unwrap();
//!
//! let servers = HandleTable::new();
//! let handle = servers.insert_next(config).unwrap();
//! assert_eq!(handle.as_raw(), 0);
//! ```

#![warn(clippy::all)]

mod config;
mod handle_table;
mod log_level;

pub use config::{
    Auth, ConfigError, Credentials, DEFAULT_ADDRESS, DEFAULT_PREFIX, RawServerConfig,
    ServerConfig, TlsPaths,
};
pub use handle_table::{HandleTable, ServerHandle};
pub use log_level::{LogLevel, UnknownLogLevel};
