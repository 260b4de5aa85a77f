//! WebDAV server instances for the davhost library.
//!
//! Each [`WebDavServer`] serves one directory tree over HTTP or HTTPS,
//! optionally behind HTTP Basic authentication, and shuts down gracefully:
//! it stops accepting, lets in-flight requests finish within a grace period,
//! and aborts whatever is left.
//!
//! # Example
//!
//! ```no_run
//! use davhost_core::RawServerConfig;
//! use davhost_webdav::WebDavServer;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RawServerConfig {
//!     address: Some("127.0.0.1".to_string()),
//!     port: 8080,
//!     directory: Some("/srv/share".to_string()),
//!     no_auth: true,
//!     ..RawServerConfig::default()
//! }
//! .validate()?;
//!
//! let server = WebDavServer::start(&config, true).await?;
//! println!("Serving at {}", server.url());
//!
//! server.stop(Duration::from_secs(5)).await;
//! # Ok(())
//! # }
//! ```
//!
//! # Runtime
//!
//! The accept loop and every connection are spawned on the tokio runtime
//! that calls [`WebDavServer::start`]. Callers without an async context
//! typically give each server a dedicated runtime.

mod auth;
mod error;
mod server;
mod service;
mod tls;

pub use error::{ServerError, ServerResult, TlsError};
pub use server::{DrainOutcome, WebDavServer};
pub use tls::load_acceptor;
