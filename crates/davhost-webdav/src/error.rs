//! Errors raised while starting or running a WebDAV server instance.
//!
//! Configuration problems never show up here: they are rejected by
//! [`davhost_core::RawServerConfig::validate`] before a server is built.
//! Everything in this module involves real I/O (filesystem, sockets, PEM
//! files) and is therefore only detected at start time.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Failures loading TLS material.
#[derive(Debug, Error)]
pub enum TlsError {
    /// A PEM file could not be read or decoded.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The certificate file holds no certificate.
    #[error("no certificate found in {0}")]
    NoCertificates(PathBuf),

    /// The key file holds no PKCS#8, PKCS#1 or SEC1 private key.
    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    /// rustls rejected the certificate/key pair.
    #[error("invalid certificate or key: {0}")]
    Rustls(#[from] tokio_rustls::rustls::Error),
}

/// Errors from the server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The root directory does not exist or is not a directory.
    #[error("root directory {} is unavailable: {source}", path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The listener could not be bound (port in use, permission denied).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// TLS material could not be loaded.
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    /// Other IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for server lifecycle operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_message_names_address() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let err = ServerError::Bind {
            addr,
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:8080"));
    }

    #[test]
    fn test_tls_error_converts() {
        let err: ServerError = TlsError::NoCertificates(PathBuf::from("cert.pem")).into();
        assert!(matches!(err, ServerError::Tls(TlsError::NoCertificates(_))));
        assert!(err.to_string().contains("cert.pem"));
    }
}
