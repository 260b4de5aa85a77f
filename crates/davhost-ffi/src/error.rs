//! Registry errors and their stable C error codes.

use davhost_core::{ConfigError, ServerHandle};
use davhost_webdav::{ServerError, TlsError};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Status codes returned across the C boundary.
///
/// Values are part of the ABI and never renumbered. Every failure is
/// negative so it cannot be mistaken for a handle or a byte count.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Success = 0,
    InvalidConfig = -1,
    LoggerInit = -2,
    HandlerInit = -3,
    NotFound = -4,
    AlreadyRunning = -5,
    Bind = -6,
    ShutdownFailed = -7,
    BufferTooSmall = -8,
    Unsupported = -9,
    InvalidArgument = -10,
    Tls = -11,
    RootUnavailable = -12,
    Internal = -13,
}

impl ErrorCode {
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("logging facility unavailable: {0}")]
    LoggerInit(String),

    #[error("failed to set up request handling: {0}")]
    HandlerInit(#[source] io::Error),

    #[error("no server with handle #{0}")]
    NotFound(i32),

    #[error("server {0} is already running")]
    AlreadyRunning(ServerHandle),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("root directory {} is unavailable: {source}", path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The grace period ran out; the server is stopped regardless.
    #[error("server {handle} did not drain in time, {aborted} connection(s) aborted")]
    ShutdownFailed { handle: ServerHandle, aborted: usize },

    #[error("buffer of {capacity} bytes is too small, {required} required")]
    BufferTooSmall { required: usize, capacity: i32 },

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("handle space exhausted")]
    HandlesExhausted,
}

impl RegistryError {
    /// Map to the stable boundary code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Self::LoggerInit(_) => ErrorCode::LoggerInit,
            Self::HandlerInit(_) => ErrorCode::HandlerInit,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::AlreadyRunning(_) => ErrorCode::AlreadyRunning,
            Self::Bind { .. } => ErrorCode::Bind,
            Self::Tls(_) => ErrorCode::Tls,
            Self::RootUnavailable { .. } => ErrorCode::RootUnavailable,
            Self::ShutdownFailed { .. } => ErrorCode::ShutdownFailed,
            Self::BufferTooSmall { .. } => ErrorCode::BufferTooSmall,
            Self::Unsupported(_) => ErrorCode::Unsupported,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::HandlesExhausted => ErrorCode::Internal,
        }
    }
}

impl From<ServerError> for RegistryError {
    fn from(e: ServerError) -> Self {
        match e {
            ServerError::Bind { addr, source } => Self::Bind { addr, source },
            ServerError::Tls(e) => Self::Tls(e),
            ServerError::RootUnavailable { path, source } => Self::RootUnavailable { path, source },
            ServerError::Io(e) => Self::HandlerInit(e),
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorCode::Success.as_raw(), 0);
        assert_eq!(ErrorCode::InvalidConfig.as_raw(), -1);
        assert_eq!(ErrorCode::LoggerInit.as_raw(), -2);
        assert_eq!(ErrorCode::HandlerInit.as_raw(), -3);
        assert_eq!(ErrorCode::NotFound.as_raw(), -4);
        assert_eq!(ErrorCode::AlreadyRunning.as_raw(), -5);
        assert_eq!(ErrorCode::Bind.as_raw(), -6);
        assert_eq!(ErrorCode::ShutdownFailed.as_raw(), -7);
        assert_eq!(ErrorCode::BufferTooSmall.as_raw(), -8);
        assert_eq!(ErrorCode::Unsupported.as_raw(), -9);
        assert_eq!(ErrorCode::InvalidArgument.as_raw(), -10);
        assert_eq!(ErrorCode::Tls.as_raw(), -11);
        assert_eq!(ErrorCode::RootUnavailable.as_raw(), -12);
        assert_eq!(ErrorCode::Internal.as_raw(), -13);
    }

    #[test]
    fn test_server_errors_keep_their_kind() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let bind: RegistryError = ServerError::Bind {
            addr,
            source: io::Error::from(io::ErrorKind::AddrInUse),
        }
        .into();
        assert_eq!(bind.code(), ErrorCode::Bind);

        let tls: RegistryError = ServerError::Tls(TlsError::NoPrivateKey(PathBuf::from("k"))).into();
        assert_eq!(tls.code(), ErrorCode::Tls);

        let root: RegistryError = ServerError::RootUnavailable {
            path: PathBuf::from("/nope"),
            source: io::Error::from(io::ErrorKind::NotFound),
        }
        .into();
        assert_eq!(root.code(), ErrorCode::RootUnavailable);
    }

    #[test]
    fn test_config_error_converts() {
        let err: RegistryError = ConfigError::MissingRootDirectory.into();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }
}
