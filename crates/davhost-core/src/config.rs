//! Server configuration and its structural validation.
//!
//! A [`RawServerConfig`] mirrors the arguments accepted at the C boundary.
//! [`RawServerConfig::validate`] turns it into an immutable [`ServerConfig`]
//! or a [`ConfigError`] naming the first rule that failed.
//!
//! Validation never touches the network or the filesystem. Whether the root
//! directory exists and whether the TLS files can be read is decided when the
//! server starts.

use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bind address used when none is supplied.
pub const DEFAULT_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Mount prefix used when none is supplied.
pub const DEFAULT_PREFIX: &str = "/";

/// Structural configuration errors, detected before any resource is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The bind address is not an IP literal.
    #[error("invalid bind address {0:?}")]
    InvalidAddress(String),

    /// The port is outside 1..=65535.
    #[error("port {0} is outside 1..=65535")]
    InvalidPort(i64),

    /// No root directory was given.
    #[error("root directory must be set")]
    MissingRootDirectory,

    /// Only one of username and password was given.
    #[error("username and password must be set together")]
    IncompleteCredentials,

    /// Authentication is enabled but no credentials were given.
    #[error("credentials are required unless authentication is disabled")]
    MissingCredentials,

    /// Authentication is disabled but credentials were given anyway.
    #[error("credentials were supplied while authentication is disabled")]
    ConflictingAuth,

    /// TLS was requested without both a certificate and a key path.
    #[error("TLS requires both a certificate and a key path")]
    IncompleteTls,

    /// A TOML configuration document could not be parsed.
    #[error("invalid configuration document: {0}")]
    Parse(String),
}

/// Unvalidated server settings, one field per boundary argument.
///
/// `None` and `Some("")` are treated alike for every string field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawServerConfig {
    pub address: Option<String>,
    pub port: i64,
    pub directory: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub prefix: Option<String>,
    pub no_auth: bool,
    pub behind_proxy: bool,
    pub debug: bool,
}

impl RawServerConfig {
    /// Parse a TOML document with the same field names as the struct.
    ///
    /// ```
    /// use davhost_core::RawServerConfig;
    ///
    /// let raw = RawServerConfig::from_toml_str(r#"
    ///     address = "127.0.0.1"
    ///     port = 8080
    ///     directory = "./root"
    ///     no_auth = true
    /// "#).unwrap();
    /// assert_eq!(raw.port, 8080);
    /// assert!(raw.validate().is_ok());
    /// ```
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        toml::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check every structural rule and build the immutable configuration.
    ///
    /// Rules are checked in order: address, port, root directory,
    /// authentication, TLS. The first violation is returned.
    pub fn validate(self) -> Result<ServerConfig, ConfigError> {
        let bind_address = match non_empty(self.address.as_deref()) {
            None => DEFAULT_ADDRESS,
            Some(address) => address
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidAddress(address.to_string()))?,
        };

        let port = u16::try_from(self.port)
            .ok()
            .filter(|port| *port != 0)
            .ok_or(ConfigError::InvalidPort(self.port))?;

        let root_directory = non_empty(self.directory.as_deref())
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingRootDirectory)?;

        let username = non_empty(self.username.as_deref());
        let password = non_empty(self.password.as_deref());
        let auth = match (username, password, self.no_auth) {
            (Some(_), None, _) | (None, Some(_), _) => {
                return Err(ConfigError::IncompleteCredentials);
            }
            (Some(_), Some(_), true) => return Err(ConfigError::ConflictingAuth),
            (None, None, false) => return Err(ConfigError::MissingCredentials),
            (None, None, true) => Auth::Disabled,
            (Some(username), Some(password), false) => Auth::Basic(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            }),
        };

        let tls = if self.tls {
            match (
                non_empty(self.cert_file.as_deref()),
                non_empty(self.key_file.as_deref()),
            ) {
                (Some(cert), Some(key)) => Some(TlsPaths {
                    cert_path: PathBuf::from(cert),
                    key_path: PathBuf::from(key),
                }),
                _ => return Err(ConfigError::IncompleteTls),
            }
        } else {
            None
        };

        Ok(ServerConfig {
            bind_address,
            port,
            root_directory,
            auth,
            tls,
            path_prefix: normalize_prefix(self.prefix.as_deref()),
            behind_proxy: self.behind_proxy,
            debug: self.debug,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Ensure a leading slash and drop trailing ones; empty means `/`.
fn normalize_prefix(prefix: Option<&str>) -> String {
    let trimmed = prefix.unwrap_or_default().trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_PREFIX.to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Basic-auth credentials. The password is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How clients authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// Every request is served without a credential check.
    Disabled,
    /// HTTP Basic authentication against a single user.
    Basic(Credentials),
}

/// Certificate chain and private key locations, both PEM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Validated, immutable server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    bind_address: IpAddr,
    port: u16,
    root_directory: PathBuf,
    auth: Auth,
    tls: Option<TlsPaths>,
    path_prefix: String,
    behind_proxy: bool,
    debug: bool,
}

impl ServerConfig {
    pub fn bind_address(&self) -> IpAddr {
        self.bind_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Root directory exactly as it was configured.
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn tls(&self) -> Option<&TlsPaths> {
        self.tls.as_ref()
    }

    /// Normalized mount prefix: `/` or `/segment[/segment...]` without a trailing slash.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn behind_proxy(&self) -> bool {
        self.behind_proxy
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls.is_some() { "https" } else { "http" }
    }
}
