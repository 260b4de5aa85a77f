//! HTTP Basic authentication and client address resolution.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use davhost_core::{Auth, Credentials};
use hyper::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use std::net::SocketAddr;
use subtle::ConstantTimeEq;

/// Header consulted for the original client address behind a reverse proxy.
const FORWARDED_FOR: &str = "x-forwarded-for";

/// Result of checking a request's credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AuthOutcome {
    /// Authentication is disabled for this server.
    Anonymous,
    /// Credentials matched; carries the username.
    Authorized(String),
    /// No usable `Authorization` header.
    Missing,
    /// A username was presented but it or its password did not match.
    Denied { username: String },
}

/// Checks `Authorization: Basic` headers against the configured user.
#[derive(Debug, Clone)]
pub(crate) struct Authenticator {
    credentials: Option<Credentials>,
}

impl Authenticator {
    pub(crate) fn new(auth: &Auth) -> Self {
        let credentials = match auth {
            Auth::Disabled => None,
            Auth::Basic(credentials) => Some(credentials.clone()),
        };
        Self { credentials }
    }

    pub(crate) fn check(&self, headers: &HeaderMap) -> AuthOutcome {
        let Some(expected) = &self.credentials else {
            return AuthOutcome::Anonymous;
        };

        let Some((username, password)) = headers.get(AUTHORIZATION).and_then(parse_basic) else {
            return AuthOutcome::Missing;
        };

        // Evaluate both comparisons so timing does not reveal which one failed
        let user_ok = constant_time_eq(&username, expected.username());
        let password_ok = constant_time_eq(&password, expected.password());
        if user_ok & password_ok {
            AuthOutcome::Authorized(username)
        } else {
            AuthOutcome::Denied { username }
        }
    }
}

/// Decode `Basic <base64(user:password)>`.
fn parse_basic(value: &HeaderValue) -> Option<(String, String)> {
    let value = value.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Address to attribute a request to in logs.
///
/// Behind a trusted proxy this is the first `X-Forwarded-For` entry;
/// otherwise (or when the header is absent) the socket peer.
pub(crate) fn client_address(headers: &HeaderMap, peer: SocketAddr, behind_proxy: bool) -> String {
    if behind_proxy
        && let Some(forwarded) = headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    peer.to_string()
}
