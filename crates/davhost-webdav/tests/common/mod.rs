//! Test harness for WebDAV server integration tests.
//!
//! `TestServer` starts a [`WebDavServer`] over a temporary root directory on
//! a free localhost port and wraps a `reqwest` client with WebDAV verbs.

#![allow(dead_code)]

use davhost_core::{RawServerConfig, ServerConfig};
use davhost_webdav::{DrainOutcome, WebDavServer};
use reqwest::{Client, Method, Response, StatusCode};
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

pub const TEST_USER: &str = "admin";
pub const TEST_PASSWORD: &str = "test-password-12345";

/// Grab a port the OS considers free right now.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind ephemeral listener");
    listener.local_addr().expect("Ephemeral listener has no address").port()
}

/// Baseline config for a localhost server without auth.
pub fn raw_config(root: &Path, port: u16) -> RawServerConfig {
    RawServerConfig {
        address: Some("127.0.0.1".to_string()),
        port: i64::from(port),
        directory: Some(root.display().to_string()),
        no_auth: true,
        ..RawServerConfig::default()
    }
}

pub fn with_auth(mut raw: RawServerConfig) -> RawServerConfig {
    raw.no_auth = false;
    raw.username = Some(TEST_USER.to_string());
    raw.password = Some(TEST_PASSWORD.to_string());
    raw
}

/// Self-signed localhost certificate and key under `tests/fixtures`.
pub fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

pub fn with_tls(mut raw: RawServerConfig) -> RawServerConfig {
    raw.tls = true;
    raw.cert_file = Some(fixture("localhost.crt"));
    raw.key_file = Some(fixture("localhost.key"));
    raw
}

/// Running server plus client; the root directory is removed on drop.
pub struct TestServer {
    server: Option<WebDavServer>,
    pub client: Client,
    pub config: ServerConfig,
    pub root: TempDir,
    credentials: Option<(String, String)>,
}

impl TestServer {
    /// Server without authentication at prefix `/`.
    pub async fn start() -> Self {
        Self::start_with(|raw| raw).await
    }

    /// Server requiring the test credentials; the client sends them.
    pub async fn start_with_auth() -> Self {
        let mut server = Self::start_with(with_auth).await;
        server.credentials = Some((TEST_USER.to_string(), TEST_PASSWORD.to_string()));
        server
    }

    /// Server whose config is adjusted by `customize` before validation.
    pub async fn start_with(customize: impl FnOnce(RawServerConfig) -> RawServerConfig) -> Self {
        let root = TempDir::new().expect("Failed to create root directory");
        let config = customize(raw_config(root.path(), free_port()))
            .validate()
            .expect("Test config should be valid");
        let server = WebDavServer::start(&config, true)
            .await
            .expect("Server should start");

        Self {
            server: Some(server),
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .danger_accept_invalid_certs(config.tls().is_some())
                .build()
                .expect("Failed to build client"),
            config,
            root,
            credentials: None,
        }
    }

    pub fn server(&self) -> &WebDavServer {
        self.server.as_ref().expect("Server already stopped")
    }

    pub fn url(&self, path: &str) -> String {
        let base = self.server().url();
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    /// Drop the client credentials so requests go out anonymously.
    pub fn anonymous(&mut self) {
        self.credentials = None;
    }

    pub fn set_credentials(&mut self, user: &str, password: &str) {
        self.credentials = Some((user.to_string(), password.to_string()));
    }

    pub fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str) -> Response {
        self.request(Method::GET, path)
            .send()
            .await
            .expect("GET failed")
    }

    pub async fn get_bytes(&self, path: &str) -> Option<Vec<u8>> {
        let resp = self.get(path).await;
        if resp.status() != StatusCode::OK {
            return None;
        }
        Some(resp.bytes().await.expect("Failed to read body").to_vec())
    }

    pub async fn put(&self, path: &str, body: Vec<u8>) -> Response {
        self.request(Method::PUT, path)
            .body(body)
            .send()
            .await
            .expect("PUT failed")
    }

    pub async fn put_ok(&self, path: &str, body: Vec<u8>) {
        let resp = self.put(path, body).await;
        assert!(
            resp.status().is_success(),
            "PUT {path} failed: {}",
            resp.status()
        );
    }

    pub async fn mkcol(&self, path: &str) -> Response {
        self.request(webdav_method("MKCOL"), path)
            .send()
            .await
            .expect("MKCOL failed")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.request(Method::DELETE, path)
            .send()
            .await
            .expect("DELETE failed")
    }

    pub async fn propfind(&self, path: &str, depth: &str) -> Response {
        self.request(webdav_method("PROPFIND"), path)
            .header("Depth", depth)
            .send()
            .await
            .expect("PROPFIND failed")
    }

    /// Stop the server with the given grace period.
    pub async fn stop(&mut self, grace: Duration) -> DrainOutcome {
        let server = self.server.take().expect("Server already stopped");
        server.stop(grace).await
    }
}

pub fn webdav_method(name: &str) -> Method {
    Method::from_bytes(name.as_bytes()).expect("Valid method name")
}

/// Assert that `path` under the root holds exactly `expected`.
pub fn assert_on_disk(server: &TestServer, path: &str, expected: &[u8]) {
    let full = server.root.path().join(path.trim_start_matches('/'));
    let actual = std::fs::read(&full)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", full.display()));
    assert_eq!(actual, expected, "Content mismatch for {path}");
}
