//! Helpers for driving the C boundary from Rust tests.

#![allow(dead_code)]

use davhost::{davhost_create_server, davhost_get_server_info};
use std::ffi::{CStr, CString, c_char, c_int};
use std::net::TcpListener;
use std::path::Path;
use std::ptr;
use std::time::Duration;

pub const TEST_USER: &str = "admin";
pub const TEST_PASSWORD: &str = "test-password-12345";

pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind ephemeral listener");
    listener.local_addr().expect("Ephemeral listener has no address").port()
}

fn cstring(s: &str) -> Option<CString> {
    Some(CString::new(s).expect("Test strings contain no NUL"))
}

fn as_ptr(s: &Option<CString>) -> *const c_char {
    s.as_ref().map_or(ptr::null(), |s| s.as_ptr())
}

/// Arguments to `davhost_create_server`; `None` is passed as NULL.
#[derive(Debug, Clone)]
pub struct CreateArgs {
    pub address: Option<CString>,
    pub port: c_int,
    pub directory: Option<CString>,
    pub username: Option<CString>,
    pub password: Option<CString>,
    pub tls: bool,
    pub cert_file: Option<CString>,
    pub key_file: Option<CString>,
    pub prefix: Option<CString>,
    pub no_auth: bool,
    pub behind_proxy: bool,
    pub debug: bool,
}

impl CreateArgs {
    /// Localhost server on a free port with the test credentials.
    pub fn new(root: &Path) -> Self {
        Self {
            address: cstring("127.0.0.1"),
            port: c_int::from(free_port()),
            directory: cstring(&root.display().to_string()),
            username: cstring(TEST_USER),
            password: cstring(TEST_PASSWORD),
            tls: false,
            cert_file: None,
            key_file: None,
            prefix: None,
            no_auth: false,
            behind_proxy: false,
            debug: false,
        }
    }

    pub fn without_auth(mut self) -> Self {
        self.username = None;
        self.password = None;
        self.no_auth = true;
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = cstring(prefix);
        self
    }

    pub fn base_url(&self) -> String {
        let prefix = self
            .prefix
            .as_ref()
            .map(|p| p.to_string_lossy().trim_end_matches('/').to_string())
            .unwrap_or_default();
        format!("http://127.0.0.1:{}{prefix}", self.port)
    }

    pub fn create(&self) -> c_int {
        // SAFETY: every pointer is NULL or a live CString
        unsafe {
            davhost_create_server(
                as_ptr(&self.address),
                self.port,
                as_ptr(&self.directory),
                as_ptr(&self.username),
                as_ptr(&self.password),
                c_int::from(self.tls),
                as_ptr(&self.cert_file),
                as_ptr(&self.key_file),
                as_ptr(&self.prefix),
                c_int::from(self.no_auth),
                c_int::from(self.behind_proxy),
                c_int::from(self.debug),
            )
        }
    }
}

/// Fetch the info line, or the negative code.
pub fn info(handle: c_int) -> Result<String, c_int> {
    let mut buf = vec![0 as c_char; 1024];
    // SAFETY: buf is writable for its full length
    let written = unsafe { davhost_get_server_info(handle, buf.as_mut_ptr(), buf.len() as c_int) };
    if written < 0 {
        return Err(written);
    }
    // SAFETY: the library NUL-terminated the text
    let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
    let text = text.to_str().expect("Info is UTF-8").to_string();
    assert_eq!(text.len(), written as usize, "Return value must equal strlen");
    Ok(text)
}

/// Issue one request on a throwaway runtime and return the status code.
pub fn http_status(method: &str, url: &str, auth: Option<(&str, &str)>) -> u16 {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build test runtime");
    runtime.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build client");
        let method = reqwest::Method::from_bytes(method.as_bytes()).expect("Valid method");
        let mut request = client.request(method, url);
        if let Some((user, password)) = auth {
            request = request.basic_auth(user, Some(password));
        }
        request.send().await.expect("Request failed").status().as_u16()
    })
}

/// True if nothing accepts connections on `port` any more.
pub fn connection_refused(port: u16) -> bool {
    std::net::TcpStream::connect_timeout(
        &std::net::SocketAddr::from(([127, 0, 0, 1], port)),
        Duration::from_secs(1),
    )
    .is_err()
}
