//! One registered server: configuration, runtime and lifecycle state.

use crate::error::{RegistryError, RegistryResult};
use davhost_core::{ServerConfig, ServerHandle};
use davhost_webdav::{DrainOutcome, WebDavServer};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::{info, warn};

/// Worker threads per instance runtime.
const WORKER_THREADS: usize = 2;

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Created,
    Running,
    Stopped,
}

impl ServerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time description of an instance.
///
/// Renders as `Address: <ip>, Port: <port>, Status: <status>, Directory: <root>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub address: IpAddr,
    pub port: u16,
    pub status: ServerStatus,
    pub directory: PathBuf,
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Address: {}, Port: {}, Status: {}, Directory: {}",
            self.address,
            self.port,
            self.status,
            self.directory.display()
        )
    }
}

/// A server owned by the registry.
///
/// Every instance drives its listener on a dedicated multi-threaded tokio
/// runtime; lifecycle calls block on it and must not run inside another
/// runtime.
pub struct ServerInstance {
    config: ServerConfig,
    // Declared before `runtime` so the server is dropped first
    server: Option<WebDavServer>,
    runtime: Runtime,
    status: ServerStatus,
}

impl ServerInstance {
    /// Build the instance and its runtime. Nothing is bound yet.
    pub fn new(config: ServerConfig) -> RegistryResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name("davhost-worker")
            .enable_all()
            .build()
            .map_err(RegistryError::HandlerInit)?;

        Ok(Self {
            config,
            server: None,
            runtime,
            status: ServerStatus::Created,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Bound address while running. Differs from the configured one only in
    /// tests that bind ephemeral ports.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.as_ref().map(|server| server.addr)
    }

    /// Bind and begin serving. Works from `Created` and from `Stopped`.
    pub fn start(&mut self, handle: ServerHandle, verify_root: bool) -> RegistryResult<()> {
        if self.status == ServerStatus::Running {
            return Err(RegistryError::AlreadyRunning(handle));
        }

        let server = self
            .runtime
            .block_on(WebDavServer::start(&self.config, verify_root))?;

        info!(handle = %handle, url = %server.url(), "Server running");
        self.server = Some(server);
        self.status = ServerStatus::Running;
        Ok(())
    }

    /// Stop serving, draining open connections for at most `grace`.
    ///
    /// Always ends in `Stopped`. A stop that had to abort connections is
    /// reported as [`RegistryError::ShutdownFailed`].
    pub fn stop(&mut self, handle: ServerHandle, grace: Duration) -> RegistryResult<()> {
        let previous = self.status;
        self.status = ServerStatus::Stopped;

        let Some(server) = self.server.take() else {
            if previous != ServerStatus::Stopped {
                info!(handle = %handle, from = %previous, "Server marked stopped");
            }
            return Ok(());
        };

        match self.runtime.block_on(server.stop(grace)) {
            DrainOutcome::Drained => {
                info!(handle = %handle, "Server stopped");
                Ok(())
            }
            DrainOutcome::TimedOut { aborted } => {
                warn!(handle = %handle, aborted, "Server stopped after grace period");
                Err(RegistryError::ShutdownFailed { handle, aborted })
            }
        }
    }

    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            address: self.config.bind_address(),
            port: self.config.port(),
            status: self.status,
            directory: self.config.root_directory().to_path_buf(),
        }
    }
}

impl fmt::Debug for ServerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerInstance")
            .field("config", &self.config)
            .field("status", &self.status)
            .field("addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}
