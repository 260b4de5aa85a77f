//! Process-wide registry of server instances.
//!
//! Instances live in a [`HandleTable`] behind their own
//! `parking_lot::RwLock`. A lookup clones the `Arc` out of the table, so the
//! table's shard lock is never held while a lifecycle call blocks; calls on
//! the same handle serialize on the instance lock, calls on different
//! handles never contend.

use crate::error::{RegistryError, RegistryResult};
use crate::instance::{ServerInfo, ServerInstance};
use crate::logging;
use davhost_core::{Auth, HandleTable, RawServerConfig, ServerHandle};
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Overrides the default shutdown grace period, in milliseconds.
pub const SHUTDOWN_GRACE_ENV: &str = "DAVHOST_SHUTDOWN_GRACE_MS";

/// Default time a stopping server waits for in-flight requests.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type SharedInstance = Arc<RwLock<ServerInstance>>;

/// Tunables shared by every instance of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    /// How long `stop` waits for open connections before aborting them.
    pub shutdown_grace: Duration,
    /// Refuse to start when the root directory is missing.
    pub verify_root_on_start: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            verify_root_on_start: true,
        }
    }
}

impl RegistryOptions {
    /// Defaults, with the grace period taken from the environment if set.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(value) = std::env::var(SHUTDOWN_GRACE_ENV) {
            match value.trim().parse::<u64>() {
                Ok(millis) => options.shutdown_grace = Duration::from_millis(millis),
                Err(e) => warn!(value = %value, error = %e, "Ignoring {SHUTDOWN_GRACE_ENV}"),
            }
        }
        options
    }
}

/// Handle → instance map with lifecycle operations.
#[derive(Debug)]
pub struct Registry {
    instances: HandleTable<SharedInstance>,
    options: RwLock<RegistryOptions>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// The registry behind the C boundary, created on first use.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(|| Registry::new(RegistryOptions::from_env()))
    }

    pub fn new(options: RegistryOptions) -> Self {
        Self {
            instances: HandleTable::new(),
            options: RwLock::new(options),
        }
    }

    pub fn options(&self) -> RegistryOptions {
        *self.options.read()
    }

    pub fn set_shutdown_grace(&self, grace: Duration) {
        self.options.write().shutdown_grace = grace;
        debug!(grace_ms = grace.as_millis(), "Shutdown grace period changed");
    }

    /// Validate `raw` and register a new instance in `Created` state.
    pub fn create(&self, raw: RawServerConfig) -> RegistryResult<ServerHandle> {
        logging::init()?;

        let config = raw.validate()?;
        let auth_disabled = matches!(config.auth(), Auth::Disabled);
        let addr = config.socket_addr();
        let instance = ServerInstance::new(config)?;

        let handle = self
            .instances
            .insert_next(Arc::new(RwLock::new(instance)))
            .ok_or(RegistryError::HandlesExhausted)?;

        info!(handle = %handle, addr = %addr, "Server created");
        if auth_disabled {
            warn!(handle = %handle, "Authentication disabled, anyone can access this server");
        }
        Ok(handle)
    }

    pub fn start(&self, handle: ServerHandle) -> RegistryResult<()> {
        let instance = self.lookup(handle)?;
        let verify_root = self.options().verify_root_on_start;
        instance.write().start(handle, verify_root)
    }

    pub fn stop(&self, handle: ServerHandle) -> RegistryResult<()> {
        let instance = self.lookup(handle)?;
        let grace = self.options().shutdown_grace;
        instance.write().stop(handle, grace)
    }

    pub fn info(&self, handle: ServerHandle) -> RegistryResult<ServerInfo> {
        let instance = self.lookup(handle)?;
        let info = instance.read().info();
        Ok(info)
    }

    /// Stop (best effort) and unregister one instance.
    pub fn destroy(&self, handle: ServerHandle) -> RegistryResult<()> {
        let instance = self
            .instances
            .remove(handle)
            .ok_or(RegistryError::NotFound(handle.as_raw()))?;
        self.shut_down(handle, &instance);
        info!(handle = %handle, "Server destroyed");
        Ok(())
    }

    /// Stop every instance concurrently and empty the registry.
    ///
    /// Handles keep counting up afterwards.
    pub fn destroy_all(&self) {
        let drained = self.instances.drain();
        if drained.is_empty() {
            return;
        }

        let count = drained.len();
        thread::scope(|scope| {
            for (handle, instance) in &drained {
                scope.spawn(move || self.shut_down(*handle, instance));
            }
        });
        info!(count, "All servers destroyed");
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn lookup(&self, handle: ServerHandle) -> RegistryResult<SharedInstance> {
        self.instances
            .get_cloned(handle)
            .ok_or(RegistryError::NotFound(handle.as_raw()))
    }

    fn shut_down(&self, handle: ServerHandle, instance: &SharedInstance) {
        let grace = self.options().shutdown_grace;
        if let Err(e) = instance.write().stop(handle, grace) {
            warn!(handle = %handle, error = %e, "Server did not stop cleanly");
        }
    }
}
