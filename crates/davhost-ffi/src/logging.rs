//! Process-wide logging facility.
//!
//! A `tracing-subscriber` registry with a reloadable [`LevelFilter`] and an
//! stderr fmt layer is installed as the global default the first time any
//! instance is created (or the level is set).
//!
//! When the host already installed its own global subscriber, that one keeps
//! receiving every event and the facility runs without a subscriber of its
//! own: levels are still recorded, filtering is left to the host. Only a
//! failure to install into an empty slot is reported, as
//! [`RegistryError::LoggerInit`], and that outcome is cached.

use crate::error::{RegistryError, RegistryResult};
use davhost_core::LogLevel;
use std::io;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Registry, fmt, reload};

/// Initial level, one of debug|info|warn|error.
pub const LOG_LEVEL_ENV: &str = "DAVHOST_LOG_LEVEL";

type LevelHandle = reload::Handle<LevelFilter, Registry>;

/// Who owns the global subscriber.
enum Facility {
    /// Installed here; the level filter can be reloaded.
    Owned(LevelHandle),
    /// Installed by the host before the first call.
    Host,
}

static FACILITY: OnceLock<Result<Facility, String>> = OnceLock::new();
static CURRENT_LEVEL: AtomicI32 = AtomicI32::new(LogLevel::Info as i32);

/// Install the global subscriber once and report whether logging is usable.
pub fn init() -> RegistryResult<()> {
    facility().map(|_| ())
}

/// Change the level for every subsequent event of every instance.
///
/// Under a host-provided subscriber the level is recorded but the host's
/// own filter decides what is emitted.
pub fn set_level(level: LogLevel) -> RegistryResult<()> {
    match facility()? {
        Facility::Owned(handle) => handle
            .reload(level.level_filter())
            .map_err(|e| RegistryError::LoggerInit(e.to_string()))?,
        Facility::Host => {}
    }
    CURRENT_LEVEL.store(level as i32, Ordering::Release);
    tracing::debug!(level = %level, "Log level changed");
    Ok(())
}

/// The level currently in effect.
pub fn current_level() -> LogLevel {
    LogLevel::try_from(CURRENT_LEVEL.load(Ordering::Acquire)).unwrap_or_default()
}

/// True when the global subscriber was installed by this library.
pub fn owns_subscriber() -> bool {
    matches!(FACILITY.get(), Some(Ok(Facility::Owned(_))))
}

fn facility() -> RegistryResult<&'static Facility> {
    FACILITY
        .get_or_init(install)
        .as_ref()
        .map_err(|e| RegistryError::LoggerInit(e.clone()))
}

fn install() -> Result<Facility, String> {
    let initial = initial_level();
    CURRENT_LEVEL.store(initial as i32, Ordering::Release);

    if tracing::dispatcher::has_been_set() {
        tracing::debug!("Global subscriber already installed, leaving it in place");
        return Ok(Facility::Host);
    }

    let (filter, handle) = reload::Layer::new(initial.level_filter());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .try_init()
        .map_err(|e| e.to_string())?;

    Ok(Facility::Owned(handle))
}

fn initial_level() -> LogLevel {
    match std::env::var(LOG_LEVEL_ENV) {
        Ok(value) => value.parse().unwrap_or_else(|e| {
            eprintln!("davhost: ignoring {LOG_LEVEL_ENV}: {e}");
            LogLevel::default()
        }),
        Err(_) => LogLevel::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_is_idempotent() {
        init().unwrap();
        init().unwrap();
        assert!(owns_subscriber());
    }

    #[test]
    #[serial]
    fn test_set_level_updates_current() {
        set_level(LogLevel::Error).unwrap();
        assert_eq!(current_level(), LogLevel::Error);

        set_level(LogLevel::Debug).unwrap();
        assert_eq!(current_level(), LogLevel::Debug);

        set_level(LogLevel::Info).unwrap();
        assert_eq!(current_level(), LogLevel::Info);
    }
}
