//! C ABI for embedded WebDAV servers.
//!
//! Builds `libdavhost` (cdylib) with the functions declared in
//! `include/davhost.h`. A host creates servers from plain arguments, gets
//! back an integer handle and drives each server through
//! `create → start → stop` (restartable) until it destroys the handle or
//! calls [`davhost_cleanup`].
//!
//! Every function returns either a non-negative result or a negative
//! [`ErrorCode`]; panics are caught and reported as
//! [`ErrorCode::Internal`], never unwound into the host.
//!
//! # Threading
//!
//! Functions may be called from any host thread, but not from a thread that
//! is already driving a tokio runtime: start and stop block on the
//! instance's own runtime.
//!
//! # Example
//!
//! ```c
//! int h = davhost_create_server("127.0.0.1", 8080, "/srv/share",
//!                               "admin", "secret", 0, NULL, NULL,
//!                               "/dav", 0, 0, 0);
//! if (h < 0 || davhost_start_server(h) != DAVHOST_SUCCESS) {
//!     /* handle error */
//! }
//! char info[256];
//! if (davhost_get_server_info(h, info, sizeof info) > 0) {
//!     puts(info);
//! }
//! davhost_stop_server(h);
//! davhost_cleanup();
//! ```

mod error;
mod instance;
mod logging;
mod registry;
mod strings;

pub use error::{ErrorCode, RegistryError, RegistryResult};
pub use instance::{ServerInfo, ServerStatus};
pub use logging::{LOG_LEVEL_ENV, current_level as current_log_level, owns_subscriber};
pub use registry::{DEFAULT_SHUTDOWN_GRACE, Registry, RegistryOptions, SHUTDOWN_GRACE_ENV};

use davhost_core::{LogLevel, RawServerConfig, ServerHandle};
use std::ffi::{c_char, c_int};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;
use tracing::{error, warn};

/// Version reported by [`davhost_get_version`].
pub const VERSION: &str = concat!("davhost ", env!("CARGO_PKG_VERSION"));

/// Run one boundary operation: map errors to codes and contain panics.
fn guarded(operation: &'static str, body: impl FnOnce() -> RegistryResult<c_int>) -> c_int {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            let code = e.code();
            warn!(operation, code = code.as_raw(), error = %e, "Operation failed");
            code.as_raw()
        }
        Err(_) => {
            error!(operation, "Panic caught at the C boundary");
            ErrorCode::Internal.as_raw()
        }
    }
}

/// Negative integers never name an instance; they miss like stale handles.
fn handle_from_raw(raw: c_int) -> RegistryResult<ServerHandle> {
    ServerHandle::from_raw(raw).ok_or(RegistryError::NotFound(raw))
}

/// Create a server in `Created` state.
///
/// NULL or empty `address` binds all interfaces; NULL or empty `prefix`
/// serves at `/`. Integer flags are true when non-zero.
///
/// Returns the new handle (≥ 0) or a negative error code.
///
/// # Safety
///
/// Every pointer must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn davhost_create_server(
    address: *const c_char,
    port: c_int,
    directory: *const c_char,
    username: *const c_char,
    password: *const c_char,
    tls: c_int,
    cert_file: *const c_char,
    key_file: *const c_char,
    prefix: *const c_char,
    no_auth: c_int,
    behind_proxy: c_int,
    debug: c_int,
) -> c_int {
    guarded("create", || {
        // SAFETY: pointer validity is the caller's contract
        let raw = unsafe {
            RawServerConfig {
                address: strings::opt_string(address, "address")?,
                port: i64::from(port),
                directory: strings::opt_string(directory, "directory")?,
                username: strings::opt_string(username, "username")?,
                password: strings::opt_string(password, "password")?,
                tls: tls != 0,
                cert_file: strings::opt_string(cert_file, "cert_file")?,
                key_file: strings::opt_string(key_file, "key_file")?,
                prefix: strings::opt_string(prefix, "prefix")?,
                no_auth: no_auth != 0,
                behind_proxy: behind_proxy != 0,
                debug: debug != 0,
            }
        };
        Registry::global().create(raw).map(ServerHandle::as_raw)
    })
}

/// Bind the listener and begin serving.
#[unsafe(no_mangle)]
pub extern "C" fn davhost_start_server(handle: c_int) -> c_int {
    guarded("start", || {
        Registry::global().start(handle_from_raw(handle)?)?;
        Ok(ErrorCode::Success.as_raw())
    })
}

/// Stop serving. Succeeds for servers that are not running.
#[unsafe(no_mangle)]
pub extern "C" fn davhost_stop_server(handle: c_int) -> c_int {
    guarded("stop", || {
        Registry::global().stop(handle_from_raw(handle)?)?;
        Ok(ErrorCode::Success.as_raw())
    })
}

/// Stop the server if needed and release its handle.
#[unsafe(no_mangle)]
pub extern "C" fn davhost_destroy_server(handle: c_int) -> c_int {
    guarded("destroy", || {
        Registry::global().destroy(handle_from_raw(handle)?)?;
        Ok(ErrorCode::Success.as_raw())
    })
}

/// Write a one-line description of the server into `buffer`.
///
/// Returns the number of bytes written, excluding the NUL terminator.
/// When the text does not fit, nothing is written and
/// `DAVHOST_ERROR_BUFFER_TOO_SMALL` is returned.
///
/// # Safety
///
/// `buffer` must be NULL or valid for writes of `capacity` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn davhost_get_server_info(
    handle: c_int,
    buffer: *mut c_char,
    capacity: c_int,
) -> c_int {
    guarded("info", || {
        let info = Registry::global().info(handle_from_raw(handle)?)?;
        // SAFETY: buffer validity is the caller's contract
        unsafe { strings::write_to_buffer(&info.to_string(), buffer, capacity) }
    })
}

/// Set the process-wide log level (0 debug, 1 info, 2 warn, 3 error).
#[unsafe(no_mangle)]
pub extern "C" fn davhost_set_log_level(level: c_int) -> c_int {
    guarded("set_log_level", || {
        let level =
            LogLevel::try_from(level).map_err(|e| RegistryError::InvalidArgument(e.to_string()))?;
        logging::set_level(level)?;
        Ok(ErrorCode::Success.as_raw())
    })
}

/// Set how long a stop waits for in-flight requests, in milliseconds.
#[unsafe(no_mangle)]
pub extern "C" fn davhost_set_shutdown_grace(millis: c_int) -> c_int {
    guarded("set_shutdown_grace", || {
        let millis = u64::try_from(millis).map_err(|_| {
            RegistryError::InvalidArgument(format!("grace period {millis}ms is negative"))
        })?;
        Registry::global().set_shutdown_grace(Duration::from_millis(millis));
        Ok(ErrorCode::Success.as_raw())
    })
}

/// Not supported: credentials are fixed when a server is created.
#[unsafe(no_mangle)]
pub extern "C" fn davhost_add_user(
    _handle: c_int,
    _username: *const c_char,
    _password: *const c_char,
    _directory: *const c_char,
) -> c_int {
    guarded("add_user", || Err(RegistryError::Unsupported("adding users")))
}

/// Not supported: credentials are fixed when a server is created.
#[unsafe(no_mangle)]
pub extern "C" fn davhost_remove_user(_handle: c_int, _username: *const c_char) -> c_int {
    guarded("remove_user", || Err(RegistryError::Unsupported("removing users")))
}

/// Library version string. Release it with [`davhost_free_string`].
#[unsafe(no_mangle)]
pub extern "C" fn davhost_get_version() -> *mut c_char {
    strings::into_raw(VERSION)
}

/// Release a string returned by this library. NULL is a no-op.
///
/// # Safety
///
/// `ptr` must be NULL or a string returned by this library that has not
/// been released yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn davhost_free_string(ptr: *mut c_char) {
    // SAFETY: forwarded caller contract
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe { strings::free_raw(ptr) }));
}

/// Stop and release every server. Safe to call repeatedly.
#[unsafe(no_mangle)]
pub extern "C" fn davhost_cleanup() {
    if catch_unwind(AssertUnwindSafe(|| Registry::global().destroy_all())).is_err() {
        error!(operation = "cleanup", "Panic caught at the C boundary");
    }
}
