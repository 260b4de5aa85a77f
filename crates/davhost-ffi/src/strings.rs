//! String exchange across the C boundary.
//!
//! Two ownership patterns are used and never mixed:
//! - caller-owned buffers, filled by [`write_to_buffer`];
//! - library-owned strings from [`into_raw`], released with [`free_raw`].

use crate::error::{RegistryError, RegistryResult};
use std::ffi::{CStr, CString, c_char};
use std::ptr;

/// Borrow an optional input string. NULL means absent.
///
/// # Safety
///
/// `ptr` must be NULL or point to a NUL-terminated string that stays valid
/// for `'a`.
pub unsafe fn opt_str<'a>(ptr: *const c_char, name: &str) -> RegistryResult<Option<&'a str>> {
    if ptr.is_null() {
        return Ok(None);
    }
    // SAFETY: non-NULL and NUL-terminated per the caller contract
    let text = unsafe { CStr::from_ptr(ptr) };
    text.to_str()
        .map(Some)
        .map_err(|_| RegistryError::InvalidArgument(format!("{name} is not valid UTF-8")))
}

/// Owned variant of [`opt_str`].
///
/// # Safety
///
/// Same contract as [`opt_str`].
pub unsafe fn opt_string(ptr: *const c_char, name: &str) -> RegistryResult<Option<String>> {
    // SAFETY: forwarded caller contract
    unsafe { opt_str(ptr, name) }.map(|text| text.map(str::to_owned))
}

/// Copy `text` plus a NUL terminator into a caller-provided buffer.
///
/// Returns the number of bytes written, excluding the terminator. Nothing is
/// written unless the whole text fits.
///
/// # Safety
///
/// `buffer` must be NULL or valid for writes of `capacity` bytes.
pub unsafe fn write_to_buffer(text: &str, buffer: *mut c_char, capacity: i32) -> RegistryResult<i32> {
    if buffer.is_null() {
        return Err(RegistryError::InvalidArgument("buffer is NULL".to_string()));
    }

    let bytes = text.as_bytes();
    let required = bytes.len() + 1;
    if capacity <= 0 || required > capacity as usize {
        return Err(RegistryError::BufferTooSmall { required, capacity });
    }

    // SAFETY: `required <= capacity` bytes are writable per the caller contract
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.cast::<u8>(), bytes.len());
        *buffer.add(bytes.len()) = 0;
    }
    // Fits in i32: bytes.len() < capacity <= i32::MAX
    Ok(bytes.len() as i32)
}

/// Hand ownership of `text` to the caller. NULL if `text` contains a NUL.
pub fn into_raw(text: &str) -> *mut c_char {
    CString::new(text).map_or(ptr::null_mut(), CString::into_raw)
}

/// Release a string produced by [`into_raw`]. NULL is ignored.
///
/// # Safety
///
/// `ptr` must be NULL or come from [`into_raw`] and not have been freed.
pub unsafe fn free_raw(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: allocated by CString::into_raw per the caller contract
    drop(unsafe { CString::from_raw(ptr) });
}
