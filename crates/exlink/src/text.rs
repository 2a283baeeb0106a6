//! String ownership bridge.
//!
//! Every `*mut c_char` the engine hands out is heap-allocated on the engine
//! side and must be returned through `free_string` exactly once. Call-site
//! discipline does not scale to the number of decode sites in this crate,
//! so ownership is wrapped in [`OwnedText`]: acquired on decode, released
//! on drop, on every exit path.
//!
//! Strings flowing the other way (request arguments) are plain `CString`s
//! owned by us; the engine copies what it needs during the call and we
//! must never pass them to `free_string`.

use std::ffi::{CString, NulError};
use std::os::raw::c_char;
use std::ptr::NonNull;

use crate::error::ExchangeError;

/// Upper bound for the terminator scan. An engine-owned string longer than
/// this is treated as corruption rather than scanned unboundedly.
pub(crate) const MAX_TEXT_LEN: usize = 64 * 1024;

/// Scoped ownership of one engine-allocated string. Dropping releases the
/// pointer through `free_string`; the pointer must never be used afterward.
struct OwnedText(NonNull<c_char>);

impl Drop for OwnedText {
    fn drop(&mut self) {
        // SAFETY: the pointer was received from the engine and this guard
        // is the sole owner; free_string is the designated release call.
        unsafe { exlink_sys::free_string(self.0.as_ptr()) };
    }
}

/// Decode an engine-owned string and release it.
///
/// Null means "absent" and issues no release. On success the bytes up to
/// the terminator are copied (lossy UTF-8) and the pointer is released
/// exactly once. If no terminator is found within [`MAX_TEXT_LEN`] the
/// call fails with [`ExchangeError::MalformedString`] and does *not*
/// release: a buffer with no terminator cannot be handed back to the
/// engine's string allocator.
///
/// # Safety
///
/// `ptr` must be null or an engine-allocated string whose ownership is
/// being transferred to this call. It must not be used after the call.
pub(crate) unsafe fn decode_owned(ptr: *mut c_char) -> Result<Option<String>, ExchangeError> {
    let Some(ptr) = NonNull::new(ptr) else {
        return Ok(None);
    };

    // Find the terminator before taking ownership: the malformed path must
    // leave the allocation untouched.
    let mut len = 0usize;
    // SAFETY: caller guarantees the pointer addresses a readable engine
    // allocation; reads stop at the first NUL or at MAX_TEXT_LEN.
    while unsafe { ptr.as_ptr().add(len).read() } != 0 {
        len += 1;
        if len > MAX_TEXT_LEN {
            return Err(ExchangeError::MalformedString(format!(
                "no terminator within {MAX_TEXT_LEN} bytes"
            )));
        }
    }

    let guard = OwnedText(ptr);
    // SAFETY: `len` bytes precede the terminator just located.
    let bytes = unsafe { std::slice::from_raw_parts(guard.0.as_ptr() as *const u8, len) };
    let text = String::from_utf8_lossy(bytes).into_owned();
    drop(guard);
    Ok(Some(text))
}

/// Build a `CString` request argument, rejecting interior NULs as an
/// invalid argument instead of panicking.
pub(crate) fn to_c_string(s: &str) -> Result<CString, ExchangeError> {
    CString::new(s).map_err(|e: NulError| {
        ExchangeError::InvalidArgument(format!(
            "string contains interior NUL at byte {}",
            e.nul_position()
        ))
    })
}

/// Optional request argument: `None` crosses as a null pointer.
pub(crate) fn to_opt_c_string(s: Option<&str>) -> Result<Option<CString>, ExchangeError> {
    s.map(to_c_string).transpose()
}

/// Pointer for an optional `CString`, null when absent.
pub(crate) fn opt_ptr(s: &Option<CString>) -> *const c_char {
    s.as_ref().map_or(std::ptr::null(), |c| c.as_ptr())
}
