//! C ABI for the solvate plugin registry.
//!
//! This crate provides a stable C interface over the registry's
//! introspection queries and the explicit dynamic-load step. All entry
//! points return status codes (0 success, negative error), never unwind
//! across the boundary, and treat NULL pointers as errors rather than
//! contract violations.

#![warn(missing_docs)]

use std::ffi::{c_char, c_int, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// Success.
pub const SOLVATE_OK: c_int = 0;
/// A pointer argument was NULL or not valid UTF-8.
pub const SOLVATE_ERR_ARGUMENT: c_int = -1;
/// The requested backend is not registered.
pub const SOLVATE_ERR_UNKNOWN: c_int = -2;
/// The operation failed; details were logged.
pub const SOLVATE_ERR_FAILED: c_int = -3;
/// The callee panicked; this indicates a bug.
pub const SOLVATE_ERR_PANIC: c_int = -4;

fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn guarded(f: impl FnOnce() -> c_int) -> c_int {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or(SOLVATE_ERR_PANIC)
}

/// Whether a backend is registered under `name`.
///
/// Returns 1 if present, 0 if absent, negative on argument errors.
///
/// # Safety
///
/// `name` must be NULL or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn solvate_has_plugin(name: *const c_char) -> c_int {
    guarded(|| {
        let Some(name) = read_str(name) else {
            return SOLVATE_ERR_ARGUMENT;
        };
        if solvate_core::has_plugin(name) {
            1
        } else {
            0
        }
    })
}

/// Load a plugin library and run its registration entry point.
///
/// This is the only call with side effects; lookups never load code.
///
/// # Safety
///
/// `path` and `name` must be NULL or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn solvate_load_plugin(path: *const c_char, name: *const c_char) -> c_int {
    guarded(|| {
        let (Some(path), Some(name)) = (read_str(path), read_str(name)) else {
            return SOLVATE_ERR_ARGUMENT;
        };
        match solvate_core::load_plugin(Path::new(path), name) {
            Ok(()) => SOLVATE_OK,
            Err(err) => {
                log::warn!("plugin load failed: {}", err);
                SOLVATE_ERR_FAILED
            }
        }
    })
}

/// Copy a backend's documentation into `buf`.
///
/// Writes at most `cap - 1` bytes plus a NUL terminator and returns the
/// number of bytes the full documentation needs (excluding the NUL), so a
/// short buffer can be detected and resized by the caller.
///
/// # Safety
///
/// `name` must be NULL or a valid NUL-terminated string; `buf` must be
/// NULL or valid for writes of `cap` bytes.
#[no_mangle]
pub unsafe extern "C" fn solvate_plugin_doc(
    name: *const c_char,
    buf: *mut c_char,
    cap: usize,
) -> c_int {
    guarded(|| {
        let Some(name) = read_str(name) else {
            return SOLVATE_ERR_ARGUMENT;
        };
        if buf.is_null() && cap != 0 {
            return SOLVATE_ERR_ARGUMENT;
        }
        let doc = match solvate_core::plugin_doc(name) {
            Ok(doc) => doc,
            Err(_) => return SOLVATE_ERR_UNKNOWN,
        };
        let bytes = doc.as_bytes();
        if cap > 0 {
            let writable = bytes.len().min(cap - 1);
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf as *mut u8, writable);
                *buf.add(writable) = 0;
            }
        }
        bytes.len().min(c_int::MAX as usize) as c_int
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_has_plugin_roundtrip() {
        let name = CString::new("dense_lu").unwrap();
        assert_eq!(unsafe { solvate_has_plugin(name.as_ptr()) }, 1);

        let name = CString::new("no_such_backend").unwrap();
        assert_eq!(unsafe { solvate_has_plugin(name.as_ptr()) }, 0);

        assert_eq!(
            unsafe { solvate_has_plugin(std::ptr::null()) },
            SOLVATE_ERR_ARGUMENT
        );
    }

    #[test]
    fn test_doc_truncates_and_reports_full_length() {
        let name = CString::new("ipqp").unwrap();

        let needed = unsafe { solvate_plugin_doc(name.as_ptr(), std::ptr::null_mut(), 0) };
        assert!(needed > 0);

        let mut buf = vec![0i8; 16];
        let ret = unsafe { solvate_plugin_doc(name.as_ptr(), buf.as_mut_ptr() as *mut c_char, buf.len()) };
        assert_eq!(ret, needed);
        // NUL-terminated within the short buffer.
        assert_eq!(buf[15], 0);
    }

    #[test]
    fn test_doc_unknown_backend() {
        let name = CString::new("missing").unwrap();
        let mut buf = vec![0i8; 8];
        let ret = unsafe { solvate_plugin_doc(name.as_ptr(), buf.as_mut_ptr() as *mut c_char, buf.len()) };
        assert_eq!(ret, SOLVATE_ERR_UNKNOWN);
    }
}
