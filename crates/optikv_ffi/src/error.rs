//! `errptr` out-parameter handling.

use optikv_core::CoreError;
use std::ffi::{c_char, CString};

/// Stores `message` in `*errptr`, freeing a message already there.
///
/// # Safety
///
/// `errptr` must be null or valid for writes, and `*errptr` must be null or
/// a string produced by this crate.
pub(crate) unsafe fn save_error(errptr: *mut *mut c_char, message: &str) {
    if errptr.is_null() {
        tracing::warn!(%message, "error dropped: caller passed a null errptr");
        return;
    }
    let text = CString::new(message.replace('\0', "\\0")).unwrap_or_default();
    if !(*errptr).is_null() {
        drop(CString::from_raw(*errptr));
    }
    *errptr = text.into_raw();
}

/// Stores a core error in `*errptr`.
///
/// # Safety
///
/// As for [`save_error`].
pub(crate) unsafe fn save_core_error(errptr: *mut *mut c_char, err: &CoreError) {
    save_error(errptr, &err.to_string());
}

/// Unwraps `result`, or stores its error and returns `None`.
///
/// # Safety
///
/// As for [`save_error`].
pub(crate) unsafe fn check<T>(errptr: *mut *mut c_char, result: Result<T, CoreError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            save_core_error(errptr, &err);
            None
        }
    }
}

/// Frees a string returned through `errptr`.
///
/// # Safety
///
/// `ptr` must be null or a string produced by this library, freed once.
#[no_mangle]
pub unsafe extern "C" fn optikv_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn save_error_replaces_previous_message() {
        let mut err: *mut c_char = std::ptr::null_mut();
        unsafe {
            save_error(&mut err, "first");
            save_error(&mut err, "second");
            assert_eq!(CStr::from_ptr(err).to_str().unwrap(), "second");
            optikv_free(err);
        }
    }

    #[test]
    fn interior_nul_is_escaped() {
        let mut err: *mut c_char = std::ptr::null_mut();
        unsafe {
            save_error(&mut err, "a\0b");
            assert_eq!(CStr::from_ptr(err).to_str().unwrap(), "a\\0b");
            optikv_free(err);
        }
    }

    #[test]
    fn check_passes_values_through() {
        let mut err: *mut c_char = std::ptr::null_mut();
        let value = unsafe { check(&mut err, Ok::<_, CoreError>(7)) };
        assert_eq!(value, Some(7));
        assert!(err.is_null());

        let none = unsafe { check::<()>(&mut err, Err(CoreError::DatabaseClosed)) };
        assert!(none.is_none());
        unsafe {
            assert_eq!(CStr::from_ptr(err).to_str().unwrap(), "database is closed");
            optikv_free(err);
        }
    }

    #[test]
    fn free_null_is_noop() {
        unsafe { optikv_free(std::ptr::null_mut()) };
    }
}
