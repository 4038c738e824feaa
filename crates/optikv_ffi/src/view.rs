//! Read result handles.

use optikv_core::ByteView;

/// The result of a read: a found value or a missing key.
pub struct OptiKvView {
    pub(crate) inner: ByteView,
}

impl OptiKvView {
    pub(crate) fn into_raw(view: ByteView) -> *mut Self {
        Box::into_raw(Box::new(Self { inner: view }))
    }
}

/// Returns 1 if the key was found, 0 if it was absent or `view` is null.
///
/// # Safety
///
/// `view` must be null or a live view handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_view_exists(view: *const OptiKvView) -> u8 {
    view.as_ref().map_or(0, |view| u8::from(view.inner.exists()))
}

/// Returns the value bytes and stores their length in `*len`.
///
/// Returns null for a missing key. The bytes stay valid until the view is
/// destroyed.
///
/// # Safety
///
/// `view` must be null or a live view handle; `len` must be null or valid
/// for writes.
#[no_mangle]
pub unsafe extern "C" fn optikv_view_value(view: *const OptiKvView, len: *mut usize) -> *const u8 {
    let found = view.as_ref().filter(|view| view.inner.exists());
    let (ptr, size) = match found {
        Some(view) => (view.inner.data().as_ptr(), view.inner.size()),
        None => (std::ptr::null(), 0),
    };
    if let Some(len) = len.as_mut() {
        *len = size;
    }
    ptr
}

/// Releases a view and its bytes.
///
/// # Safety
///
/// `view` must be null or a live view handle, destroyed once.
#[no_mangle]
pub unsafe extern "C" fn optikv_view_destroy(view: *mut OptiKvView) {
    if !view.is_null() {
        let mut view = Box::from_raw(view);
        view.inner.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_view_exposes_bytes() {
        let view = OptiKvView::into_raw(ByteView::found(b"abc".to_vec()));
        let mut len = 0usize;
        unsafe {
            assert_eq!(optikv_view_exists(view), 1);
            let ptr = optikv_view_value(view, &mut len);
            assert_eq!(std::slice::from_raw_parts(ptr, len), b"abc");
            optikv_view_destroy(view);
        }
    }

    #[test]
    fn missing_view_returns_null() {
        let view = OptiKvView::into_raw(ByteView::missing());
        let mut len = 99usize;
        unsafe {
            assert_eq!(optikv_view_exists(view), 0);
            assert!(optikv_view_value(view, &mut len).is_null());
            assert_eq!(len, 0);
            optikv_view_destroy(view);
        }
    }

    #[test]
    fn empty_value_still_exists() {
        let view = OptiKvView::into_raw(ByteView::found(Vec::new()));
        let mut len = 5usize;
        unsafe {
            assert_eq!(optikv_view_exists(view), 1);
            assert!(!optikv_view_value(view, &mut len).is_null());
            assert_eq!(len, 0);
            optikv_view_destroy(view);
        }
    }
}
