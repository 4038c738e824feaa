//! Read result views.
//!
//! Every read returns a [`ByteView`]. A view owns the bytes it was handed
//! and must be released exactly once, either explicitly with
//! [`ByteView::free`] or implicitly when it is dropped. Absence of a key is
//! a live view without a buffer; callers ask [`ByteView::exists`] rather
//! than inferring absence from a zero length, since empty values exist.

use std::ops::Index;

#[derive(Debug)]
enum ViewState {
    /// `None` means the key was absent.
    Live(Option<Box<[u8]>>),
    Released,
}

/// A single-owner view over the bytes returned by a read.
///
/// `ByteView` is deliberately not `Clone`: one buffer, one owner, one
/// release.
#[derive(Debug)]
pub struct ByteView {
    state: ViewState,
}

impl ByteView {
    /// Wraps a value that was found.
    #[must_use]
    pub fn found(bytes: Vec<u8>) -> Self {
        Self {
            state: ViewState::Live(Some(bytes.into_boxed_slice())),
        }
    }

    /// A view for a key that does not exist.
    #[must_use]
    pub fn missing() -> Self {
        Self {
            state: ViewState::Live(None),
        }
    }

    pub(crate) fn from_lookup(value: Option<Vec<u8>>) -> Self {
        match value {
            Some(bytes) => Self::found(bytes),
            None => Self::missing(),
        }
    }

    fn live(&self) -> Option<&[u8]> {
        match &self.state {
            ViewState::Live(bytes) => bytes.as_deref(),
            ViewState::Released => {
                debug_assert!(false, "ByteView used after free");
                None
            }
        }
    }

    /// Returns the borrowed bytes; empty when the key was absent.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.live().unwrap_or(&[])
    }

    /// Returns the length of the value in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data().len()
    }

    /// Returns true if the key existed (possibly with an empty value).
    #[must_use]
    pub fn exists(&self) -> bool {
        self.live().is_some()
    }

    /// Releases the buffer. Calling it again is a no-op.
    pub fn free(&mut self) {
        if let ViewState::Live(_) = self.state {
            self.state = ViewState::Released;
        }
    }

    /// Returns true once the view has been freed.
    #[must_use]
    pub fn is_released(&self) -> bool {
        matches!(self.state, ViewState::Released)
    }

    /// Copies the value out, `None` when absent.
    #[must_use]
    pub fn to_vec(&self) -> Option<Vec<u8>> {
        self.live().map(<[u8]>::to_vec)
    }

    /// Moves the value out without copying, `None` when absent or freed.
    #[must_use]
    pub fn into_vec(mut self) -> Option<Vec<u8>> {
        match std::mem::replace(&mut self.state, ViewState::Released) {
            ViewState::Live(bytes) => bytes.map(Vec::from),
            ViewState::Released => None,
        }
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(bytes: Vec<u8>) -> Self {
        Self::found(bytes)
    }
}

impl From<&str> for ByteView {
    fn from(text: &str) -> Self {
        Self::found(text.as_bytes().to_vec())
    }
}

/// The views returned by a bulk read, in key order of the request.
#[derive(Debug, Default)]
pub struct ByteViews {
    views: Vec<ByteView>,
}

impl ByteViews {
    /// Number of views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns true when there are no views.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Returns the view at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ByteView> {
        self.views.get(index)
    }

    /// Iterates over the views.
    pub fn iter(&self) -> std::slice::Iter<'_, ByteView> {
        self.views.iter()
    }

    /// Frees every view.
    pub fn destroy(&mut self) {
        for view in &mut self.views {
            view.free();
        }
    }
}

impl From<Vec<ByteView>> for ByteViews {
    fn from(views: Vec<ByteView>) -> Self {
        Self { views }
    }
}

impl Index<usize> for ByteViews {
    type Output = ByteView;

    fn index(&self, index: usize) -> &ByteView {
        &self.views[index]
    }
}

impl IntoIterator for ByteViews {
    type Item = ByteView;
    type IntoIter = std::vec::IntoIter<ByteView>;

    fn into_iter(self) -> Self::IntoIter {
        self.views.into_iter()
    }
}

impl<'a> IntoIterator for &'a ByteViews {
    type Item = &'a ByteView;
    type IntoIter = std::slice::Iter<'a, ByteView>;

    fn into_iter(self) -> Self::IntoIter {
        self.views.iter()
    }
}
