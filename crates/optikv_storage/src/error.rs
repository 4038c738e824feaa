//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a [`crate::StorageBackend`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read touched bytes past the end of the store.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Size of the store at the time of the read.
        size: u64,
    },

    /// A truncation asked to grow the store.
    #[error("cannot truncate to {requested} bytes, store holds {size}")]
    InvalidTruncate {
        /// Requested size.
        requested: u64,
        /// Current size.
        size: u64,
    },

    /// The target of an exclusive create already exists.
    #[error("storage already exists: {0}")]
    AlreadyExists(String),
}
