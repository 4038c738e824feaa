//! Error types for OptiKV core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by databases, transactions and checkpoints.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The database at `path` could not be opened or created.
    ///
    /// Not retryable without caller intervention (fix permissions, close
    /// the other holder of the lock, list every column family, ...).
    #[error("failed to open database at {}: {message}", path.display())]
    Open {
        /// Path that was being opened.
        path: PathBuf,
        /// Diagnostic from the engine.
        message: String,
    },

    /// Column family names and options were supplied in different counts.
    #[error("must provide the same number of column family names and options (got {names} names, {options} options)")]
    ColumnFamilyMismatch {
        /// Number of names supplied.
        names: usize,
        /// Number of option sets supplied.
        options: usize,
    },

    /// A key tracked by a transaction was committed by someone else after
    /// the transaction observed it.
    #[error("commit conflict on key {key:?} in column family '{column_family}'")]
    CommitConflict {
        /// Column family of the conflicting key.
        column_family: String,
        /// The conflicting key.
        key: Vec<u8>,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] optikv_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The commit log holds a record that cannot be decoded.
    #[error("commit log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// The manifest could not be decoded.
    #[error("invalid manifest: {message}")]
    InvalidManifest {
        /// Description of the problem.
        message: String,
    },

    /// A checksum did not match its payload.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// Another handle holds the directory lock.
    #[error("database locked: another handle has exclusive access")]
    DatabaseLocked,

    /// The database has been closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// The named column family does not exist.
    #[error("column family not found: {name}")]
    ColumnFamilyNotFound {
        /// Name (or id) of the column family.
        name: String,
    },

    /// A value exceeded the column family's `max_value_size`.
    #[error("value of {size} bytes exceeds limit of {limit} bytes in column family '{column_family}'")]
    ValueTooLarge {
        /// Column family the write targeted.
        column_family: String,
        /// Size of the rejected value.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// An argument was rejected before reaching the engine.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Why the argument was rejected.
        message: String,
    },

    /// The operation is not allowed in the handle's current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is not allowed.
        message: String,
    },
}

impl CoreError {
    /// Creates an open failure for `path`.
    pub fn open(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Open {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a commit conflict error.
    pub fn commit_conflict(column_family: impl Into<String>, key: &[u8]) -> Self {
        Self::CommitConflict {
            column_family: column_family.into(),
            key: key.to_vec(),
        }
    }

    /// Creates a commit log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid manifest error.
    pub fn invalid_manifest(message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            message: message.into(),
        }
    }

    /// Creates a column family not found error.
    pub fn column_family_not_found(name: impl Into<String>) -> Self {
        Self::ColumnFamilyNotFound { name: name.into() }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for optimistic validation failures.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::CommitConflict { .. })
    }

    /// Returns true if re-running the same logical operation may succeed.
    ///
    /// Only commit conflicts qualify; the documented recovery is to restart
    /// the transaction with `transaction_begin(.., Some(previous))` and retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }

    /// Returns true if the error came from the storage layer.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Storage(_)
                | Self::Io(_)
                | Self::LogCorruption { .. }
                | Self::InvalidManifest { .. }
                | Self::ChecksumMismatch { .. }
        )
    }
}
