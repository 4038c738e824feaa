//! Storage backend trait definition.

use crate::error::StorageResult;

/// An append-only byte store.
///
/// # Invariants
///
/// - `append` returns the offset of the first written byte
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `flush` returns, appended data has left process buffers
/// - after `sync` returns, appended data and metadata are on durable media
///
/// Backends are shared between threads behind the engine's own locks, so
/// they must be `Send + Sync`.
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] when the range is not
    /// fully inside the store, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces data and metadata to durable media.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes (the offset of the next append).
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Discards every byte at or after `new_size`.
    ///
    /// Used to drop a torn record at the tail of a commit log.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::InvalidTruncate`] when `new_size` is
    /// larger than the store.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Reads the whole store.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`StorageBackend::size`] and
    /// [`StorageBackend::read_at`].
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size).map_err(|_| {
            crate::StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::OutOfMemory,
                "store does not fit in memory",
            ))
        })?;
        self.read_at(0, len)
    }
}
