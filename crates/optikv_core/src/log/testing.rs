//! Storage backend with injectable sync failures.

use optikv_storage::{StorageBackend, StorageError, StorageResult};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory backend whose next `failing_syncs` syncs return an I/O error.
///
/// Clones share bytes and the failure budget, so a test can keep one clone
/// while the log owns another.
#[derive(Clone, Default)]
pub(crate) struct FlakyBackend {
    bytes: Arc<Mutex<Vec<u8>>>,
    failing_syncs: Arc<AtomicUsize>,
}

impl FlakyBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_next_syncs(&self, count: usize) {
        self.failing_syncs.store(count, Ordering::SeqCst);
    }

    pub(crate) fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }
}

impl StorageBackend for FlakyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let bytes = self.bytes.lock();
        let size = bytes.len() as u64;
        if offset.saturating_add(len as u64) > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        let start = offset as usize;
        Ok(bytes[start..start + len].to_vec())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut bytes = self.bytes.lock();
        let offset = bytes.len() as u64;
        bytes.extend_from_slice(data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let remaining = self.failing_syncs.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_syncs.store(remaining - 1, Ordering::SeqCst);
            return Err(io::Error::other("injected fsync failure").into());
        }
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.bytes.lock().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut bytes = self.bytes.lock();
        let size = bytes.len() as u64;
        if new_size > size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size,
            });
        }
        bytes.truncate(new_size as usize);
        Ok(())
    }
}
