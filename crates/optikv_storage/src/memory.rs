//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// A byte store that lives entirely in memory.
///
/// Backs in-memory databases. Contents are lost when the backend is
/// dropped. Flush and sync are no-ops.
///
/// # Example
///
/// ```rust
/// use optikv_storage::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// backend.append(b"abc").unwrap();
/// assert_eq!(backend.size().unwrap(), 3);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    bytes: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with `bytes`.
    ///
    /// Lets tests hand the engine a hand-crafted or damaged log.
    #[must_use]
    pub fn with_data(bytes: Vec<u8>) -> Self {
        Self {
            bytes: RwLock::new(bytes),
        }
    }

    /// Returns a copy of the current contents.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let bytes = self.bytes.read();
        let size = bytes.len() as u64;
        let end = offset.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        let start = offset as usize;
        Ok(bytes[start..start + len].to_vec())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut bytes = self.bytes.write();
        let offset = bytes.len() as u64;
        bytes.extend_from_slice(data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.bytes.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut bytes = self.bytes.write();
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

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn appends_are_contiguous() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"key").unwrap(), 0);
        assert_eq!(backend.append(b"value").unwrap(), 3);
        assert_eq!(backend.size().unwrap(), 8);
        assert_eq!(backend.read_at(3, 5).unwrap(), b"value");
    }

    #[test]
    fn read_past_end_is_rejected() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"abc").unwrap();

        assert!(matches!(
            backend.read_at(2, 2),
            Err(StorageError::ReadPastEnd { size: 3, .. })
        ));
        assert!(matches!(
            backend.read_at(10, 0),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn zero_length_read_at_end() {
        let backend = InMemoryBackend::with_data(b"abc".to_vec());
        assert!(backend.read_at(3, 0).unwrap().is_empty());
    }

    #[test]
    fn truncate_drops_tail() {
        let mut backend = InMemoryBackend::with_data(b"committed|torn".to_vec());
        backend.truncate(9).unwrap();
        assert_eq!(backend.contents(), b"committed");
    }

    #[test]
    fn truncate_cannot_grow() {
        let mut backend = InMemoryBackend::with_data(vec![0; 4]);
        assert!(matches!(
            backend.truncate(5),
            Err(StorageError::InvalidTruncate {
                requested: 5,
                size: 4
            })
        ));
    }

    #[test]
    fn read_all_returns_everything() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"one").unwrap();
        backend.append(b"two").unwrap();
        assert_eq!(backend.read_all().unwrap(), b"onetwo");
    }

    proptest! {
        #[test]
        fn every_append_reads_back(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16)) {
            let mut backend = InMemoryBackend::new();
            let offsets: Vec<u64> = chunks
                .iter()
                .map(|chunk| backend.append(chunk).unwrap())
                .collect();

            for (chunk, offset) in chunks.iter().zip(offsets) {
                prop_assert_eq!(&backend.read_at(offset, chunk.len()).unwrap(), chunk);
            }
        }
    }
}
