//! Atomic multi-write batches.

use crate::column_family::ColumnFamilyHandle;
use crate::log::BatchOp;
use crate::types::{ColumnFamilyId, DatabaseId};

/// A group of puts and deletes applied atomically by `Database::write`.
///
/// Batches are not validated for conflicts. Later writes to the same key
/// win.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    entries: Vec<BatchEntry>,
}

#[derive(Debug, Clone)]
pub(crate) struct BatchEntry {
    /// Database the handle came from; `None` for the default column family.
    pub(crate) owner: Option<DatabaseId>,
    pub(crate) op: BatchOp,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a put into the default column family.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.push(None, ColumnFamilyId::DEFAULT, key, Some(value));
    }

    /// Queues a put into `column_family`.
    pub fn put_cf(&mut self, column_family: &ColumnFamilyHandle, key: &[u8], value: &[u8]) {
        self.push(
            Some(column_family.database()),
            column_family.id(),
            key,
            Some(value),
        );
    }

    /// Queues a delete from the default column family.
    pub fn delete(&mut self, key: &[u8]) {
        self.push(None, ColumnFamilyId::DEFAULT, key, None);
    }

    /// Queues a delete from `column_family`.
    pub fn delete_cf(&mut self, column_family: &ColumnFamilyHandle, key: &[u8]) {
        self.push(Some(column_family.database()), column_family.id(), key, None);
    }

    /// Number of queued writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every queued write, keeping the allocation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    fn push(
        &mut self,
        owner: Option<DatabaseId>,
        column_family: ColumnFamilyId,
        key: &[u8],
        value: Option<&[u8]>,
    ) {
        self.entries.push(BatchEntry {
            owner,
            op: BatchOp {
                column_family,
                key: key.to_vec(),
                value: value.map(<[u8]>::to_vec),
            },
        });
    }
}
