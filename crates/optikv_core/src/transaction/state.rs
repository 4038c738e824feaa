//! Transaction state and buffered writes.

use crate::log::BatchOp;
use crate::types::ColumnFamilyId;
use std::collections::HashMap;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Reads and writes are accepted.
    Active,
    /// Buffered writes were applied.
    Committed,
    /// Rolled back, or commit failed validation.
    Aborted,
}

impl TransactionState {
    /// Returns a lowercase name for logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        }
    }
}

/// Writes buffered by a transaction, in first-write order.
///
/// A second write to the same key replaces the first in place, so the
/// batch applied at commit holds one op per key.
#[derive(Debug, Default)]
pub(crate) struct WriteSet {
    ops: Vec<BatchOp>,
    index: HashMap<(ColumnFamilyId, Vec<u8>), usize>,
}

impl WriteSet {
    pub(crate) fn record(&mut self, column_family: ColumnFamilyId, key: &[u8], value: Option<&[u8]>) {
        let value = value.map(<[u8]>::to_vec);
        match self.index.get(&(column_family, key.to_vec())) {
            Some(&slot) => self.ops[slot].value = value,
            None => {
                self.index.insert((column_family, key.to_vec()), self.ops.len());
                self.ops.push(BatchOp {
                    column_family,
                    key: key.to_vec(),
                    value,
                });
            }
        }
    }

    /// `Some(None)` for a buffered delete, `None` when the key is untouched.
    pub(crate) fn get(&self, column_family: ColumnFamilyId, key: &[u8]) -> Option<Option<&[u8]>> {
        let slot = *self.index.get(&(column_family, key.to_vec()))?;
        Some(self.ops[slot].value.as_deref())
    }

    pub(crate) fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    /// Empties the set, keeping its allocations.
    pub(crate) fn clear(&mut self) {
        self.ops.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CF: ColumnFamilyId = ColumnFamilyId::DEFAULT;

    #[test]
    fn later_write_replaces_earlier() {
        let mut writes = WriteSet::default();
        writes.record(CF, b"k", Some(b"1"));
        writes.record(CF, b"other", Some(b"x"));
        writes.record(CF, b"k", None);

        assert_eq!(writes.len(), 2);
        assert_eq!(writes.get(CF, b"k"), Some(None));
        assert_eq!(writes.ops()[0].key, b"k");
    }

    #[test]
    fn untouched_key_is_none() {
        let writes = WriteSet::default();
        assert_eq!(writes.get(CF, b"k"), None);
    }

    #[test]
    fn keys_are_scoped_by_column_family() {
        let mut writes = WriteSet::default();
        writes.record(CF, b"k", Some(b"default"));
        writes.record(ColumnFamilyId::new(1), b"k", Some(b"other"));

        assert_eq!(writes.get(CF, b"k"), Some(Some(&b"default"[..])));
        assert_eq!(writes.get(ColumnFamilyId::new(1), b"k"), Some(Some(&b"other"[..])));
    }

    #[test]
    fn clear_empties() {
        let mut writes = WriteSet::default();
        writes.record(CF, b"k", Some(b"v"));
        writes.clear();
        assert_eq!(writes.len(), 0);
        assert_eq!(writes.get(CF, b"k"), None);
    }

    #[test]
    fn state_names() {
        assert_eq!(TransactionState::Active.as_str(), "active");
        assert_eq!(TransactionState::Aborted.as_str(), "aborted");
    }
}
