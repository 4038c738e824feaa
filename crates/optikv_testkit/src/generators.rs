//! Property-based test generators using proptest.

use optikv_core::{OptimisticTransactionDb, Transaction, WriteOptions};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for keys drawn from a small alphabet, so generated operations
/// collide often.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(b"abcd".to_vec()), 1..4)
}

/// Strategy for values, including empty ones.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for column family names.
pub fn column_family_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}")
        .expect("Invalid regex")
        .prop_filter("must not shadow the default column family", |name| name != "default")
}

/// A single write against the default column family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Set `key` to `value`.
    Put(Vec<u8>, Vec<u8>),
    /// Remove `key`.
    Delete(Vec<u8>),
}

impl WriteOp {
    /// Applies the operation to a transaction.
    pub fn apply_to(&self, txn: &mut Transaction<'_>) -> optikv_core::CoreResult<()> {
        match self {
            Self::Put(key, value) => txn.put(key, value),
            Self::Delete(key) => txn.delete(key),
        }
    }

    /// Applies the operation directly to the base database.
    pub fn apply_direct(&self, db: &OptimisticTransactionDb) -> optikv_core::CoreResult<()> {
        let write_options = WriteOptions::new();
        match self {
            Self::Put(key, value) => db.put(&write_options, key, value),
            Self::Delete(key) => db.delete(&write_options, key),
        }
    }

    /// Applies the operation to an in-memory model.
    pub fn apply_model(&self, model: &mut BTreeMap<Vec<u8>, Vec<u8>>) {
        match self {
            Self::Put(key, value) => {
                model.insert(key.clone(), value.clone());
            }
            Self::Delete(key) => {
                model.remove(key);
            }
        }
    }

    /// The key the operation touches.
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put(key, _) | Self::Delete(key) => key,
        }
    }
}

/// Strategy for one write operation; puts are three times as likely.
pub fn write_op_strategy() -> impl Strategy<Value = WriteOp> {
    prop_oneof![
        3 => (key_strategy(), value_strategy()).prop_map(|(k, v)| WriteOp::Put(k, v)),
        1 => key_strategy().prop_map(WriteOp::Delete),
    ]
}

/// Strategy for a batch of write operations.
pub fn write_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<WriteOp>> {
    prop::collection::vec(write_op_strategy(), 0..max_len)
}

/// Strategy for a sequence of transactions, each a batch of writes.
pub fn transactions_strategy() -> impl Strategy<Value = Vec<Vec<WriteOp>>> {
    prop::collection::vec(write_ops_strategy(8), 1..8)
}
