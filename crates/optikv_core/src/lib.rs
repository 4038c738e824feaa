//! # OptiKV Core
//!
//! Optimistic transactions over an embedded, ordered key-value engine.
//!
//! This crate provides:
//! - [`OptimisticTransactionDb`], the entry point, and the [`Database`] it owns
//! - [`Transaction`]s validated for conflicts only at commit
//! - [`Snapshot`]s for repeatable reads
//! - [`ByteView`] read results with explicit release
//! - column families, write batches and checkpoints
//!
//! ## Example
//!
//! ```rust
//! use optikv_core::{
//!     OptimisticTransactionDb, OptimisticTransactionOptions, Options, ReadOptions, WriteOptions,
//! };
//!
//! let db = OptimisticTransactionDb::open_in_memory(&Options::default()).unwrap();
//! let write = WriteOptions::default();
//! let read = ReadOptions::default();
//!
//! let mut txn = db.transaction_begin(&write, &OptimisticTransactionOptions::default(), None);
//! txn.put(b"greeting", b"hello").unwrap();
//! txn.commit().unwrap();
//!
//! let mut view = db.get(&read, b"greeting").unwrap();
//! assert!(view.exists());
//! assert_eq!(view.data(), b"hello");
//! view.free();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod column_family;
mod config;
mod database;
mod dir;
mod engine;
mod error;
mod log;
mod manifest;
mod snapshot;
mod stats;
mod transaction;
mod transaction_db;
mod types;
mod view;

pub use checkpoint::Checkpoint;
pub use column_family::{ColumnFamilyHandle, DEFAULT_COLUMN_FAMILY_NAME};
pub use config::{OptimisticTransactionOptions, Options, ReadOptions, SnapshotBinding, WriteOptions};
pub use database::Database;
pub use engine::WriteBatch;
pub use manifest::MAX_COLUMN_FAMILY_NAME_LEN;
pub use error::{CoreError, CoreResult};
pub use snapshot::{Snapshot, SnapshotState};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use transaction::{Transaction, TransactionState};
pub use transaction_db::OptimisticTransactionDb;
pub use types::{ColumnFamilyId, DatabaseId, SequenceNumber, SnapshotId, TransactionId};
pub use view::{ByteView, ByteViews};
