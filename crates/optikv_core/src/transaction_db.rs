//! The optimistic transaction database handle.

use crate::checkpoint::Checkpoint;
use crate::column_family::ColumnFamilyHandle;
use crate::config::{OptimisticTransactionOptions, Options, ReadOptions, WriteOptions};
use crate::database::Database;
use crate::error::CoreResult;
use crate::snapshot::Snapshot;
use crate::stats::StatsSnapshot;
use crate::transaction::Transaction;
use crate::view::{ByteView, ByteViews};
use std::path::Path;

/// A database that hands out optimistic transactions.
///
/// Owns its base [`Database`]; [`OptimisticTransactionDb::base_db`] lends it
/// for direct, unvalidated reads and writes. Closing this handle closes the
/// base too.
///
/// # Example
///
/// ```rust,ignore
/// use optikv_core::*;
///
/// let db = OptimisticTransactionDb::open(&Options::default(), "orders")?;
/// let mut txn = db.transaction_begin(&WriteOptions::default(), &OptimisticTransactionOptions::default(), None);
/// let count = txn.get(&ReadOptions::default(), b"count")?;
/// txn.put(b"count", b"1")?;
/// match txn.commit() {
///     Ok(()) => {}
///     Err(err) if err.is_conflict() => {
///         // start over, reusing the handle
///         let txn = db.transaction_begin(&WriteOptions::default(), &OptimisticTransactionOptions::default(), Some(txn));
///     }
///     Err(err) => return Err(err),
/// }
/// ```
#[derive(Debug)]
pub struct OptimisticTransactionDb {
    base: Database,
}

impl OptimisticTransactionDb {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// [`CoreError::Open`](crate::CoreError::Open) with the engine's
    /// diagnostic; no handle is produced.
    pub fn open(options: &Options, path: impl AsRef<Path>) -> CoreResult<Self> {
        Ok(Self {
            base: Database::open(options, path)?,
        })
    }

    /// Opens the database with the named column families; one handle per
    /// name, in input order.
    ///
    /// # Errors
    ///
    /// [`CoreError::ColumnFamilyMismatch`](crate::CoreError::ColumnFamilyMismatch)
    /// if the two lists differ in length, before any filesystem access.
    pub fn open_column_families(
        options: &Options,
        path: impl AsRef<Path>,
        names: &[&str],
        cf_options: &[Options],
    ) -> CoreResult<(Self, Vec<ColumnFamilyHandle>)> {
        let (base, handles) = Database::open_column_families(options, path, names, cf_options)?;
        Ok((Self { base }, handles))
    }

    /// Opens an ephemeral database.
    pub fn open_in_memory(options: &Options) -> CoreResult<Self> {
        Ok(Self {
            base: Database::open_in_memory(options)?,
        })
    }

    /// The base database. Its writes bypass conflict tracking, but
    /// transactions still detect them at commit.
    #[must_use]
    pub fn base_db(&self) -> &Database {
        &self.base
    }

    /// Takes a snapshot of the latest committed state.
    #[must_use]
    pub fn new_snapshot(&self) -> Snapshot {
        self.base.new_snapshot()
    }

    /// Releases a snapshot created by this database.
    pub fn release_snapshot(&self, snapshot: &mut Snapshot) {
        self.base.release_snapshot(snapshot);
    }

    /// Begins a transaction.
    ///
    /// With `previous`, that handle is reset and reused: an active one is
    /// rolled back first, its buffers are cleared and it gets a new id. A
    /// `previous` from another database is dropped and a fresh transaction
    /// is allocated instead.
    pub fn transaction_begin<'db>(
        &'db self,
        write_options: &WriteOptions,
        txn_options: &OptimisticTransactionOptions,
        previous: Option<Transaction<'db>>,
    ) -> Transaction<'db> {
        match previous {
            Some(mut txn) if txn.belongs_to(&self.base) => {
                txn.reset(*write_options, *txn_options);
                txn
            }
            Some(foreign) => {
                tracing::warn!(
                    txn = %foreign.id(),
                    database = %self.base.id(),
                    "previous transaction belongs to another database; allocating a new one"
                );
                drop(foreign);
                Transaction::begin(&self.base, *write_options, *txn_options)
            }
            None => Transaction::begin(&self.base, *write_options, *txn_options),
        }
    }

    /// Runs `body` in a transaction and commits it, restarting on commit
    /// conflicts up to `max_attempts` times in total.
    ///
    /// The transaction handle is reused across attempts. If `body` fails,
    /// the transaction is rolled back and the error returned as is.
    pub fn transaction_with_retry<T, F>(
        &self,
        write_options: &WriteOptions,
        txn_options: &OptimisticTransactionOptions,
        max_attempts: usize,
        mut body: F,
    ) -> CoreResult<T>
    where
        F: FnMut(&mut Transaction<'_>) -> CoreResult<T>,
    {
        let max_attempts = max_attempts.max(1);
        let mut previous = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut txn = self.transaction_begin(write_options, txn_options, previous.take());

            let value = match body(&mut txn) {
                Ok(value) => value,
                Err(err) => {
                    if txn.is_active() {
                        txn.rollback()?;
                    }
                    return Err(err);
                }
            };

            match txn.commit() {
                Ok(()) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::debug!(attempt, error = %err, "retrying transaction");
                    previous = Some(txn);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Reads `key` from the base database.
    pub fn get(&self, read_options: &ReadOptions, key: &[u8]) -> CoreResult<ByteView> {
        self.base.get(read_options, key)
    }

    /// Reads `key` from `column_family` in the base database.
    pub fn get_cf(
        &self,
        read_options: &ReadOptions,
        column_family: &ColumnFamilyHandle,
        key: &[u8],
    ) -> CoreResult<ByteView> {
        self.base.get_cf(read_options, column_family, key)
    }

    /// Reads several keys from the base database.
    pub fn multi_get<K, I>(&self, read_options: &ReadOptions, keys: I) -> CoreResult<ByteViews>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = K>,
    {
        self.base.multi_get(read_options, keys)
    }

    /// Writes `key = value` through the base database.
    pub fn put(&self, write_options: &WriteOptions, key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.base.put(write_options, key, value)
    }

    /// Writes into `column_family` through the base database.
    pub fn put_cf(
        &self,
        write_options: &WriteOptions,
        column_family: &ColumnFamilyHandle,
        key: &[u8],
        value: &[u8],
    ) -> CoreResult<()> {
        self.base.put_cf(write_options, column_family, key, value)
    }

    /// Deletes `key` through the base database.
    pub fn delete(&self, write_options: &WriteOptions, key: &[u8]) -> CoreResult<()> {
        self.base.delete(write_options, key)
    }

    /// Deletes from `column_family` through the base database.
    pub fn delete_cf(
        &self,
        write_options: &WriteOptions,
        column_family: &ColumnFamilyHandle,
        key: &[u8],
    ) -> CoreResult<()> {
        self.base.delete_cf(write_options, column_family, key)
    }

    /// Looks up a column family by name.
    #[must_use]
    pub fn column_family(&self, name: &str) -> Option<ColumnFamilyHandle> {
        self.base.column_family(name)
    }

    /// Creates a column family.
    pub fn create_column_family(
        &self,
        name: &str,
        options: &Options,
    ) -> CoreResult<ColumnFamilyHandle> {
        self.base.create_column_family(name, options)
    }

    /// Drops a column family.
    pub fn drop_column_family(&self, column_family: &ColumnFamilyHandle) -> CoreResult<()> {
        self.base.drop_column_family(column_family)
    }

    /// Creates a checkpoint object for the database.
    pub fn new_checkpoint(&self) -> CoreResult<Checkpoint<'_>> {
        self.base.new_checkpoint()
    }

    /// Returns a copy of the counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.base.stats()
    }

    /// Closes the database and its base. Idempotent.
    pub fn close(&self) {
        self.base.close();
    }

    /// Returns true once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.base.is_closed()
    }
}
