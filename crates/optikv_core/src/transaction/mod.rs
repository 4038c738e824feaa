//! Optimistic transactions.
//!
//! A transaction buffers its writes and remembers, for every key it reads
//! or writes, the sequence at which it observed that key. Nothing is locked
//! while the transaction runs. At commit the engine re-checks every tracked
//! key under its commit mutex; if any was committed by someone else after
//! it was observed, the commit fails with [`CoreError::CommitConflict`] and
//! nothing is applied.
//!
//! ## Restarting
//!
//! A finished (or conflicted) transaction can be handed back to
//! `transaction_begin` as `previous`. Its buffers are cleared, keeping their
//! capacity, and it starts over under a new id.

mod state;

pub use state::TransactionState;

use crate::column_family::ColumnFamilyHandle;
use crate::config::{OptimisticTransactionOptions, ReadOptions, WriteOptions};
use crate::database::Database;
use crate::engine::TrackedKeys;
use crate::error::{CoreError, CoreResult};
use crate::snapshot::Snapshot;
use crate::types::{ColumnFamilyId, SequenceNumber, TransactionId};
use crate::view::ByteView;
use state::WriteSet;

/// An optimistic unit of work against one database.
///
/// Dropping an active transaction rolls it back.
#[derive(Debug)]
pub struct Transaction<'db> {
    db: &'db Database,
    id: TransactionId,
    state: TransactionState,
    write_options: WriteOptions,
    options: OptimisticTransactionOptions,
    snapshot: Option<Snapshot>,
    writes: WriteSet,
    tracked: TrackedKeys,
}

impl<'db> Transaction<'db> {
    pub(crate) fn begin(
        db: &'db Database,
        write_options: WriteOptions,
        options: OptimisticTransactionOptions,
    ) -> Self {
        let mut txn = Self {
            db,
            id: db.allocate_transaction_id(),
            state: TransactionState::Active,
            write_options,
            options,
            snapshot: None,
            writes: WriteSet::default(),
            tracked: TrackedKeys::new(),
        };
        txn.start();
        txn
    }

    /// Reinitialises this handle as a fresh transaction.
    pub(crate) fn reset(&mut self, write_options: WriteOptions, options: OptimisticTransactionOptions) {
        if self.state == TransactionState::Active {
            tracing::debug!(txn = %self.id, "rolling back active transaction before reuse");
            self.abort();
        }
        self.release_snapshot();
        self.writes.clear();
        self.tracked.clear();

        self.id = self.db.allocate_transaction_id();
        self.state = TransactionState::Active;
        self.write_options = write_options;
        self.options = options;
        self.start();
    }

    fn start(&mut self) {
        if self.options.set_snapshot {
            self.snapshot = Some(self.db.new_snapshot());
        }
        self.db.stats_handle().record_transaction_start();
        tracing::trace!(txn = %self.id, snapshot = self.options.set_snapshot, "transaction started");
    }

    pub(crate) fn belongs_to(&self, db: &Database) -> bool {
        std::ptr::eq(self.db, db)
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true while reads and writes are accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Write options the transaction commits with.
    #[must_use]
    pub fn write_options(&self) -> &WriteOptions {
        &self.write_options
    }

    /// Options the transaction was started with.
    #[must_use]
    pub fn options(&self) -> &OptimisticTransactionOptions {
        &self.options
    }

    /// Number of buffered writes (one per distinct key).
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Sequence of the transaction's snapshot, if it has one.
    #[must_use]
    pub fn snapshot_sequence(&self) -> Option<SequenceNumber> {
        self.snapshot.as_ref().map(Snapshot::sequence)
    }

    /// The transaction's snapshot, if it has one.
    #[must_use]
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// The database this transaction runs against.
    #[must_use]
    pub fn database(&self) -> &'db Database {
        self.db
    }

    /// Takes a new snapshot; later reads and conflict checks are anchored
    /// to it. Keys already tracked keep their observed sequence.
    pub fn set_snapshot(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.release_snapshot();
        self.snapshot = Some(self.db.new_snapshot());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Reads `key` from the default column family.
    pub fn get(&mut self, read_options: &ReadOptions, key: &[u8]) -> CoreResult<ByteView> {
        self.get_cf(read_options, &self.db.default_column_family(), key)
    }

    /// Reads `key` from `column_family`.
    ///
    /// Buffered writes of this transaction are visible. Otherwise the read
    /// uses the snapshot in `read_options`, then the transaction snapshot,
    /// then the latest committed state. The key is tracked for validation.
    pub fn get_cf(
        &mut self,
        read_options: &ReadOptions,
        column_family: &ColumnFamilyHandle,
        key: &[u8],
    ) -> CoreResult<ByteView> {
        self.ensure_active()?;
        let cf = self.db.check_column_family(column_family)?;

        if let Some(buffered) = self.writes.get(cf, key) {
            return Ok(ByteView::from_lookup(buffered.map(<[u8]>::to_vec)));
        }

        let binding = read_options
            .snapshot_binding()
            .or_else(|| self.snapshot.as_ref().map(Snapshot::binding));
        let (value, observed) = self.db.read_at(cf, key, binding)?;
        self.tracked.entry((cf, key.to_vec())).or_insert(observed);
        Ok(ByteView::from_lookup(value))
    }

    /// Same as [`Transaction::get`]. Optimistic transactions take no locks,
    /// so reading "for update" only tracks the key.
    pub fn get_for_update(&mut self, read_options: &ReadOptions, key: &[u8]) -> CoreResult<ByteView> {
        self.get(read_options, key)
    }

    /// Same as [`Transaction::get_cf`].
    pub fn get_for_update_cf(
        &mut self,
        read_options: &ReadOptions,
        column_family: &ColumnFamilyHandle,
        key: &[u8],
    ) -> CoreResult<ByteView> {
        self.get_cf(read_options, column_family, key)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Buffers `key = value` in the default column family.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.put_cf(&self.db.default_column_family(), key, value)
    }

    /// Buffers `key = value` in `column_family`.
    pub fn put_cf(
        &mut self,
        column_family: &ColumnFamilyHandle,
        key: &[u8],
        value: &[u8],
    ) -> CoreResult<()> {
        self.buffer(column_family, key, Some(value))
    }

    /// Buffers a delete of `key` in the default column family.
    pub fn delete(&mut self, key: &[u8]) -> CoreResult<()> {
        self.delete_cf(&self.db.default_column_family(), key)
    }

    /// Buffers a delete of `key` in `column_family`.
    pub fn delete_cf(&mut self, column_family: &ColumnFamilyHandle, key: &[u8]) -> CoreResult<()> {
        self.buffer(column_family, key, None)
    }

    fn buffer(
        &mut self,
        column_family: &ColumnFamilyHandle,
        key: &[u8],
        value: Option<&[u8]>,
    ) -> CoreResult<()> {
        self.ensure_active()?;
        let cf = self.db.check_column_family(column_family)?;
        self.track_write(cf, key)?;
        self.writes.record(cf, key, value);
        Ok(())
    }

    /// Tracks a written key at the transaction snapshot, or at the latest
    /// sequence if there is none. A key already tracked by a read keeps the
    /// sequence the read observed.
    fn track_write(&mut self, cf: ColumnFamilyId, key: &[u8]) -> CoreResult<()> {
        if self.tracked.contains_key(&(cf, key.to_vec())) {
            return Ok(());
        }
        let observed = match self.snapshot_sequence() {
            Some(sequence) => sequence,
            None => self.db.latest_sequence()?,
        };
        self.tracked.insert((cf, key.to_vec()), observed);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    /// Validates and applies the buffered writes.
    ///
    /// # Errors
    ///
    /// [`CoreError::CommitConflict`] when a tracked key was committed by
    /// someone else after this transaction observed it. Any failure leaves
    /// the transaction `Aborted` with nothing applied; restart it through
    /// `transaction_begin(.., Some(txn))` to retry.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_active()?;

        match self
            .db
            .apply(self.writes.ops(), &self.tracked, &self.write_options)
        {
            Ok(sequence) => {
                self.state = TransactionState::Committed;
                self.db.stats_handle().record_transaction_commit();
                tracing::debug!(
                    txn = %self.id,
                    %sequence,
                    writes = self.writes.len(),
                    "transaction committed"
                );
                self.writes.clear();
                self.tracked.clear();
                Ok(())
            }
            Err(err) => {
                if err.is_conflict() {
                    self.db.stats_handle().record_conflict();
                    tracing::warn!(txn = %self.id, error = %err, "transaction conflict");
                } else {
                    tracing::debug!(txn = %self.id, error = %err, "transaction commit failed");
                }
                self.abort();
                Err(err)
            }
        }
    }

    /// Discards the buffered writes. Never fails because of conflicts.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidOperation`] if the transaction is not active.
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.abort();
        tracing::debug!(txn = %self.id, "transaction rolled back");
        Ok(())
    }

    fn abort(&mut self) {
        self.writes.clear();
        self.tracked.clear();
        self.state = TransactionState::Aborted;
        self.db.stats_handle().record_transaction_abort();
    }

    fn release_snapshot(&mut self) {
        if let Some(mut snapshot) = self.snapshot.take() {
            self.db.release_snapshot(&mut snapshot);
        }
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.state == TransactionState::Active {
            Ok(())
        } else {
            Err(CoreError::invalid_operation(format!(
                "transaction {} is {}",
                self.id,
                self.state.as_str()
            )))
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            self.abort();
            tracing::trace!(txn = %self.id, "active transaction dropped; rolled back");
        }
        self.release_snapshot();
    }
}
