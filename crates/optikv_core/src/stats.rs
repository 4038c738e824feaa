//! Database statistics.
//!
//! Counters are atomic and may be read while operations are in flight.
//!
//! ```rust,ignore
//! let stats = db.stats();
//! println!("commits: {}, conflicts: {}", stats.transactions_committed, stats.conflicts);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by an open database.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    reads: AtomicU64,
    bytes_read: AtomicU64,
    writes: AtomicU64,
    bytes_written: AtomicU64,
    deletes: AtomicU64,
    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_aborted: AtomicU64,
    conflicts: AtomicU64,
    snapshots_created: AtomicU64,
    snapshots_released: AtomicU64,
    checkpoints: AtomicU64,
}

impl DatabaseStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self, bytes: usize) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, bytes: usize) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_snapshot_created(&self) {
        self.snapshots_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_snapshot_released(&self) {
        self.snapshots_released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_checkpoint(&self) {
        self.checkpoints.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the counters into a plain struct.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            transactions_started: self.transactions_started.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_aborted: self.transactions_aborted.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            snapshots_created: self.snapshots_created.load(Ordering::Relaxed),
            snapshots_released: self.snapshots_released.load(Ordering::Relaxed),
            checkpoints: self.checkpoints.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DatabaseStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Point reads served (direct and transactional).
    pub reads: u64,
    /// Bytes returned by reads.
    pub bytes_read: u64,
    /// Puts applied.
    pub writes: u64,
    /// Bytes written by puts.
    pub bytes_written: u64,
    /// Deletes applied.
    pub deletes: u64,
    /// Transactions begun or restarted.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions rolled back or failed validation.
    pub transactions_aborted: u64,
    /// Commits rejected by optimistic validation.
    pub conflicts: u64,
    /// Snapshots created.
    pub snapshots_created: u64,
    /// Snapshots released.
    pub snapshots_released: u64,
    /// Checkpoints written.
    pub checkpoints: u64,
}

impl StatsSnapshot {
    /// Snapshots created but not yet released.
    #[must_use]
    pub fn live_snapshots(&self) -> u64 {
        self.snapshots_created.saturating_sub(self.snapshots_released)
    }
}
