//! Database, read, write and transaction options.

use crate::snapshot::Snapshot;
use crate::types::{DatabaseId, SequenceNumber, SnapshotId};

/// Options for opening a database or configuring a column family.
///
/// The same type is used for the database and for each column family, as
/// in the `open_column_families` calls; database-wide fields are ignored
/// when an instance is passed for a column family.
#[derive(Debug, Clone)]
pub struct Options {
    /// Create the database directory when it does not exist.
    pub create_if_missing: bool,

    /// Fail the open when the database already exists.
    pub error_if_exists: bool,

    /// Create column families named at open time that do not exist yet.
    pub create_missing_column_families: bool,

    /// Sync the commit log on every write, regardless of `WriteOptions`.
    pub sync_on_commit: bool,

    /// Largest value accepted by a column family (`None` = unlimited).
    pub max_value_size: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            create_missing_column_families: false,
            sync_on_commit: false,
            max_value_size: None,
        }
    }
}

impl Options {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fail when the database exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether missing column families are created at open.
    #[must_use]
    pub const fn create_missing_column_families(mut self, value: bool) -> Self {
        self.create_missing_column_families = value;
        self
    }

    /// Sets whether every commit syncs the log.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the largest accepted value size.
    #[must_use]
    pub const fn max_value_size(mut self, limit: Option<usize>) -> Self {
        self.max_value_size = limit;
        self
    }
}

/// A snapshot reference stored inside [`ReadOptions`].
///
/// Holds the snapshot's identity, not the snapshot itself; the engine checks
/// at read time that the snapshot is still live in the owning database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotBinding {
    pub(crate) id: SnapshotId,
    pub(crate) sequence: SequenceNumber,
    pub(crate) owner: DatabaseId,
}

impl SnapshotBinding {
    /// Sequence the read is anchored to.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }
}

/// Options for a single read.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    snapshot: Option<SnapshotBinding>,
}

impl ReadOptions {
    /// Creates read options that observe the latest committed state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchors reads to `snapshot`.
    #[must_use]
    pub fn snapshot(mut self, snapshot: &Snapshot) -> Self {
        self.set_snapshot(snapshot);
        self
    }

    /// Anchors reads to `snapshot` in place.
    pub fn set_snapshot(&mut self, snapshot: &Snapshot) {
        self.snapshot = Some(snapshot.binding());
    }

    /// Removes the snapshot binding.
    pub fn clear_snapshot(&mut self) {
        self.snapshot = None;
    }

    /// Returns the bound snapshot, if any.
    #[must_use]
    pub fn snapshot_binding(&self) -> Option<SnapshotBinding> {
        self.snapshot
    }
}

/// Options for a single write or commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Sync the commit log before acknowledging the write.
    pub sync: bool,
    /// Skip the commit log. The write is lost if the process dies before
    /// a later logged write or checkpoint.
    pub disable_wal: bool,
}

impl WriteOptions {
    /// Creates default write options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to sync before acknowledging.
    #[must_use]
    pub const fn sync(mut self, value: bool) -> Self {
        self.sync = value;
        self
    }

    /// Sets whether to bypass the commit log.
    #[must_use]
    pub const fn disable_wal(mut self, value: bool) -> Self {
        self.disable_wal = value;
        self
    }
}

/// Options for an optimistic transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimisticTransactionOptions {
    /// Take a snapshot when the transaction begins. Reads default to it and
    /// every tracked key is validated against it at commit.
    pub set_snapshot: bool,
}

impl OptimisticTransactionOptions {
    /// Creates default transaction options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to snapshot at begin.
    #[must_use]
    pub const fn set_snapshot(mut self, value: bool) -> Self {
        self.set_snapshot = value;
        self
    }
}
