//! Non-transactional database handle.

use crate::checkpoint::Checkpoint;
use crate::column_family::{ColumnFamilyHandle, DEFAULT_COLUMN_FAMILY_NAME};
use crate::config::{Options, ReadOptions, SnapshotBinding, WriteOptions};
use crate::engine::{Engine, TrackedKeys, WriteBatch};
use crate::error::{CoreError, CoreResult};
use crate::log::BatchOp;
use crate::snapshot::Snapshot;
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::types::{ColumnFamilyId, DatabaseId, SequenceNumber, SnapshotId, TransactionId};
use crate::view::{ByteView, ByteViews};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// The base database handle.
///
/// `Database` reads and writes the keyspace directly, without conflict
/// tracking. It is either opened standalone or owned by an
/// [`OptimisticTransactionDb`](crate::OptimisticTransactionDb), which lends
/// it out through `base_db()`.
///
/// # Lifecycle
///
/// [`Database::close`] releases the engine (flushing the commit log and the
/// directory lock). It is idempotent and also runs on drop. Every operation
/// after close fails with [`CoreError::DatabaseClosed`].
///
/// ```rust,ignore
/// use optikv_core::{Database, Options, ReadOptions, WriteOptions};
///
/// let db = Database::open(&Options::default(), "my_db")?;
/// db.put(&WriteOptions::default(), b"key", b"value")?;
/// let view = db.get(&ReadOptions::default(), b"key")?;
/// assert_eq!(view.data(), b"value");
/// ```
#[derive(Debug)]
pub struct Database {
    id: DatabaseId,
    path: Option<PathBuf>,
    options: Options,
    engine: RwLock<Option<Engine>>,
    stats: DatabaseStats,
    next_transaction_id: AtomicU64,
}

impl Database {
    /// Opens (or creates) the database at `path` with only the default
    /// column family.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Open`] with the engine's diagnostic when the
    /// directory is locked by another handle, missing without
    /// `create_if_missing`, present with `error_if_exists`, holds column
    /// families other than `default`, or cannot be recovered.
    pub fn open(options: &Options, path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let (engine, _) = Engine::open(path, options, &[]).map_err(|err| open_failure(path, &err))?;
        Ok(Self::from_engine(engine, Some(path.to_path_buf()), options))
    }

    /// Opens the database with the named column families.
    ///
    /// Returns one handle per name, in input order. `default` may be listed.
    ///
    /// # Errors
    ///
    /// [`CoreError::ColumnFamilyMismatch`] when `names` and `cf_options`
    /// differ in length (checked before touching the filesystem), otherwise
    /// [`CoreError::Open`] as for [`Database::open`].
    pub fn open_column_families(
        options: &Options,
        path: impl AsRef<Path>,
        names: &[&str],
        cf_options: &[Options],
    ) -> CoreResult<(Self, Vec<ColumnFamilyHandle>)> {
        if names.len() != cf_options.len() {
            return Err(CoreError::ColumnFamilyMismatch {
                names: names.len(),
                options: cf_options.len(),
            });
        }

        let path = path.as_ref();
        let listed: Vec<(&str, &Options)> = names.iter().copied().zip(cf_options).collect();
        let (engine, ids) =
            Engine::open(path, options, &listed).map_err(|err| open_failure(path, &err))?;

        let db = Self::from_engine(engine, Some(path.to_path_buf()), options);
        let handles = db.handles(names, &ids);
        Ok((db, handles))
    }

    /// Opens an ephemeral database. Nothing touches the filesystem and
    /// everything is lost on close.
    pub fn open_in_memory(options: &Options) -> CoreResult<Self> {
        let (engine, _) = Engine::open_in_memory(options, &[])?;
        Ok(Self::from_engine(engine, None, options))
    }

    /// Opens an ephemeral database with the named column families.
    pub fn open_in_memory_column_families(
        options: &Options,
        names: &[&str],
        cf_options: &[Options],
    ) -> CoreResult<(Self, Vec<ColumnFamilyHandle>)> {
        if names.len() != cf_options.len() {
            return Err(CoreError::ColumnFamilyMismatch {
                names: names.len(),
                options: cf_options.len(),
            });
        }
        let listed: Vec<(&str, &Options)> = names.iter().copied().zip(cf_options).collect();
        let (engine, ids) = Engine::open_in_memory(options, &listed)?;
        let db = Self::from_engine(engine, None, options);
        let handles = db.handles(names, &ids);
        Ok((db, handles))
    }

    fn from_engine(engine: Engine, path: Option<PathBuf>, options: &Options) -> Self {
        let db = Self {
            id: DatabaseId::allocate(),
            path,
            options: options.clone(),
            engine: RwLock::new(Some(engine)),
            stats: DatabaseStats::new(),
            next_transaction_id: AtomicU64::new(1),
        };
        tracing::debug!(database = %db.id, path = ?db.path, "database opened");
        db
    }

    fn handles(&self, names: &[&str], ids: &[ColumnFamilyId]) -> Vec<ColumnFamilyHandle> {
        names
            .iter()
            .zip(ids)
            .map(|(name, id)| ColumnFamilyHandle::new(self.id, *id, name))
            .collect()
    }

    /// Returns the instance id.
    #[must_use]
    pub fn id(&self) -> DatabaseId {
        self.id
    }

    /// Returns the directory, or `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the options the database was opened with.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns true once [`Database::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.engine.read().is_none()
    }

    // ------------------------------------------------------------------
    // Column families
    // ------------------------------------------------------------------

    /// Handle for the default column family.
    #[must_use]
    pub fn default_column_family(&self) -> ColumnFamilyHandle {
        ColumnFamilyHandle::new(self.id, ColumnFamilyId::DEFAULT, DEFAULT_COLUMN_FAMILY_NAME)
    }

    /// Looks up a column family by name. `None` if it does not exist or the
    /// database is closed.
    #[must_use]
    pub fn column_family(&self, name: &str) -> Option<ColumnFamilyHandle> {
        let guard = self.engine.read_recursive();
        let id = guard.as_ref()?.column_family_id(name)?;
        Some(ColumnFamilyHandle::new(self.id, id, name))
    }

    /// Names of every column family, in name order.
    pub fn column_family_names(&self) -> CoreResult<Vec<String>> {
        self.with_engine(|engine| Ok(engine.column_family_names()))
    }

    /// Creates a column family.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArgument`] if the name is empty, longer than
    /// [`MAX_COLUMN_FAMILY_NAME_LEN`](crate::MAX_COLUMN_FAMILY_NAME_LEN) bytes, or taken.
    pub fn create_column_family(
        &self,
        name: &str,
        options: &Options,
    ) -> CoreResult<ColumnFamilyHandle> {
        let id = self.with_engine(|engine| engine.create_column_family(name, options))?;
        Ok(ColumnFamilyHandle::new(self.id, id, name))
    }

    /// Drops a column family and all of its data. Handles to it become
    /// invalid.
    pub fn drop_column_family(&self, column_family: &ColumnFamilyHandle) -> CoreResult<()> {
        let id = self.check_column_family(column_family)?;
        self.with_engine(|engine| engine.drop_column_family(id))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Reads `key` from the default column family.
    pub fn get(&self, read_options: &ReadOptions, key: &[u8]) -> CoreResult<ByteView> {
        self.get_cf(read_options, &self.default_column_family(), key)
    }

    /// Reads `key` from `column_family`.
    ///
    /// The result is a live view; an absent key yields `exists() == false`.
    pub fn get_cf(
        &self,
        read_options: &ReadOptions,
        column_family: &ColumnFamilyHandle,
        key: &[u8],
    ) -> CoreResult<ByteView> {
        let id = self.check_column_family(column_family)?;
        let (value, _) = self.read_at(id, key, read_options.snapshot_binding())?;
        Ok(ByteView::from_lookup(value))
    }

    /// Reads several keys from the default column family.
    ///
    /// Without a snapshot in `read_options` each key is read at the latest
    /// sequence when its turn comes; bind a snapshot for a consistent view.
    pub fn multi_get<K, I>(&self, read_options: &ReadOptions, keys: I) -> CoreResult<ByteViews>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = K>,
    {
        let default = self.default_column_family();
        self.multi_get_cf(read_options, keys.into_iter().map(|key| (&default, key)))
    }

    /// Reads several `(column family, key)` pairs.
    pub fn multi_get_cf<'a, K, I>(&self, read_options: &ReadOptions, keys: I) -> CoreResult<ByteViews>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (&'a ColumnFamilyHandle, K)>,
    {
        let binding = read_options.snapshot_binding();
        let views = keys
            .into_iter()
            .map(|(column_family, key)| {
                let id = self.check_column_family(column_family)?;
                let (value, _) = self.read_at(id, key.as_ref(), binding)?;
                Ok(ByteView::from_lookup(value))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(ByteViews::from(views))
    }

    /// Latest committed sequence.
    pub fn latest_sequence(&self) -> CoreResult<SequenceNumber> {
        self.with_engine(|engine| Ok(engine.latest_sequence()))
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Writes `key = value` into the default column family.
    pub fn put(&self, write_options: &WriteOptions, key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.put_cf(write_options, &self.default_column_family(), key, value)
    }

    /// Writes `key = value` into `column_family`.
    pub fn put_cf(
        &self,
        write_options: &WriteOptions,
        column_family: &ColumnFamilyHandle,
        key: &[u8],
        value: &[u8],
    ) -> CoreResult<()> {
        let id = self.check_column_family(column_family)?;
        let op = BatchOp {
            column_family: id,
            key: key.to_vec(),
            value: Some(value.to_vec()),
        };
        self.apply(&[op], &TrackedKeys::new(), write_options)
            .map(|_| ())
    }

    /// Deletes `key` from the default column family. Deleting an absent key
    /// succeeds.
    pub fn delete(&self, write_options: &WriteOptions, key: &[u8]) -> CoreResult<()> {
        self.delete_cf(write_options, &self.default_column_family(), key)
    }

    /// Deletes `key` from `column_family`.
    pub fn delete_cf(
        &self,
        write_options: &WriteOptions,
        column_family: &ColumnFamilyHandle,
        key: &[u8],
    ) -> CoreResult<()> {
        let id = self.check_column_family(column_family)?;
        let op = BatchOp {
            column_family: id,
            key: key.to_vec(),
            value: None,
        };
        self.apply(&[op], &TrackedKeys::new(), write_options)
            .map(|_| ())
    }

    /// Applies every write in `batch` atomically, under one sequence.
    pub fn write(&self, write_options: &WriteOptions, batch: &WriteBatch) -> CoreResult<()> {
        let ops = batch
            .entries()
            .iter()
            .map(|entry| {
                if let Some(owner) = entry.owner {
                    if owner != self.id {
                        return Err(foreign_handle());
                    }
                }
                Ok(entry.op.clone())
            })
            .collect::<CoreResult<Vec<_>>>()?;
        self.apply(&ops, &TrackedKeys::new(), write_options)
            .map(|_| ())
    }

    /// Syncs the commit log to durable media.
    pub fn sync_wal(&self) -> CoreResult<()> {
        self.with_engine(Engine::sync)
    }

    // ------------------------------------------------------------------
    // Snapshots and checkpoints
    // ------------------------------------------------------------------

    /// Takes a snapshot of the latest committed state.
    ///
    /// Never fails. On a closed database the returned snapshot is already
    /// released, and reads bound to it fail.
    #[must_use]
    pub fn new_snapshot(&self) -> Snapshot {
        let guard = self.engine.read_recursive();
        match guard.as_ref() {
            Some(engine) => {
                let (id, sequence) = engine.create_snapshot();
                self.stats.record_snapshot_created();
                Snapshot::live(id, sequence, self.id)
            }
            None => {
                tracing::warn!(database = %self.id, "snapshot requested from a closed database");
                Snapshot::released(self.id)
            }
        }
    }

    /// Releases a snapshot created by this database.
    ///
    /// Releasing twice is a no-op. A snapshot from another database is left
    /// untouched; that is a caller bug and trips a debug assertion.
    pub fn release_snapshot(&self, snapshot: &mut Snapshot) {
        if snapshot.is_released() {
            return;
        }
        if snapshot.owner() != self.id {
            tracing::error!(
                snapshot = %snapshot.id(),
                owner = %snapshot.owner(),
                database = %self.id,
                "snapshot released through a database that did not create it"
            );
            debug_assert!(false, "snapshot released through the wrong database");
            return;
        }

        let guard = self.engine.read_recursive();
        if let Some(engine) = guard.as_ref() {
            if engine.release_snapshot(snapshot.id()) {
                self.stats.record_snapshot_released();
            }
        }
        snapshot.mark_released();
    }

    /// Creates a checkpoint object for this database.
    pub fn new_checkpoint(&self) -> CoreResult<Checkpoint<'_>> {
        self.with_engine(|_| Ok(()))?;
        Ok(Checkpoint::new(self))
    }

    /// Returns a copy of the counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Closes the database. Idempotent.
    ///
    /// Outstanding snapshots and transactions are not released; any later
    /// use of them fails with [`CoreError::DatabaseClosed`].
    pub fn close(&self) {
        let engine = self.engine.write().take();
        if let Some(engine) = engine {
            engine.shutdown();
            tracing::debug!(database = %self.id, "database closed");
        }
    }

    // ------------------------------------------------------------------
    // Crate-internal plumbing
    // ------------------------------------------------------------------

    pub(crate) fn with_engine<T>(&self, f: impl FnOnce(&Engine) -> CoreResult<T>) -> CoreResult<T> {
        let guard = self.engine.read_recursive();
        let engine = guard.as_ref().ok_or(CoreError::DatabaseClosed)?;
        f(engine)
    }

    pub(crate) fn stats_handle(&self) -> &DatabaseStats {
        &self.stats
    }

    pub(crate) fn allocate_transaction_id(&self) -> TransactionId {
        TransactionId::new(self.next_transaction_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn check_column_family(&self, handle: &ColumnFamilyHandle) -> CoreResult<ColumnFamilyId> {
        if handle.database() != self.id {
            return Err(foreign_handle());
        }
        Ok(handle.id())
    }

    /// Reads at the bound snapshot (or the latest sequence) and returns the
    /// sequence the read observed.
    pub(crate) fn read_at(
        &self,
        column_family: ColumnFamilyId,
        key: &[u8],
        binding: Option<SnapshotBinding>,
    ) -> CoreResult<(Option<Vec<u8>>, SequenceNumber)> {
        let snapshot = self.resolve_snapshot(binding)?;
        let (value, at) = self.with_engine(|engine| engine.get(column_family, key, snapshot))?;
        self.stats
            .record_read(value.as_ref().map_or(0, Vec::len));
        Ok((value, at))
    }

    /// Validates `tracked` and applies `ops` atomically.
    pub(crate) fn apply(
        &self,
        ops: &[BatchOp],
        tracked: &TrackedKeys,
        write_options: &WriteOptions,
    ) -> CoreResult<SequenceNumber> {
        let sequence = self.with_engine(|engine| engine.commit(ops, tracked, write_options))?;
        for op in ops {
            match &op.value {
                Some(value) => self.stats.record_write(op.key.len() + value.len()),
                None => self.stats.record_delete(),
            }
        }
        Ok(sequence)
    }

    fn resolve_snapshot(
        &self,
        binding: Option<SnapshotBinding>,
    ) -> CoreResult<Option<(SnapshotId, SequenceNumber)>> {
        match binding {
            None => Ok(None),
            Some(binding) if binding.owner != self.id => Err(CoreError::invalid_argument(
                "snapshot belongs to another database",
            )),
            Some(binding) => Ok(Some((binding.id, binding.sequence))),
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.close();
    }
}

fn foreign_handle() -> CoreError {
    CoreError::invalid_argument("column family handle belongs to another database")
}

/// Wraps an engine error as an open failure carrying the diagnostic.
fn open_failure(path: &Path, err: &CoreError) -> CoreError {
    let message = match err {
        CoreError::DatabaseLocked => format!(
            "lock {}: already held by another handle",
            path.join("LOCK").display()
        ),
        other => other.to_string(),
    };
    tracing::debug!(path = %path.display(), %message, "open failed");
    CoreError::open(path, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_db() -> Database {
        Database::open_in_memory(&Options::default()).unwrap()
    }

    fn ro() -> ReadOptions {
        ReadOptions::default()
    }

    fn wo() -> WriteOptions {
        WriteOptions::default()
    }

    #[test]
    fn put_then_get() {
        let db = create_db();
        db.put(&wo(), b"foo", b"bar").unwrap();

        let view = db.get(&ro(), b"foo").unwrap();
        assert!(view.exists());
        assert_eq!(view.data(), b"bar");
        assert_eq!(view.size(), 3);
    }

    #[test]
    fn missing_key_does_not_exist() {
        let db = create_db();
        let view = db.get(&ro(), b"never-written").unwrap();
        assert!(!view.exists());
        assert_eq!(view.size(), 0);
    }

    #[test]
    fn empty_value_exists() {
        let db = create_db();
        db.put(&wo(), b"k", b"").unwrap();
        let view = db.get(&ro(), b"k").unwrap();
        assert!(view.exists());
        assert_eq!(view.size(), 0);
    }

    #[test]
    fn delete_removes_key() {
        let db = create_db();
        db.put(&wo(), b"k", b"v").unwrap();
        db.delete(&wo(), b"k").unwrap();
        assert!(!db.get(&ro(), b"k").unwrap().exists());
        db.delete(&wo(), b"absent").unwrap();
    }

    #[test]
    fn snapshot_read_sees_old_value() {
        let db = create_db();
        db.put(&wo(), b"k", b"1").unwrap();
        let mut snapshot = db.new_snapshot();
        db.put(&wo(), b"k", b"2").unwrap();

        let at_snapshot = ReadOptions::new().snapshot(&snapshot);
        assert_eq!(db.get(&at_snapshot, b"k").unwrap().data(), b"1");
        assert_eq!(db.get(&ro(), b"k").unwrap().data(), b"2");

        db.release_snapshot(&mut snapshot);
        assert!(snapshot.is_released());
        assert!(matches!(
            db.get(&at_snapshot, b"k"),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn double_release_is_noop() {
        let db = create_db();
        let mut snapshot = db.new_snapshot();
        db.release_snapshot(&mut snapshot);
        db.release_snapshot(&mut snapshot);

        let stats = db.stats();
        assert_eq!(stats.snapshots_created, 1);
        assert_eq!(stats.snapshots_released, 1);
    }

    #[test]
    fn snapshot_from_other_database_is_rejected_for_reads() {
        let db = create_db();
        let other = create_db();
        let mut snapshot = other.new_snapshot();

        let read = ReadOptions::new().snapshot(&snapshot);
        assert!(matches!(
            db.get(&read, b"k"),
            Err(CoreError::InvalidArgument { .. })
        ));
        other.release_snapshot(&mut snapshot);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "wrong database"))]
    fn release_through_wrong_database_keeps_snapshot_live() {
        let db = create_db();
        let other = create_db();
        let mut snapshot = other.new_snapshot();

        db.release_snapshot(&mut snapshot);
        assert!(!snapshot.is_released());
        other.release_snapshot(&mut snapshot);
    }

    #[test]
    fn multi_get_preserves_order() {
        let db = create_db();
        db.put(&wo(), b"a", b"1").unwrap();
        db.put(&wo(), b"c", b"3").unwrap();

        let mut views = db.multi_get(&ro(), [&b"a"[..], &b"b"[..], &b"c"[..]]).unwrap();
        assert_eq!(views.len(), 3);
        assert_eq!(views[0].data(), b"1");
        assert!(!views[1].exists());
        assert_eq!(views[2].data(), b"3");
        views.destroy();
    }

    #[test]
    fn write_batch_is_atomic() {
        let db = create_db();
        let before = db.latest_sequence().unwrap();

        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.put(b"b", b"2");
        batch.delete(b"a");
        db.write(&wo(), &batch).unwrap();

        assert_eq!(db.latest_sequence().unwrap(), before.next());
        assert!(!db.get(&ro(), b"a").unwrap().exists());
        assert_eq!(db.get(&ro(), b"b").unwrap().data(), b"2");
    }

    #[test]
    fn write_batch_later_write_to_same_key_wins() {
        let db = create_db();
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.put(b"a", b"2");
        batch.put(b"d", b"x");
        batch.delete(b"d");
        batch.delete(b"e");
        batch.put(b"e", b"back");
        db.write(&wo(), &batch).unwrap();

        assert_eq!(db.get(&ro(), b"a").unwrap().data(), b"2");
        assert!(!db.get(&ro(), b"d").unwrap().exists());
        assert_eq!(db.get(&ro(), b"e").unwrap().data(), b"back");
    }

    #[test]
    fn batch_with_foreign_handle_is_rejected() {
        let db = create_db();
        let other = create_db();
        let handle = other.create_column_family("x", &Options::default()).unwrap();

        let mut batch = WriteBatch::new();
        batch.put_cf(&handle, b"k", b"v");
        assert!(matches!(
            db.write(&wo(), &batch),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn column_families_are_isolated() {
        let db = create_db();
        let users = db.create_column_family("users", &Options::default()).unwrap();
        db.put_cf(&wo(), &users, b"k", b"in-users").unwrap();

        assert!(!db.get(&ro(), b"k").unwrap().exists());
        assert_eq!(db.get_cf(&ro(), &users, b"k").unwrap().data(), b"in-users");
        assert_eq!(db.column_family("users"), Some(users.clone()));

        db.drop_column_family(&users).unwrap();
        assert!(db.column_family("users").is_none());
        assert!(matches!(
            db.get_cf(&ro(), &users, b"k"),
            Err(CoreError::ColumnFamilyNotFound { .. })
        ));
    }

    #[test]
    fn duplicate_column_family_is_rejected() {
        let db = create_db();
        db.create_column_family("a", &Options::default()).unwrap();
        assert!(db.create_column_family("a", &Options::default()).is_err());
    }

    #[test]
    fn operations_after_close_fail() {
        let db = create_db();
        db.put(&wo(), b"k", b"v").unwrap();
        db.close();
        db.close();

        assert!(db.is_closed());
        assert!(matches!(db.get(&ro(), b"k"), Err(CoreError::DatabaseClosed)));
        assert!(matches!(db.put(&wo(), b"k", b"v"), Err(CoreError::DatabaseClosed)));
        assert!(db.new_snapshot().is_released());
        assert!(db.column_family("default").is_none());
    }

    #[test]
    fn release_after_close_marks_released() {
        let db = create_db();
        let mut snapshot = db.new_snapshot();
        db.close();
        db.release_snapshot(&mut snapshot);
        assert!(snapshot.is_released());
    }

    #[test]
    fn mismatched_column_family_lists_fail_fast() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("never-created");
        let result = Database::open_column_families(
            &Options::default(),
            &path,
            &["a", "b"],
            &[Options::default()],
        );
        assert!(matches!(
            result,
            Err(CoreError::ColumnFamilyMismatch { names: 2, options: 1 })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn open_column_families_returns_handles_in_order() {
        let temp = tempdir().unwrap();
        let names = ["zeta", "default", "alpha"];
        let options = Options::default();
        let cf_options = vec![options.clone(); names.len()];

        let (db, handles) =
            Database::open_column_families(&options, temp.path(), &names, &cf_options).unwrap();

        assert_eq!(handles.len(), names.len());
        for (handle, name) in handles.iter().zip(names) {
            assert_eq!(handle.name(), name);
        }
        assert!(handles[1].is_default());
        assert_eq!(db.column_family_names().unwrap(), vec!["alpha", "default", "zeta"]);
    }

    #[test]
    fn second_open_fails_while_locked() {
        let temp = tempdir().unwrap();
        let _first = Database::open(&Options::default(), temp.path()).unwrap();

        match Database::open(&Options::default(), temp.path()) {
            Err(CoreError::Open { path, message }) => {
                assert_eq!(path, temp.path());
                assert!(message.contains("LOCK"));
            }
            other => panic!("expected open failure, got {other:?}"),
        }
    }

    #[test]
    fn close_releases_lock() {
        let temp = tempdir().unwrap();
        let db = Database::open(&Options::default(), temp.path()).unwrap();
        db.close();
        assert!(Database::open(&Options::default(), temp.path()).is_ok());
    }

    #[test]
    fn data_survives_reopen() {
        let temp = tempdir().unwrap();
        {
            let db = Database::open(&Options::default(), temp.path()).unwrap();
            db.put(&wo(), b"persist", b"yes").unwrap();
            db.delete(&wo(), b"persist-not").unwrap();
        }

        let db = Database::open(&Options::default(), temp.path()).unwrap();
        assert_eq!(db.get(&ro(), b"persist").unwrap().data(), b"yes");
    }

    #[test]
    fn error_if_exists_refuses_existing_database() {
        let temp = tempdir().unwrap();
        drop(Database::open(&Options::default(), temp.path()).unwrap());

        let strict = Options::default().error_if_exists(true);
        assert!(matches!(
            Database::open(&strict, temp.path()),
            Err(CoreError::Open { .. })
        ));
    }

    #[test]
    fn missing_database_without_create_fails() {
        let temp = tempdir().unwrap();
        let options = Options::default().create_if_missing(false);
        assert!(matches!(
            Database::open(&options, temp.path().join("absent")),
            Err(CoreError::Open { .. })
        ));
    }

    #[test]
    fn stats_count_operations() {
        let db = create_db();
        db.put(&wo(), b"k", b"v").unwrap();
        db.get(&ro(), b"k").unwrap();
        db.delete(&wo(), b"k").unwrap();

        let stats = db.stats();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.bytes_written, 2);
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.deletes, 1);
    }
}
