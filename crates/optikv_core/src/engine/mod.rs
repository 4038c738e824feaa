//! Storage engine underneath the database handles.
//!
//! The engine owns:
//!
//! - one [`VersionedTable`] per column family
//! - the commit log (`data.log`) and the manifest (`MANIFEST`)
//! - the directory lock, for on-disk databases
//! - the registry of live snapshots, which bounds version pruning
//!
//! Every write goes through [`Engine::commit`] under a single commit mutex,
//! so validation, logging and application of a batch are atomic with
//! respect to other writers. Readers only take a short read lock on the
//! table they read.

mod batch;
mod table;

pub use batch::WriteBatch;

use crate::column_family::DEFAULT_COLUMN_FAMILY_NAME;
use crate::config::{Options, WriteOptions};
use crate::dir::{self, DatabaseDir};
use crate::error::{CoreError, CoreResult};
use crate::log::{BatchOp, CommitLog, LogRecord};
use crate::manifest::{validate_column_family_name, Manifest};
use crate::snapshot::SnapshotList;
use crate::types::{ColumnFamilyId, SequenceNumber, SnapshotId};
use optikv_storage::{FileBackend, InMemoryBackend};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use table::VersionedTable;

/// Keys a transaction observed, with the sequence each was observed at.
pub(crate) type TrackedKeys = HashMap<(ColumnFamilyId, Vec<u8>), SequenceNumber>;

/// A column family's table and settings.
#[derive(Debug)]
pub(crate) struct ColumnFamilyData {
    pub(crate) name: String,
    max_value_size: Option<usize>,
    table: RwLock<VersionedTable>,
}

impl ColumnFamilyData {
    fn new(name: &str, options: &Options) -> Self {
        Self {
            name: name.to_string(),
            max_value_size: options.max_value_size,
            table: RwLock::new(VersionedTable::new()),
        }
    }
}

/// Latest committed state captured for a checkpoint.
#[derive(Debug)]
pub(crate) struct CheckpointState {
    pub(crate) manifest: Manifest,
    pub(crate) record: LogRecord,
}

/// The open storage engine.
pub(crate) struct Engine {
    dir: Option<DatabaseDir>,
    log: CommitLog,
    manifest: Mutex<Manifest>,
    column_families: RwLock<BTreeMap<ColumnFamilyId, Arc<ColumnFamilyData>>>,
    last_sequence: AtomicU64,
    commit_lock: Mutex<()>,
    snapshots: SnapshotList,
    sync_on_commit: bool,
}

impl Engine {
    /// Opens the engine at `path` with the listed column families.
    ///
    /// Returns the id of every listed column family, in input order.
    /// `default` is always opened, listed or not.
    pub(crate) fn open(
        path: &Path,
        options: &Options,
        column_families: &[(&str, &Options)],
    ) -> CoreResult<(Self, Vec<ColumnFamilyId>)> {
        let dir = DatabaseDir::open(path, options.create_if_missing)?;
        let is_new = dir.is_new_database();

        if is_new && !options.create_if_missing {
            return Err(CoreError::invalid_argument(
                "database does not exist (create_if_missing is false)",
            ));
        }
        if !is_new && options.error_if_exists {
            return Err(CoreError::invalid_argument(
                "database already exists (error_if_exists is true)",
            ));
        }

        let stored = dir.load_manifest()?;
        let mut manifest = stored.clone().unwrap_or_default();

        let unlisted: Vec<&str> = manifest
            .iter()
            .map(|(name, _)| name)
            .filter(|name| {
                *name != DEFAULT_COLUMN_FAMILY_NAME
                    && !column_families.iter().any(|(listed, _)| listed == name)
            })
            .collect();
        if !unlisted.is_empty() {
            return Err(CoreError::invalid_argument(format!(
                "column families not opened: {}",
                unlisted.join(", ")
            )));
        }

        let may_create = options.create_missing_column_families || is_new;
        for (name, _) in column_families {
            validate_column_family_name(name)?;
            if manifest.get(name).is_none() {
                if !may_create {
                    return Err(CoreError::invalid_argument(format!(
                        "column family does not exist: {name} (create_missing_column_families is false)"
                    )));
                }
                manifest.get_or_create(name);
            }
        }

        if stored.as_ref() != Some(&manifest) {
            dir.save_manifest(&manifest)?;
        }

        let backend = FileBackend::open(&dir.log_path())?;
        let engine = Self::assemble(
            Some(dir),
            CommitLog::new(Box::new(backend)),
            manifest,
            options,
            column_families,
        );
        let ids = engine.listed_ids(column_families)?;
        engine.recover()?;

        tracing::debug!(
            path = %path.display(),
            column_families = ids.len(),
            last_sequence = engine.last_sequence.load(Ordering::Acquire),
            "engine opened"
        );
        Ok((engine, ids))
    }

    /// Opens an ephemeral engine with no directory, lock or manifest file.
    pub(crate) fn open_in_memory(
        options: &Options,
        column_families: &[(&str, &Options)],
    ) -> CoreResult<(Self, Vec<ColumnFamilyId>)> {
        let mut manifest = Manifest::new();
        for (name, _) in column_families {
            validate_column_family_name(name)?;
            manifest.get_or_create(name);
        }
        let engine = Self::assemble(
            None,
            CommitLog::new(Box::new(InMemoryBackend::new())),
            manifest,
            options,
            column_families,
        );
        let ids = engine.listed_ids(column_families)?;
        Ok((engine, ids))
    }

    fn assemble(
        dir: Option<DatabaseDir>,
        log: CommitLog,
        manifest: Manifest,
        options: &Options,
        column_families: &[(&str, &Options)],
    ) -> Self {
        let tables = manifest
            .iter()
            .map(|(name, id)| {
                let cf_options = column_families
                    .iter()
                    .find(|(listed, _)| *listed == name)
                    .map_or(options, |(_, cf_options)| *cf_options);
                (id, Arc::new(ColumnFamilyData::new(name, cf_options)))
            })
            .collect();

        Self {
            dir,
            log,
            manifest: Mutex::new(manifest),
            column_families: RwLock::new(tables),
            last_sequence: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
            snapshots: SnapshotList::new(),
            sync_on_commit: options.sync_on_commit,
        }
    }

    fn listed_ids(&self, column_families: &[(&str, &Options)]) -> CoreResult<Vec<ColumnFamilyId>> {
        column_families
            .iter()
            .map(|(name, _)| {
                self.column_family_id(name)
                    .ok_or_else(|| CoreError::column_family_not_found(*name))
            })
            .collect()
    }

    /// Replays the commit log into the tables.
    fn recover(&self) -> CoreResult<()> {
        let replay = self.log.replay()?;
        let tables = self.column_families.read();
        let mut last = 0u64;

        for record in &replay.records {
            for op in &record.ops {
                // Records for dropped column families are skipped.
                if let Some(data) = tables.get(&op.column_family) {
                    data.table
                        .write()
                        .apply(&op.key, record.sequence, op.value.clone());
                }
            }
            last = last.max(record.sequence.as_u64());
        }
        self.last_sequence.store(last, Ordering::Release);

        tracing::debug!(
            records = replay.records.len(),
            truncated_bytes = replay.truncated_bytes,
            "commit log replayed"
        );
        Ok(())
    }

    /// Latest committed sequence.
    pub(crate) fn latest_sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.last_sequence.load(Ordering::Acquire))
    }

    pub(crate) fn column_family(&self, id: ColumnFamilyId) -> CoreResult<Arc<ColumnFamilyData>> {
        self.column_families
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::column_family_not_found(id.to_string()))
    }

    pub(crate) fn column_family_id(&self, name: &str) -> Option<ColumnFamilyId> {
        self.manifest.lock().get(name)
    }

    pub(crate) fn column_family_names(&self) -> Vec<String> {
        self.manifest
            .lock()
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Reads `key` at the snapshot, or at the latest sequence.
    ///
    /// Returns the value and the sequence it was read at.
    pub(crate) fn get(
        &self,
        column_family: ColumnFamilyId,
        key: &[u8],
        snapshot: Option<(SnapshotId, SequenceNumber)>,
    ) -> CoreResult<(Option<Vec<u8>>, SequenceNumber)> {
        let data = self.column_family(column_family)?;
        // Holding the table lock keeps pruning from racing the read.
        let table = data.table.read();
        let at = match snapshot {
            Some((id, sequence)) => {
                if !self.snapshots.contains(id) {
                    return Err(CoreError::invalid_argument(format!(
                        "snapshot {id} has been released"
                    )));
                }
                sequence
            }
            None => self.latest_sequence(),
        };
        Ok((table.get(key, at).map(<[u8]>::to_vec), at))
    }

    /// Validates `tracked` and applies `ops` as one batch.
    ///
    /// Fails with [`CoreError::CommitConflict`] if any tracked key was
    /// committed after the sequence it was observed at; nothing is applied
    /// then. An empty batch does not consume a sequence.
    pub(crate) fn commit(
        &self,
        ops: &[BatchOp],
        tracked: &TrackedKeys,
        options: &WriteOptions,
    ) -> CoreResult<SequenceNumber> {
        let _guard = self.commit_lock.lock();

        for ((column_family, key), observed) in tracked {
            let data = self.column_family(*column_family)?;
            let latest = data.table.read().latest_sequence(key);
            if latest.is_some_and(|latest| latest > *observed) {
                return Err(CoreError::commit_conflict(data.name.clone(), key));
            }
        }

        let mut targets = HashMap::new();
        for op in ops {
            let data = match targets.entry(op.column_family) {
                Entry::Occupied(entry) => Arc::clone(entry.get()),
                Entry::Vacant(entry) => Arc::clone(entry.insert(self.column_family(op.column_family)?)),
            };
            if let (Some(limit), Some(value)) = (data.max_value_size, &op.value) {
                if value.len() > limit {
                    return Err(CoreError::ValueTooLarge {
                        column_family: data.name.clone(),
                        size: value.len(),
                        limit,
                    });
                }
            }
        }

        if ops.is_empty() {
            return Ok(self.latest_sequence());
        }

        let sequence = self.latest_sequence().next();
        if !options.disable_wal {
            let record = LogRecord {
                sequence,
                ops: ops.to_vec(),
            };
            if let Err(err) = self.log.append(&record, options.sync || self.sync_on_commit) {
                // The sequence is burned so a frame that survived the failed
                // append cannot share it with the next commit.
                self.last_sequence.store(sequence.as_u64(), Ordering::Release);
                return Err(err);
            }
        }

        for op in ops {
            if let Some(data) = targets.get(&op.column_family) {
                data.table.write().apply(&op.key, sequence, op.value.clone());
            }
        }
        self.last_sequence.store(sequence.as_u64(), Ordering::Release);

        let horizon = self.snapshots.oldest().unwrap_or(sequence);
        for op in ops {
            if let Some(data) = targets.get(&op.column_family) {
                data.table.write().prune_key(&op.key, horizon);
            }
        }

        Ok(sequence)
    }

    /// Registers a snapshot at the latest sequence.
    pub(crate) fn create_snapshot(&self) -> (SnapshotId, SequenceNumber) {
        // Under the commit lock so a concurrent commit cannot prune past it.
        let _guard = self.commit_lock.lock();
        let sequence = self.latest_sequence();
        (self.snapshots.insert(sequence), sequence)
    }

    /// Unregisters a snapshot and prunes what it pinned. Returns false if
    /// the snapshot was not live.
    pub(crate) fn release_snapshot(&self, id: SnapshotId) -> bool {
        let _guard = self.commit_lock.lock();
        if !self.snapshots.remove(id) {
            return false;
        }

        let horizon = self
            .snapshots
            .oldest()
            .unwrap_or_else(|| self.latest_sequence());
        let dropped: usize = self
            .column_families
            .read()
            .values()
            .map(|data| data.table.write().prune(horizon))
            .sum();
        tracing::trace!(snapshot = %id, %horizon, dropped, "snapshot released");
        true
    }

    /// Registers a new column family.
    pub(crate) fn create_column_family(
        &self,
        name: &str,
        options: &Options,
    ) -> CoreResult<ColumnFamilyId> {
        validate_column_family_name(name)?;

        let _guard = self.commit_lock.lock();
        let mut manifest = self.manifest.lock();
        if manifest.get(name).is_some() {
            return Err(CoreError::invalid_argument(format!(
                "column family already exists: {name}"
            )));
        }

        let mut updated = manifest.clone();
        let id = updated.get_or_create(name);
        self.persist_manifest(&updated)?;
        *manifest = updated;

        self.column_families
            .write()
            .insert(id, Arc::new(ColumnFamilyData::new(name, options)));
        tracing::debug!(name, %id, "column family created");
        Ok(id)
    }

    /// Removes a column family and its data.
    pub(crate) fn drop_column_family(&self, id: ColumnFamilyId) -> CoreResult<()> {
        if id == ColumnFamilyId::DEFAULT {
            return Err(CoreError::invalid_argument(
                "the default column family cannot be dropped",
            ));
        }

        let _guard = self.commit_lock.lock();
        let data = self.column_family(id)?;
        let mut manifest = self.manifest.lock();

        let mut updated = manifest.clone();
        updated.remove(&data.name);
        self.persist_manifest(&updated)?;
        *manifest = updated;

        self.column_families.write().remove(&id);
        tracing::debug!(name = %data.name, %id, "column family dropped");
        Ok(())
    }

    fn persist_manifest(&self, manifest: &Manifest) -> CoreResult<()> {
        match &self.dir {
            Some(dir) => dir.save_manifest(manifest),
            None => Ok(()),
        }
    }

    /// Captures the latest value of every key in every column family.
    pub(crate) fn checkpoint_state(&self) -> CheckpointState {
        let _guard = self.commit_lock.lock();
        let manifest = self.manifest.lock().clone();
        let mut ops = Vec::new();

        for (id, data) in self.column_families.read().iter() {
            let table = data.table.read();
            ops.extend(table.latest_values().map(|(key, value)| BatchOp {
                column_family: *id,
                key: key.to_vec(),
                value: Some(value.to_vec()),
            }));
        }

        CheckpointState {
            manifest,
            record: LogRecord {
                sequence: self.latest_sequence(),
                ops,
            },
        }
    }

    /// Syncs the commit log to durable media.
    pub(crate) fn sync(&self) -> CoreResult<()> {
        self.log.sync()
    }

    /// Bytes in the commit log.
    #[cfg(test)]
    pub(crate) fn log_size(&self) -> CoreResult<u64> {
        self.log.size()
    }

    /// Flushes the log and releases the directory lock.
    pub(crate) fn shutdown(self) {
        if let Err(err) = self.log.sync() {
            tracing::warn!(error = %err, "failed to sync commit log on close");
        }
        let pinned = self.snapshots.len();
        if pinned > 0 {
            tracing::debug!(pinned, "closing with live snapshots");
        }
        self.snapshots.clear();
        if let Some(dir) = &self.dir {
            tracing::debug!(path = %dir.path().display(), "engine closed");
        }
    }
}

/// Writes a standalone copy of `state` into the new directory `target`.
pub(crate) fn write_checkpoint(target: &Path, state: &CheckpointState) -> CoreResult<()> {
    std::fs::create_dir(target).map_err(|err| {
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            CoreError::invalid_argument(format!(
                "checkpoint directory already exists: {}",
                target.display()
            ))
        } else {
            CoreError::Io(err)
        }
    })?;

    dir::write_manifest(target, &state.manifest)?;
    let log = CommitLog::new(Box::new(FileBackend::create_new(&dir::log_path(target))?));
    log.append(&state.record, true)?;
    dir::sync_directory(target)
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.dir.as_ref().map(DatabaseDir::path))
            .field("last_sequence", &self.latest_sequence())
            .field("column_families", &self.column_families.read().len())
            .field("live_snapshots", &self.snapshots.len())
            .finish()
    }
}
