//! Physical copies of an open database.

use crate::database::Database;
use crate::engine;
use crate::error::CoreResult;
use std::path::Path;

/// Creates openable copies of a database.
///
/// Obtained from `new_checkpoint`. The copy holds the latest committed
/// value of every key in every column family, as one compacted log batch.
#[derive(Debug)]
pub struct Checkpoint<'db> {
    db: &'db Database,
}

impl<'db> Checkpoint<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Writes the checkpoint into `dir`, which must not exist yet.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArgument`](crate::CoreError::InvalidArgument) if
    /// `dir` exists, [`CoreError::DatabaseClosed`](crate::CoreError::DatabaseClosed)
    /// if the database was closed, or an I/O error.
    pub fn create_checkpoint(&self, dir: impl AsRef<Path>) -> CoreResult<()> {
        let dir = dir.as_ref();
        let state = self.db.with_engine(|engine| Ok(engine.checkpoint_state()))?;
        engine::write_checkpoint(dir, &state)?;
        self.db.stats_handle().record_checkpoint();
        tracing::debug!(
            database = %self.db.id(),
            target = %dir.display(),
            sequence = %state.record.sequence,
            keys = state.record.ops.len(),
            "checkpoint created"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Options, ReadOptions, WriteOptions};
    use crate::error::CoreError;
    use tempfile::tempdir;

    #[test]
    fn checkpoint_opens_with_data_as_of_creation() {
        let temp = tempdir().unwrap();
        let options = Options::default();
        let (db, handles) =
            Database::open_column_families(&options, temp.path().join("src"), &["events"], &[options.clone()])
                .unwrap();

        db.put(&WriteOptions::default(), b"k", b"1").unwrap();
        db.put_cf(&WriteOptions::default(), &handles[0], b"e", b"event").unwrap();
        db.put(&WriteOptions::default(), b"gone", b"x").unwrap();
        db.delete(&WriteOptions::default(), b"gone").unwrap();

        let target = temp.path().join("copy");
        db.new_checkpoint().unwrap().create_checkpoint(&target).unwrap();
        db.put(&WriteOptions::default(), b"k", b"2").unwrap();

        let (copy, copy_handles) =
            Database::open_column_families(&options, &target, &["events"], &[options.clone()]).unwrap();
        let ro = ReadOptions::default();
        assert_eq!(copy.get(&ro, b"k").unwrap().data(), b"1");
        assert!(!copy.get(&ro, b"gone").unwrap().exists());
        assert_eq!(copy.get_cf(&ro, &copy_handles[0], b"e").unwrap().data(), b"event");
        assert_eq!(db.stats().checkpoints, 1);
    }

    #[test]
    fn existing_directory_is_rejected() {
        let temp = tempdir().unwrap();
        let db = Database::open_in_memory(&Options::default()).unwrap();
        let result = db.new_checkpoint().unwrap().create_checkpoint(temp.path());
        assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));
    }

    #[test]
    fn in_memory_database_can_be_checkpointed() {
        let temp = tempdir().unwrap();
        let db = Database::open_in_memory(&Options::default()).unwrap();
        db.put(&WriteOptions::default(), b"k", b"v").unwrap();

        let target = temp.path().join("snap");
        db.new_checkpoint().unwrap().create_checkpoint(&target).unwrap();

        let copy = Database::open(&Options::default(), &target).unwrap();
        assert_eq!(copy.get(&ReadOptions::default(), b"k").unwrap().data(), b"v");
        assert_eq!(copy.latest_sequence().unwrap(), db.latest_sequence().unwrap());
    }

    #[test]
    fn closed_database_cannot_checkpoint() {
        let db = Database::open_in_memory(&Options::default()).unwrap();
        db.close();
        assert!(matches!(db.new_checkpoint(), Err(CoreError::DatabaseClosed)));
    }
}
