//! Test fixtures and database helpers.

use optikv_core::{CoreResult, OptimisticTransactionDb, Options, ReadOptions};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

/// Installs a `tracing` subscriber for tests, once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Output goes
/// through the test writer so it is captured per test.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A test database with automatic cleanup.
pub struct TestDb {
    /// The database instance.
    pub db: OptimisticTransactionDb,
    options: Options,
    path: Option<PathBuf>,
    /// Kept alive so the directory outlives the database.
    _temp_dir: Option<TempDir>,
}

impl TestDb {
    /// Creates an in-memory test database.
    pub fn memory() -> Self {
        init_tracing();
        let options = Options::default();
        Self {
            db: OptimisticTransactionDb::open_in_memory(&options)
                .expect("failed to open in-memory database"),
            options,
            path: None,
            _temp_dir: None,
        }
    }

    /// Creates a database in a fresh temporary directory.
    pub fn file() -> Self {
        Self::file_with(Options::default())
    }

    /// Creates a database in a fresh temporary directory with `options`.
    pub fn file_with(options: Options) -> Self {
        init_tracing();
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("db");
        let db = OptimisticTransactionDb::open(&options, &path).expect("failed to open database");
        Self {
            db,
            options,
            path: Some(path),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Closes the database and opens it again from the same directory.
    ///
    /// # Panics
    ///
    /// Panics for an in-memory database or if the reopen fails.
    pub fn reopen(self) -> Self {
        let path = self.path.clone().expect("in-memory databases cannot be reopened");
        self.db.close();
        let db = OptimisticTransactionDb::open(&self.options, &path)
            .expect("failed to reopen database");
        Self { db, ..self }
    }

    /// Closes the database and hands back the directory guard and path.
    ///
    /// Lets a test tamper with the files before reopening them with
    /// [`open_at`].
    pub fn close_keep_files(self) -> (TempDir, PathBuf) {
        self.db.close();
        let temp_dir = self._temp_dir.expect("in-memory databases have no files");
        let path = self.path.expect("in-memory databases have no files");
        (temp_dir, path)
    }

    /// Reads `key` from the default column family at the latest state.
    pub fn read(&self, key: &[u8]) -> Option<Vec<u8>> {
        read_latest(&self.db, key).expect("read failed")
    }
}

impl std::ops::Deref for TestDb {
    type Target = OptimisticTransactionDb;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Opens the database at `path` with default options.
pub fn open_at(path: &Path) -> CoreResult<OptimisticTransactionDb> {
    OptimisticTransactionDb::open(&Options::default().create_if_missing(false), path)
}

/// Reads `key` from the default column family at the latest state.
pub fn read_latest(db: &OptimisticTransactionDb, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
    Ok(db.get(&ReadOptions::new(), key)?.into_vec())
}

/// Runs a test with a temporary in-memory database.
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&OptimisticTransactionDb) -> R,
{
    let db = TestDb::memory();
    f(&db)
}

/// Runs a test with a database in a temporary directory.
pub fn with_temp_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&OptimisticTransactionDb) -> R,
{
    let db = TestDb::file();
    f(&db)
}
