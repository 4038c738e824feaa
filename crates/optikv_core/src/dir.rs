//! Database directory management.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK        # advisory lock, one open handle per directory
//! ├─ MANIFEST    # column family registry
//! └─ data.log    # commit log
//! ```

use crate::error::{CoreError, CoreResult};
use crate::manifest::Manifest;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "MANIFEST";
const MANIFEST_TEMP: &str = "MANIFEST.tmp";
const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "data.log";

/// An open database directory holding the exclusive `LOCK`.
///
/// The lock is an `fs2` advisory lock, released when the value is dropped.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens (or creates) a database directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - the directory is missing and `create_if_missing` is false
    /// - the path is not a directory
    /// - another handle holds the lock ([`CoreError::DatabaseLocked`])
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_argument(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_argument(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the commit log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        log_path(&self.path)
    }

    /// Returns the path of the manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// True when neither a manifest nor a commit log exists yet.
    #[must_use]
    pub fn is_new_database(&self) -> bool {
        !self.manifest_path().exists() && !self.log_path().exists()
    }

    /// Loads the manifest. `None` for a directory that never had one.
    pub fn load_manifest(&self) -> CoreResult<Option<Manifest>> {
        let manifest_path = self.manifest_path();
        if !manifest_path.exists() {
            return Ok(None);
        }

        let mut data = Vec::new();
        File::open(&manifest_path)?.read_to_end(&mut data)?;
        if data.is_empty() {
            return Ok(None);
        }
        Manifest::decode(&data).map(Some)
    }

    /// Writes the manifest atomically.
    pub fn save_manifest(&self, manifest: &Manifest) -> CoreResult<()> {
        write_manifest(&self.path, manifest)
    }
}

/// Path of the commit log inside `dir`.
pub(crate) fn log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE)
}

/// Writes `MANIFEST` in `dir` with write-to-temp, fsync, rename, then a
/// directory fsync.
pub(crate) fn write_manifest(dir: &Path, manifest: &Manifest) -> CoreResult<()> {
    let encoded = manifest.encode()?;
    let temp_path = dir.join(MANIFEST_TEMP);

    let mut file = File::create(&temp_path)?;
    file.write_all(&encoded)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, dir.join(MANIFEST_FILE))?;
    sync_directory(dir)
}

#[cfg(unix)]
pub(crate) fn sync_directory(dir: &Path) -> CoreResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

// NTFS journals metadata; directories cannot be opened for fsync there.
#[cfg(not(unix))]
pub(crate) fn sync_directory(_dir: &Path) -> CoreResult<()> {
    Ok(())
}
