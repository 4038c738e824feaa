//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A byte store backed by one OS file.
///
/// `flush` hands buffered bytes to the OS, `sync` calls `File::sync_all`.
/// The file handle and the cached size share one mutex so an append and
/// a concurrent read never observe a half-updated size.
///
/// ```no_run
/// use optikv_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut log = FileBackend::open(Path::new("data.log")).unwrap();
/// log.append(b"record").unwrap();
/// log.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: Mutex<FileState>,
}

#[derive(Debug)]
struct FileState {
    file: File,
    size: u64,
}

impl FileBackend {
    /// Opens the file at `path`, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::from_file(path, file)
    }

    /// Creates a new file at `path`, failing if anything already exists there.
    ///
    /// Used when writing checkpoints, which must never clobber a live log.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] if the path exists.
    pub fn create_new(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    StorageError::AlreadyExists(path.display().to_string())
                }
                _ => StorageError::Io(e),
            })?;
        Self::from_file(path, file)
    }

    fn from_file(path: &Path, file: File) -> StorageResult<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(FileState { file, size }),
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut state = self.inner.lock();
        let size = state.size;
        if offset.saturating_add(len as u64) > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        let mut buffer = vec![0u8; len];
        if len > 0 {
            state.file.seek(SeekFrom::Start(offset))?;
            state.file.read_exact(&mut buffer)?;
        }
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let state = self.inner.get_mut();
        let offset = state.size;
        if !data.is_empty() {
            state.file.seek(SeekFrom::End(0))?;
            state.file.write_all(data)?;
            state.size += data.len() as u64;
        }
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.get_mut().file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.inner.get_mut().file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.inner.lock().size)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let state = self.inner.get_mut();
        if new_size > state.size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size: state.size,
            });
        }
        state.file.set_len(new_size)?;
        state.file.sync_all()?;
        state.size = new_size;
        Ok(())
    }
}
