//! Commit log appends and recovery.

use crate::error::{CoreError, CoreResult};
use crate::log::record::{
    compute_crc32, LogRecord, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION, RECORD_BATCH,
};
use optikv_storage::StorageBackend;
use parking_lot::Mutex;

/// Append-only commit log over a storage backend.
pub(crate) struct CommitLog {
    backend: Mutex<Box<dyn StorageBackend>>,
}

/// Outcome of replaying a log.
#[derive(Debug, Default)]
pub(crate) struct Replay {
    /// Decoded records in log order.
    pub(crate) records: Vec<LogRecord>,
    /// Bytes cut off the tail because the last record was incomplete.
    pub(crate) truncated_bytes: u64,
}

impl CommitLog {
    pub(crate) fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Appends a framed record. With `sync` the record is on durable media
    /// when this returns; otherwise it is only flushed.
    ///
    /// Returns the offset of the record. On failure the log is cut back to
    /// where it was before the call, so a failed record is never replayed.
    pub(crate) fn append(&self, record: &LogRecord, sync: bool) -> CoreResult<u64> {
        let frame = record.encode_frame()?;
        let mut backend = self.backend.lock();
        let start = backend.size()?;

        let written = backend.append(&frame).and_then(|offset| {
            if sync {
                backend.sync()?;
            } else {
                backend.flush()?;
            }
            Ok(offset)
        });

        match written {
            Ok(offset) => Ok(offset),
            Err(err) => {
                if let Err(rollback) = backend.truncate(start) {
                    tracing::error!(
                        offset = start,
                        error = %rollback,
                        "failed to cut back commit log after a failed append"
                    );
                }
                Err(err.into())
            }
        }
    }

    pub(crate) fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Reads every record, cutting off a torn tail.
    ///
    /// # Errors
    ///
    /// Bad magic, unknown version or type, and checksum mismatches are
    /// returned as errors; they are never treated as a clean end of log.
    pub(crate) fn replay(&self) -> CoreResult<Replay> {
        let mut backend = self.backend.lock();
        let data = backend.read_all()?;
        let mut replay = Replay::default();
        let mut offset = 0usize;

        while offset < data.len() {
            let remaining = &data[offset..];
            if remaining.len() < HEADER_SIZE {
                break;
            }

            if remaining[..4] != LOG_MAGIC {
                return Err(CoreError::log_corruption(format!(
                    "bad record magic at offset {offset}"
                )));
            }
            let version = u16::from_le_bytes([remaining[4], remaining[5]]);
            if version != LOG_VERSION {
                return Err(CoreError::log_corruption(format!(
                    "unsupported record version {version} at offset {offset}"
                )));
            }
            let record_type = remaining[6];
            if record_type != RECORD_BATCH {
                return Err(CoreError::log_corruption(format!(
                    "unknown record type {record_type} at offset {offset}"
                )));
            }
            let len = u32::from_le_bytes([remaining[7], remaining[8], remaining[9], remaining[10]])
                as usize;

            let total = HEADER_SIZE + len + CRC_SIZE;
            if remaining.len() < total {
                break;
            }

            let body = &remaining[..HEADER_SIZE + len];
            let mut stored = [0u8; CRC_SIZE];
            stored.copy_from_slice(&remaining[HEADER_SIZE + len..total]);
            let expected = u32::from_le_bytes(stored);
            let actual = compute_crc32(body);
            if expected != actual {
                return Err(CoreError::ChecksumMismatch { expected, actual });
            }

            replay
                .records
                .push(LogRecord::decode_payload(&body[HEADER_SIZE..])?);
            offset += total;
        }

        if offset < data.len() {
            replay.truncated_bytes = (data.len() - offset) as u64;
            tracing::warn!(
                offset,
                bytes = replay.truncated_bytes,
                "commit log ends in a torn record; truncating"
            );
            backend.truncate(offset as u64)?;
            backend.sync()?;
        }

        Ok(replay)
    }
}
