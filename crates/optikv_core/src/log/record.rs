//! Commit log records and their encoding.

use crate::error::{CoreError, CoreResult};
use crate::types::{ColumnFamilyId, SequenceNumber};

/// Magic bytes opening every framed record.
pub(crate) const LOG_MAGIC: [u8; 4] = *b"OKVL";

/// Current record format version.
pub(crate) const LOG_VERSION: u16 = 1;

/// Type byte of a batch record, the only record type so far.
pub(crate) const RECORD_BATCH: u8 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

const OP_DELETE: u8 = 0;
const OP_PUT: u8 = 1;

/// One write inside a batch. `value == None` is a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOp {
    /// Target column family.
    pub column_family: ColumnFamilyId,
    /// Key.
    pub key: Vec<u8>,
    /// New value, or `None` for a tombstone.
    pub value: Option<Vec<u8>>,
}

/// An atomically committed batch of writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Sequence assigned at commit.
    pub sequence: SequenceNumber,
    /// Writes in application order.
    pub ops: Vec<BatchOp>,
}

impl LogRecord {
    /// Encodes the payload (without framing).
    ///
    /// # Errors
    ///
    /// Fails if a key, value or the op count does not fit a `u32` length.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.sequence.as_u64().to_le_bytes());
        buf.extend_from_slice(&length_u32(self.ops.len(), "op count")?.to_le_bytes());

        for op in &self.ops {
            buf.extend_from_slice(&op.column_family.as_u32().to_le_bytes());
            buf.push(if op.value.is_some() { OP_PUT } else { OP_DELETE });
            buf.extend_from_slice(&length_u32(op.key.len(), "key")?.to_le_bytes());
            buf.extend_from_slice(&op.key);
            if let Some(value) = &op.value {
                buf.extend_from_slice(&length_u32(value.len(), "value")?.to_le_bytes());
                buf.extend_from_slice(value);
            }
        }

        Ok(buf)
    }

    /// Decodes a payload produced by [`LogRecord::encode_payload`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LogCorruption`] on truncated or trailing bytes.
    pub fn decode_payload(payload: &[u8]) -> CoreResult<Self> {
        let mut reader = PayloadReader { payload, cursor: 0 };

        let sequence = SequenceNumber::new(reader.u64()?);
        let count = reader.u32()? as usize;
        let mut ops = Vec::with_capacity(count.min(1024));

        for _ in 0..count {
            let column_family = ColumnFamilyId::new(reader.u32()?);
            let kind = reader.u8()?;
            let key_len = reader.u32()? as usize;
            let key = reader.bytes(key_len)?.to_vec();
            let value = match kind {
                OP_PUT => {
                    let len = reader.u32()? as usize;
                    Some(reader.bytes(len)?.to_vec())
                }
                OP_DELETE => None,
                other => {
                    return Err(CoreError::log_corruption(format!(
                        "unknown op kind {other}"
                    )))
                }
            };
            ops.push(BatchOp {
                column_family,
                key,
                value,
            });
        }

        if reader.cursor != payload.len() {
            return Err(CoreError::log_corruption(format!(
                "trailing bytes in batch record: decoded {} of {}",
                reader.cursor,
                payload.len()
            )));
        }

        Ok(Self { sequence, ops })
    }

    /// Encodes the record with its framing and checksum.
    ///
    /// # Errors
    ///
    /// Propagates payload encoding errors.
    pub fn encode_frame(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&LOG_MAGIC);
        frame.extend_from_slice(&LOG_VERSION.to_le_bytes());
        frame.push(RECORD_BATCH);
        frame.extend_from_slice(&length_u32(payload.len(), "record payload")?.to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }
}

fn length_u32(len: usize, what: &str) -> CoreResult<u32> {
    u32::try_from(len).map_err(|_| CoreError::invalid_argument(format!("{what} too large: {len} bytes")))
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    cursor: usize,
}

impl<'a> PayloadReader<'a> {
    fn bytes(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.payload.len())
            .ok_or_else(|| CoreError::log_corruption("unexpected end of payload"))?;
        let slice = &self.payload[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    fn u8(&mut self) -> CoreResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.bytes(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.bytes(8)?);
        Ok(u64::from_le_bytes(raw))
    }
}

/// Computes a CRC32 (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
