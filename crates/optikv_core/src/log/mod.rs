//! Commit log.
//!
//! Every committed batch is appended to `data.log` before it becomes
//! visible. Opening a database replays the log into the versioned tables.
//!
//! ## Record Format
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! ## Recovery Policy
//!
//! - A truncated header or payload at the tail is a torn write: the tail is
//!   cut off and replay stops cleanly there.
//! - Bad magic, an unknown version or type, and CRC mismatches are fatal:
//!   the open fails instead of silently dropping committed data.

mod record;
#[cfg(test)]
pub(crate) mod testing;
mod writer;

pub use record::{compute_crc32, BatchOp, LogRecord};
pub(crate) use writer::CommitLog;
