//! # OptiKV Storage
//!
//! Byte-store backends underneath the OptiKV engine.
//!
//! A backend is an append-only sequence of bytes with positional reads.
//! It knows nothing about commit logs, column families or transactions;
//! the engine in `optikv_core` owns every format decision.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral, used by in-memory databases and tests
//! - [`FileBackend`] - persistent, one OS file per backend
//!
//! ## Example
//!
//! ```rust
//! use optikv_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"batch-1").unwrap();
//! assert_eq!(backend.read_at(offset, 7).unwrap(), b"batch-1");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
