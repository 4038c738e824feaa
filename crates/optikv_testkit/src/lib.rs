//! # OptiKV Testkit
//!
//! Test utilities for OptiKV.
//!
//! This crate provides:
//! - Temporary database fixtures, file-backed or in memory
//! - Property-based test generators using proptest
//! - Concurrent stress helpers for optimistic transactions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use optikv_testkit::prelude::*;
//!
//! #[test]
//! fn counter_survives_reopen() {
//!     let db = TestDb::file();
//!     db.put(&WriteOptions::new(), b"k", b"v").unwrap();
//!     let db = db.reopen();
//!     assert_eq!(db.read(b"k"), Some(b"v".to_vec()));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use optikv_core::{
        OptimisticTransactionDb, OptimisticTransactionOptions, Options, ReadOptions,
        WriteOptions,
    };
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
