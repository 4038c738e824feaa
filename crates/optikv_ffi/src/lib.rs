//! # OptiKV FFI
//!
//! C ABI over `optikv_core`.
//!
//! ## Conventions
//!
//! - Every handle is an opaque pointer created by an `optikv_*_create`,
//!   `_open` or `_begin` function and released by the matching `_destroy`,
//!   `_close` or `_release` function.
//! - Fallible functions take `char** errptr`. On failure `*errptr` is set to
//!   a heap string (free it with [`optikv_free`]) and the function returns
//!   null. A previous message in `*errptr` is freed first, so pass a pointer
//!   to null or to an earlier error.
//! - Reads return an [`OptiKvView`]: query it with `optikv_view_exists` and
//!   `optikv_view_value`, release it with `optikv_view_destroy`.
//! - Transactions keep their database allocation alive, so destroying a
//!   transaction after closing its database is safe; every other call on it
//!   then reports "database is closed".

#![warn(missing_docs)]

mod database;
mod error;
mod transaction;
mod types;
mod view;

pub use database::*;
pub use error::optikv_free;
pub use transaction::*;
pub use types::*;
pub use view::*;
