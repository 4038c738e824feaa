//! Opaque handle types.
//!
//! C callers only ever see pointers to these structs; the fields are
//! private to the crate.

use optikv_core::{
    ColumnFamilyHandle, OptimisticTransactionDb, OptimisticTransactionOptions, Options,
    ReadOptions, Snapshot, Transaction, WriteOptions,
};
use std::sync::Arc;

/// Database or column family options.
pub struct OptiKvOptions {
    pub(crate) inner: Options,
}

/// Read options, optionally bound to a snapshot.
pub struct OptiKvReadOptions {
    pub(crate) inner: ReadOptions,
}

/// Write options.
pub struct OptiKvWriteOptions {
    pub(crate) inner: WriteOptions,
}

/// Optimistic transaction options.
pub struct OptiKvTransactionOptions {
    pub(crate) inner: OptimisticTransactionOptions,
}

/// An open optimistic transaction database.
pub struct OptiKvTransactionDb {
    pub(crate) db: Arc<OptimisticTransactionDb>,
}

/// The base database of an [`OptiKvTransactionDb`].
///
/// Shares the parent's allocation; once the parent is closed every call
/// through this handle fails with "database is closed".
pub struct OptiKvDb {
    pub(crate) db: Arc<OptimisticTransactionDb>,
}

/// A point-in-time snapshot.
pub struct OptiKvSnapshot {
    pub(crate) inner: Snapshot,
}

/// A column family handle returned by the open call.
pub struct OptiKvColumnFamilyHandle {
    pub(crate) inner: ColumnFamilyHandle,
}

/// An optimistic transaction.
///
/// `txn` borrows from `*db`; it is declared first so it drops before the
/// `Arc` that keeps the database alive.
pub struct OptiKvTransaction {
    pub(crate) txn: Option<Transaction<'static>>,
    pub(crate) db: Arc<OptimisticTransactionDb>,
}

macro_rules! options_lifecycle {
    ($handle:ident, $inner:ty, $create:ident, $destroy:ident) => {
        /// Creates the handle with default values.
        #[no_mangle]
        pub extern "C" fn $create() -> *mut $handle {
            Box::into_raw(Box::new($handle {
                inner: <$inner>::default(),
            }))
        }

        /// Destroys the handle.
        ///
        /// # Safety
        ///
        /// `handle` must be null or returned by the matching create call,
        /// and must not be used afterwards.
        #[no_mangle]
        pub unsafe extern "C" fn $destroy(handle: *mut $handle) {
            if !handle.is_null() {
                drop(Box::from_raw(handle));
            }
        }
    };
}

options_lifecycle!(OptiKvOptions, Options, optikv_options_create, optikv_options_destroy);
options_lifecycle!(
    OptiKvReadOptions,
    ReadOptions,
    optikv_readoptions_create,
    optikv_readoptions_destroy
);
options_lifecycle!(
    OptiKvWriteOptions,
    WriteOptions,
    optikv_writeoptions_create,
    optikv_writeoptions_destroy
);
options_lifecycle!(
    OptiKvTransactionOptions,
    OptimisticTransactionOptions,
    optikv_transaction_options_create,
    optikv_transaction_options_destroy
);

/// # Safety
///
/// `options` must be null or a live options handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_options_set_create_if_missing(options: *mut OptiKvOptions, value: u8) {
    if let Some(options) = options.as_mut() {
        options.inner.create_if_missing = value != 0;
    }
}

/// # Safety
///
/// `options` must be null or a live options handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_options_set_error_if_exists(options: *mut OptiKvOptions, value: u8) {
    if let Some(options) = options.as_mut() {
        options.inner.error_if_exists = value != 0;
    }
}

/// # Safety
///
/// `options` must be null or a live options handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_options_set_create_missing_column_families(
    options: *mut OptiKvOptions,
    value: u8,
) {
    if let Some(options) = options.as_mut() {
        options.inner.create_missing_column_families = value != 0;
    }
}

/// # Safety
///
/// `options` must be null or a live options handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_options_set_sync_on_commit(options: *mut OptiKvOptions, value: u8) {
    if let Some(options) = options.as_mut() {
        options.inner.sync_on_commit = value != 0;
    }
}

/// Sets the largest accepted value; 0 means unlimited.
///
/// # Safety
///
/// `options` must be null or a live options handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_options_set_max_value_size(options: *mut OptiKvOptions, limit: usize) {
    if let Some(options) = options.as_mut() {
        options.inner.max_value_size = (limit != 0).then_some(limit);
    }
}

/// Anchors reads to `snapshot`; a null snapshot clears the binding.
///
/// # Safety
///
/// `options` must be null or a live read options handle; `snapshot` must be
/// null or a live snapshot handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_readoptions_set_snapshot(
    options: *mut OptiKvReadOptions,
    snapshot: *const OptiKvSnapshot,
) {
    let Some(options) = options.as_mut() else {
        return;
    };
    match snapshot.as_ref() {
        Some(snapshot) => options.inner.set_snapshot(&snapshot.inner),
        None => options.inner.clear_snapshot(),
    }
}

/// # Safety
///
/// `options` must be null or a live write options handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_writeoptions_set_sync(options: *mut OptiKvWriteOptions, value: u8) {
    if let Some(options) = options.as_mut() {
        options.inner.sync = value != 0;
    }
}

/// # Safety
///
/// `options` must be null or a live write options handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_writeoptions_disable_wal(options: *mut OptiKvWriteOptions, value: u8) {
    if let Some(options) = options.as_mut() {
        options.inner.disable_wal = value != 0;
    }
}

/// # Safety
///
/// `options` must be null or a live transaction options handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_transaction_options_set_set_snapshot(
    options: *mut OptiKvTransactionOptions,
    value: u8,
) {
    if let Some(options) = options.as_mut() {
        options.inner.set_snapshot = value != 0;
    }
}

/// Destroys a column family handle.
///
/// # Safety
///
/// `handle` must be null or a handle returned by the open call, destroyed
/// once.
#[no_mangle]
pub unsafe extern "C" fn optikv_column_family_handle_destroy(handle: *mut OptiKvColumnFamilyHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_setters_write_through() {
        let options = optikv_options_create();
        unsafe {
            optikv_options_set_create_if_missing(options, 0);
            optikv_options_set_error_if_exists(options, 1);
            optikv_options_set_create_missing_column_families(options, 1);
            optikv_options_set_sync_on_commit(options, 1);
            optikv_options_set_max_value_size(options, 16);

            let inner = &(*options).inner;
            assert!(!inner.create_if_missing);
            assert!(inner.error_if_exists);
            assert!(inner.create_missing_column_families);
            assert!(inner.sync_on_commit);
            assert_eq!(inner.max_value_size, Some(16));

            optikv_options_set_max_value_size(options, 0);
            assert_eq!((*options).inner.max_value_size, None);
            optikv_options_destroy(options);
        }
    }

    #[test]
    fn write_and_transaction_options() {
        let write = optikv_writeoptions_create();
        let txn = optikv_transaction_options_create();
        unsafe {
            optikv_writeoptions_set_sync(write, 1);
            optikv_writeoptions_disable_wal(write, 1);
            optikv_transaction_options_set_set_snapshot(txn, 1);
            assert!((*write).inner.sync);
            assert!((*write).inner.disable_wal);
            assert!((*txn).inner.set_snapshot);
            optikv_writeoptions_destroy(write);
            optikv_transaction_options_destroy(txn);
        }
    }

    #[test]
    fn null_handles_are_ignored() {
        unsafe {
            optikv_options_set_create_if_missing(std::ptr::null_mut(), 1);
            optikv_readoptions_set_snapshot(std::ptr::null_mut(), std::ptr::null());
            optikv_options_destroy(std::ptr::null_mut());
            optikv_column_family_handle_destroy(std::ptr::null_mut());
        }
    }
}
