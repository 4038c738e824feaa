//! Optimistic transactions.

use crate::database::{bytes, null_argument};
use crate::error::{check, save_error};
use crate::types::{
    OptiKvColumnFamilyHandle, OptiKvReadOptions, OptiKvTransaction, OptiKvTransactionDb,
    OptiKvTransactionOptions, OptiKvWriteOptions,
};
use crate::view::OptiKvView;
use optikv_core::{OptimisticTransactionDb, Transaction};
use std::ffi::c_char;
use std::ptr;
use std::sync::Arc;

/// Extends the database borrow to `'static`.
///
/// # Safety
///
/// The returned reference must only be stored in an [`OptiKvTransaction`]
/// that also holds a clone of `db`; the field order there drops the
/// transaction before the `Arc`.
unsafe fn extend(db: &Arc<OptimisticTransactionDb>) -> &'static OptimisticTransactionDb {
    &*Arc::as_ptr(db)
}

/// Begins a transaction.
///
/// When `old_txn` belongs to `db` it is reset and returned instead of a new
/// allocation; an active `old_txn` is rolled back first. An `old_txn` from
/// another database is destroyed and a new handle is returned.
///
/// # Safety
///
/// `db`, `write_options` and `txn_options` must be live handles; `old_txn`
/// must be null or a live transaction handle that the caller no longer uses
/// except through the return value.
#[no_mangle]
pub unsafe extern "C" fn optikv_transaction_begin(
    db: *mut OptiKvTransactionDb,
    write_options: *const OptiKvWriteOptions,
    txn_options: *const OptiKvTransactionOptions,
    old_txn: *mut OptiKvTransaction,
) -> *mut OptiKvTransaction {
    let (Some(handle), Some(write_options), Some(txn_options)) =
        (db.as_ref(), write_options.as_ref(), txn_options.as_ref())
    else {
        return ptr::null_mut();
    };
    let database = extend(&handle.db);

    if let Some(old) = old_txn.as_mut() {
        if Arc::ptr_eq(&old.db, &handle.db) {
            let previous = old.txn.take();
            old.txn = Some(database.transaction_begin(
                &write_options.inner,
                &txn_options.inner,
                previous,
            ));
            return old_txn;
        }
        tracing::warn!("old transaction belongs to another database; destroying it");
        drop(Box::from_raw(old_txn));
    }

    let txn: Transaction<'static> =
        database.transaction_begin(&write_options.inner, &txn_options.inner, None);
    Box::into_raw(Box::new(OptiKvTransaction {
        txn: Some(txn),
        db: Arc::clone(&handle.db),
    }))
}

unsafe fn transaction<'a>(
    txn: *mut OptiKvTransaction,
    errptr: *mut *mut c_char,
) -> Option<&'a mut Transaction<'static>> {
    let found = txn.as_mut().and_then(|handle| handle.txn.as_mut());
    if found.is_none() {
        null_argument(errptr, "transaction");
    }
    found
}

/// Reads `key` inside the transaction, tracking it for conflict detection.
///
/// # Safety
///
/// `txn` and `options` must be live handles; `key` must point to `keylen`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn optikv_transaction_get(
    txn: *mut OptiKvTransaction,
    options: *const OptiKvReadOptions,
    key: *const u8,
    keylen: usize,
    errptr: *mut *mut c_char,
) -> *mut OptiKvView {
    let Some(txn) = transaction(txn, errptr) else {
        return ptr::null_mut();
    };
    let (Some(options), Some(key)) = (options.as_ref(), bytes(key, keylen)) else {
        null_argument(errptr, "read options or key");
        return ptr::null_mut();
    };
    match check(errptr, txn.get(&options.inner, key)) {
        Some(view) => OptiKvView::into_raw(view),
        None => ptr::null_mut(),
    }
}

/// Reads `key` from a column family inside the transaction.
///
/// # Safety
///
/// As for [`optikv_transaction_get`]; `column_family` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_transaction_get_cf(
    txn: *mut OptiKvTransaction,
    options: *const OptiKvReadOptions,
    column_family: *const OptiKvColumnFamilyHandle,
    key: *const u8,
    keylen: usize,
    errptr: *mut *mut c_char,
) -> *mut OptiKvView {
    let Some(txn) = transaction(txn, errptr) else {
        return ptr::null_mut();
    };
    let (Some(options), Some(cf), Some(key)) =
        (options.as_ref(), column_family.as_ref(), bytes(key, keylen))
    else {
        null_argument(errptr, "read options, column family or key");
        return ptr::null_mut();
    };
    match check(errptr, txn.get_cf(&options.inner, &cf.inner, key)) {
        Some(view) => OptiKvView::into_raw(view),
        None => ptr::null_mut(),
    }
}

/// Buffers `key = value` in the transaction.
///
/// # Safety
///
/// `txn` must be a live handle; `key` and `value` must point to `keylen`
/// and `vallen` bytes.
#[no_mangle]
pub unsafe extern "C" fn optikv_transaction_put(
    txn: *mut OptiKvTransaction,
    key: *const u8,
    keylen: usize,
    value: *const u8,
    vallen: usize,
    errptr: *mut *mut c_char,
) {
    let Some(txn) = transaction(txn, errptr) else {
        return;
    };
    let (Some(key), Some(value)) = (bytes(key, keylen), bytes(value, vallen)) else {
        null_argument(errptr, "key or value");
        return;
    };
    check(errptr, txn.put(key, value));
}

/// Buffers `key = value` for a column family in the transaction.
///
/// # Safety
///
/// As for [`optikv_transaction_put`]; `column_family` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_transaction_put_cf(
    txn: *mut OptiKvTransaction,
    column_family: *const OptiKvColumnFamilyHandle,
    key: *const u8,
    keylen: usize,
    value: *const u8,
    vallen: usize,
    errptr: *mut *mut c_char,
) {
    let Some(txn) = transaction(txn, errptr) else {
        return;
    };
    let (Some(cf), Some(key), Some(value)) =
        (column_family.as_ref(), bytes(key, keylen), bytes(value, vallen))
    else {
        null_argument(errptr, "column family, key or value");
        return;
    };
    check(errptr, txn.put_cf(&cf.inner, key, value));
}

/// Buffers a delete of `key` in the transaction.
///
/// # Safety
///
/// `txn` must be a live handle; `key` must point to `keylen` bytes.
#[no_mangle]
pub unsafe extern "C" fn optikv_transaction_delete(
    txn: *mut OptiKvTransaction,
    key: *const u8,
    keylen: usize,
    errptr: *mut *mut c_char,
) {
    let Some(txn) = transaction(txn, errptr) else {
        return;
    };
    let Some(key) = bytes(key, keylen) else {
        null_argument(errptr, "key");
        return;
    };
    check(errptr, txn.delete(key));
}

/// Buffers a delete of `key` in a column family.
///
/// # Safety
///
/// As for [`optikv_transaction_delete`]; `column_family` must be a live
/// handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_transaction_delete_cf(
    txn: *mut OptiKvTransaction,
    column_family: *const OptiKvColumnFamilyHandle,
    key: *const u8,
    keylen: usize,
    errptr: *mut *mut c_char,
) {
    let Some(txn) = transaction(txn, errptr) else {
        return;
    };
    let (Some(cf), Some(key)) = (column_family.as_ref(), bytes(key, keylen)) else {
        null_argument(errptr, "column family or key");
        return;
    };
    check(errptr, txn.delete_cf(&cf.inner, key));
}

/// Commits the transaction.
///
/// A conflict sets `*errptr` to a message starting with "commit conflict";
/// the transaction is aborted either way on failure.
///
/// # Safety
///
/// `txn` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_transaction_commit(
    txn: *mut OptiKvTransaction,
    errptr: *mut *mut c_char,
) {
    if let Some(txn) = transaction(txn, errptr) {
        check(errptr, txn.commit());
    }
}

/// Discards the transaction's buffered writes.
///
/// # Safety
///
/// `txn` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_transaction_rollback(
    txn: *mut OptiKvTransaction,
    errptr: *mut *mut c_char,
) {
    if let Some(txn) = transaction(txn, errptr) {
        if let Err(err) = txn.rollback() {
            save_error(errptr, &err.to_string());
        }
    }
}

/// Destroys the transaction, rolling it back if still active.
///
/// # Safety
///
/// `txn` must be null or a live handle, destroyed once.
#[no_mangle]
pub unsafe extern "C" fn optikv_transaction_destroy(txn: *mut OptiKvTransaction) {
    if !txn.is_null() {
        drop(Box::from_raw(txn));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::{error_text, read_value};
    use crate::database::*;
    use crate::types::*;
    use std::ffi::CString;

    struct Fixture {
        _dir: tempfile::TempDir,
        options: *mut OptiKvOptions,
        db: *mut OptiKvTransactionDb,
        base: *mut OptiKvDb,
        ropts: *mut OptiKvReadOptions,
        wopts: *mut OptiKvWriteOptions,
        topts: *mut OptiKvTransactionOptions,
    }

    impl Fixture {
        fn open() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = CString::new(dir.path().join("db").to_str().unwrap()).unwrap();
            let mut err: *mut c_char = ptr::null_mut();
            unsafe {
                let options = optikv_options_create();
                let db = optikv_optimistictransactiondb_open(options, path.as_ptr(), &mut err);
                assert!(err.is_null());
                Self {
                    _dir: dir,
                    options,
                    db,
                    base: optikv_optimistictransactiondb_get_base_db(db),
                    ropts: optikv_readoptions_create(),
                    wopts: optikv_writeoptions_create(),
                    topts: optikv_transaction_options_create(),
                }
            }
        }

        fn begin(&self) -> *mut OptiKvTransaction {
            unsafe { optikv_transaction_begin(self.db, self.wopts, self.topts, ptr::null_mut()) }
        }

        fn read(&self, key: &[u8]) -> Option<Vec<u8>> {
            let mut err: *mut c_char = ptr::null_mut();
            unsafe {
                let view = optikv_get(self.base, self.ropts, key.as_ptr(), key.len(), &mut err);
                assert!(err.is_null());
                read_value(view)
            }
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            unsafe {
                optikv_optimistictransactiondb_close_base_db(self.base);
                optikv_optimistictransactiondb_close(self.db);
                optikv_transaction_options_destroy(self.topts);
                optikv_writeoptions_destroy(self.wopts);
                optikv_readoptions_destroy(self.ropts);
                optikv_options_destroy(self.options);
            }
        }
    }

    #[test]
    fn conflicting_commit_reports_error() {
        let fx = Fixture::open();
        let mut err: *mut c_char = ptr::null_mut();
        unsafe {
            let txn1 = fx.begin();
            let txn2 = fx.begin();
            optikv_transaction_put(txn1, b"k".as_ptr(), 1, b"1".as_ptr(), 1, &mut err);
            optikv_transaction_put(txn2, b"k".as_ptr(), 1, b"2".as_ptr(), 1, &mut err);
            assert!(err.is_null());

            optikv_transaction_commit(txn1, &mut err);
            assert!(err.is_null());
            optikv_transaction_commit(txn2, &mut err);
            assert!(error_text(err).starts_with("commit conflict"));

            optikv_transaction_destroy(txn1);
            optikv_transaction_destroy(txn2);
        }
        assert_eq!(fx.read(b"k"), Some(b"1".to_vec()));
    }

    #[test]
    fn read_your_own_writes() {
        let fx = Fixture::open();
        let mut err: *mut c_char = ptr::null_mut();
        unsafe {
            let txn = fx.begin();
            optikv_transaction_put(txn, b"k".as_ptr(), 1, b"v".as_ptr(), 1, &mut err);
            let view = optikv_transaction_get(txn, fx.ropts, b"k".as_ptr(), 1, &mut err);
            assert_eq!(read_value(view), Some(b"v".to_vec()));
            assert_eq!(fx.read(b"k"), None);

            optikv_transaction_delete(txn, b"k".as_ptr(), 1, &mut err);
            let view = optikv_transaction_get(txn, fx.ropts, b"k".as_ptr(), 1, &mut err);
            assert_eq!(read_value(view), None);
            assert!(err.is_null());
            optikv_transaction_destroy(txn);
        }
    }

    #[test]
    fn begin_reuses_old_transaction() {
        let fx = Fixture::open();
        let mut err: *mut c_char = ptr::null_mut();
        unsafe {
            let txn = fx.begin();
            optikv_transaction_put(txn, b"k".as_ptr(), 1, b"1".as_ptr(), 1, &mut err);
            optikv_transaction_commit(txn, &mut err);
            assert!(err.is_null());

            let reused = optikv_transaction_begin(fx.db, fx.wopts, fx.topts, txn);
            assert_eq!(reused, txn);
            optikv_transaction_put(reused, b"k".as_ptr(), 1, b"2".as_ptr(), 1, &mut err);
            optikv_transaction_commit(reused, &mut err);
            assert!(err.is_null());
            optikv_transaction_destroy(reused);
        }
        assert_eq!(fx.read(b"k"), Some(b"2".to_vec()));
    }

    #[test]
    fn begin_with_foreign_old_transaction_allocates() {
        let a = Fixture::open();
        let b = Fixture::open();
        unsafe {
            let foreign = a.begin();
            let txn = optikv_transaction_begin(b.db, b.wopts, b.topts, foreign);
            assert!(!txn.is_null());
            assert!(Arc::ptr_eq(&(*txn).db, &(*b.db).db));
            optikv_transaction_destroy(txn);
        }
    }

    #[test]
    fn rollback_discards_and_second_rollback_fails() {
        let fx = Fixture::open();
        let mut err: *mut c_char = ptr::null_mut();
        unsafe {
            let txn = fx.begin();
            optikv_transaction_put(txn, b"k".as_ptr(), 1, b"v".as_ptr(), 1, &mut err);
            optikv_transaction_rollback(txn, &mut err);
            assert!(err.is_null());
            optikv_transaction_rollback(txn, &mut err);
            assert!(error_text(err).starts_with("invalid operation"));
            optikv_transaction_destroy(txn);
        }
        assert_eq!(fx.read(b"k"), None);
    }

    #[test]
    fn transaction_outlives_closed_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = CString::new(dir.path().join("db").to_str().unwrap()).unwrap();
        let mut err: *mut c_char = ptr::null_mut();
        unsafe {
            let options = optikv_options_create();
            let wopts = optikv_writeoptions_create();
            let topts = optikv_transaction_options_create();
            let db = optikv_optimistictransactiondb_open(options, path.as_ptr(), &mut err);
            let txn = optikv_transaction_begin(db, wopts, topts, ptr::null_mut());
            optikv_optimistictransactiondb_close(db);

            optikv_transaction_put(txn, b"k".as_ptr(), 1, b"v".as_ptr(), 1, &mut err);
            optikv_transaction_commit(txn, &mut err);
            assert_eq!(error_text(err), "database is closed");
            optikv_transaction_destroy(txn);

            optikv_transaction_options_destroy(topts);
            optikv_writeoptions_destroy(wopts);
            optikv_options_destroy(options);
        }
    }

    #[test]
    fn null_transaction_reports_error() {
        let mut err: *mut c_char = ptr::null_mut();
        unsafe {
            optikv_transaction_commit(ptr::null_mut(), &mut err);
            assert!(error_text(err).contains("transaction is null"));
        }
    }
}
