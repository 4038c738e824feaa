//! Database lifecycle, snapshots and direct reads and writes.

use crate::error::{check, save_error};
use crate::types::{
    OptiKvColumnFamilyHandle, OptiKvDb, OptiKvOptions, OptiKvReadOptions, OptiKvSnapshot,
    OptiKvTransactionDb, OptiKvWriteOptions,
};
use crate::view::OptiKvView;
use optikv_core::{OptimisticTransactionDb, Options};
use std::ffi::{c_char, CStr};
use std::ptr;
use std::sync::Arc;

/// Reads a NUL-terminated UTF-8 string argument.
pub(crate) unsafe fn c_str<'a>(
    value: *const c_char,
    what: &str,
    errptr: *mut *mut c_char,
) -> Option<&'a str> {
    if value.is_null() {
        save_error(errptr, &format!("invalid argument: {what} is null"));
        return None;
    }
    match CStr::from_ptr(value).to_str() {
        Ok(text) => Some(text),
        Err(_) => {
            save_error(errptr, &format!("invalid argument: {what} is not valid UTF-8"));
            None
        }
    }
}

/// Borrows `len` bytes at `data`; a zero length never dereferences `data`.
pub(crate) unsafe fn bytes<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if len == 0 {
        Some(&[])
    } else if data.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(data, len))
    }
}

pub(crate) unsafe fn null_argument(errptr: *mut *mut c_char, what: &str) {
    save_error(errptr, &format!("invalid argument: {what} is null"));
}

/// Opens (or creates) the database at `name`.
///
/// # Safety
///
/// `options` must be a live options handle, `name` a NUL-terminated string
/// and `errptr` as described in the crate docs.
#[no_mangle]
pub unsafe extern "C" fn optikv_optimistictransactiondb_open(
    options: *const OptiKvOptions,
    name: *const c_char,
    errptr: *mut *mut c_char,
) -> *mut OptiKvTransactionDb {
    let Some(options) = options.as_ref() else {
        null_argument(errptr, "options");
        return ptr::null_mut();
    };
    let Some(path) = c_str(name, "name", errptr) else {
        return ptr::null_mut();
    };
    match check(errptr, OptimisticTransactionDb::open(&options.inner, path)) {
        Some(db) => Box::into_raw(Box::new(OptiKvTransactionDb { db: Arc::new(db) })),
        None => ptr::null_mut(),
    }
}

/// Opens the database with `num_column_families` named column families.
///
/// On success one handle per name is written to `handles`, in input order.
/// `num_column_family_options` must equal `num_column_families`.
///
/// # Safety
///
/// `names` must point to `num_column_families` strings, `cf_options` to
/// `num_column_family_options` options handles, and `handles` to room for
/// `num_column_families` pointers.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn optikv_optimistictransactiondb_open_column_families(
    options: *const OptiKvOptions,
    name: *const c_char,
    num_column_families: usize,
    column_family_names: *const *const c_char,
    num_column_family_options: usize,
    column_family_options: *const *const OptiKvOptions,
    column_family_handles: *mut *mut OptiKvColumnFamilyHandle,
    errptr: *mut *mut c_char,
) -> *mut OptiKvTransactionDb {
    let Some(options) = options.as_ref() else {
        null_argument(errptr, "options");
        return ptr::null_mut();
    };
    let Some(path) = c_str(name, "name", errptr) else {
        return ptr::null_mut();
    };
    if num_column_families > 0 && (column_family_names.is_null() || column_family_handles.is_null())
    {
        null_argument(errptr, "column family names or handles");
        return ptr::null_mut();
    }
    if num_column_family_options > 0 && column_family_options.is_null() {
        null_argument(errptr, "column family options");
        return ptr::null_mut();
    }

    let mut names = Vec::with_capacity(num_column_families);
    for i in 0..num_column_families {
        let Some(cf_name) = c_str(*column_family_names.add(i), "column family name", errptr) else {
            return ptr::null_mut();
        };
        names.push(cf_name);
    }
    let mut cf_options: Vec<Options> = Vec::with_capacity(num_column_family_options);
    for i in 0..num_column_family_options {
        let Some(cf) = (*column_family_options.add(i)).as_ref() else {
            null_argument(errptr, "column family options");
            return ptr::null_mut();
        };
        cf_options.push(cf.inner.clone());
    }

    let opened = OptimisticTransactionDb::open_column_families(
        &options.inner,
        path,
        &names,
        &cf_options,
    );
    let Some((db, handles)) = check(errptr, opened) else {
        return ptr::null_mut();
    };
    for (i, handle) in handles.into_iter().enumerate() {
        *column_family_handles.add(i) =
            Box::into_raw(Box::new(OptiKvColumnFamilyHandle { inner: handle }));
    }
    Box::into_raw(Box::new(OptiKvTransactionDb { db: Arc::new(db) }))
}

/// Closes the database and releases the handle.
///
/// Outstanding transactions and base handles stay safe to destroy; their
/// operations fail from here on.
///
/// # Safety
///
/// `db` must be null or a live database handle, closed once.
#[no_mangle]
pub unsafe extern "C" fn optikv_optimistictransactiondb_close(db: *mut OptiKvTransactionDb) {
    if db.is_null() {
        return;
    }
    let handle = Box::from_raw(db);
    handle.db.close();
}

/// Returns the base database of `db`.
///
/// # Safety
///
/// `db` must be null or a live database handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_optimistictransactiondb_get_base_db(
    db: *mut OptiKvTransactionDb,
) -> *mut OptiKvDb {
    match db.as_ref() {
        Some(handle) => Box::into_raw(Box::new(OptiKvDb {
            db: Arc::clone(&handle.db),
        })),
        None => ptr::null_mut(),
    }
}

/// Releases a base database handle. The database itself stays open.
///
/// # Safety
///
/// `base` must be null or a handle returned by
/// [`optikv_optimistictransactiondb_get_base_db`], released once.
#[no_mangle]
pub unsafe extern "C" fn optikv_optimistictransactiondb_close_base_db(base: *mut OptiKvDb) {
    if !base.is_null() {
        drop(Box::from_raw(base));
    }
}

/// Takes a snapshot of the current committed state.
///
/// # Safety
///
/// `db` must be null or a live database handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_optimistictransactiondb_create_snapshot(
    db: *mut OptiKvTransactionDb,
) -> *mut OptiKvSnapshot {
    match db.as_ref() {
        Some(handle) => Box::into_raw(Box::new(OptiKvSnapshot {
            inner: handle.db.new_snapshot(),
        })),
        None => ptr::null_mut(),
    }
}

/// Releases a snapshot taken from `db`.
///
/// A snapshot passed with a null or foreign database is left untouched and
/// logged; it stays valid for a later release through its owner.
///
/// # Safety
///
/// `db` must be null or a live database handle and `snapshot` null or a
/// live snapshot handle, released once.
#[no_mangle]
pub unsafe extern "C" fn optikv_optimistictransactiondb_release_snapshot(
    db: *mut OptiKvTransactionDb,
    snapshot: *mut OptiKvSnapshot,
) {
    let Some(pending) = snapshot.as_ref() else {
        return;
    };
    let Some(handle) = db.as_ref() else {
        tracing::error!(
            snapshot = %pending.inner.id(),
            "snapshot released without a database; ignored"
        );
        return;
    };
    if pending.inner.owner() != handle.db.base_db().id() {
        tracing::error!(
            snapshot = %pending.inner.id(),
            "snapshot released through the wrong database; ignored"
        );
        return;
    }
    let mut snapshot = Box::from_raw(snapshot);
    handle.db.release_snapshot(&mut snapshot.inner);
}

/// Reads `key` through the base database.
///
/// # Safety
///
/// `db` and `options` must be live handles; `key` must point to `keylen`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn optikv_get(
    db: *mut OptiKvDb,
    options: *const OptiKvReadOptions,
    key: *const u8,
    keylen: usize,
    errptr: *mut *mut c_char,
) -> *mut OptiKvView {
    let (Some(handle), Some(options)) = (db.as_ref(), options.as_ref()) else {
        null_argument(errptr, "database or read options");
        return ptr::null_mut();
    };
    let Some(key) = bytes(key, keylen) else {
        null_argument(errptr, "key");
        return ptr::null_mut();
    };
    match check(errptr, handle.db.base_db().get(&options.inner, key)) {
        Some(view) => OptiKvView::into_raw(view),
        None => ptr::null_mut(),
    }
}

/// Reads `key` from a column family through the base database.
///
/// # Safety
///
/// As for [`optikv_get`]; `column_family` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn optikv_get_cf(
    db: *mut OptiKvDb,
    options: *const OptiKvReadOptions,
    column_family: *const OptiKvColumnFamilyHandle,
    key: *const u8,
    keylen: usize,
    errptr: *mut *mut c_char,
) -> *mut OptiKvView {
    let (Some(handle), Some(options), Some(cf)) =
        (db.as_ref(), options.as_ref(), column_family.as_ref())
    else {
        null_argument(errptr, "database, read options or column family");
        return ptr::null_mut();
    };
    let Some(key) = bytes(key, keylen) else {
        null_argument(errptr, "key");
        return ptr::null_mut();
    };
    match check(errptr, handle.db.base_db().get_cf(&options.inner, &cf.inner, key)) {
        Some(view) => OptiKvView::into_raw(view),
        None => ptr::null_mut(),
    }
}

/// Writes `key = value` through the base database.
///
/// # Safety
///
/// `db` and `options` must be live handles; `key` and `value` must point to
/// `keylen` and `vallen` bytes.
#[no_mangle]
pub unsafe extern "C" fn optikv_put(
    db: *mut OptiKvDb,
    options: *const OptiKvWriteOptions,
    key: *const u8,
    keylen: usize,
    value: *const u8,
    vallen: usize,
    errptr: *mut *mut c_char,
) {
    let (Some(handle), Some(options)) = (db.as_ref(), options.as_ref()) else {
        null_argument(errptr, "database or write options");
        return;
    };
    let (Some(key), Some(value)) = (bytes(key, keylen), bytes(value, vallen)) else {
        null_argument(errptr, "key or value");
        return;
    };
    check(errptr, handle.db.base_db().put(&options.inner, key, value));
}

/// Deletes `key` through the base database.
///
/// # Safety
///
/// As for [`optikv_get`].
#[no_mangle]
pub unsafe extern "C" fn optikv_delete(
    db: *mut OptiKvDb,
    options: *const OptiKvWriteOptions,
    key: *const u8,
    keylen: usize,
    errptr: *mut *mut c_char,
) {
    let (Some(handle), Some(options)) = (db.as_ref(), options.as_ref()) else {
        null_argument(errptr, "database or write options");
        return;
    };
    let Some(key) = bytes(key, keylen) else {
        null_argument(errptr, "key");
        return;
    };
    check(errptr, handle.db.base_db().delete(&options.inner, key));
}
