//! Benchmark utilities.

use optikv_core::{OptimisticTransactionDb, Options, WriteOptions};
use rand::Rng;

/// Generate random value bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Fixed-width key for index `i`, so keys sort numerically.
pub fn key(i: usize) -> Vec<u8> {
    format!("key{i:010}").into_bytes()
}

/// Generate `count` key/value pairs with values of `value_size` bytes.
pub fn generate_pairs(count: usize, value_size: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..count).map(|i| (key(i), random_data(value_size))).collect()
}

/// Opens an in-memory database preloaded with `pairs`.
///
/// # Panics
///
/// Panics if the database cannot be opened or written.
pub fn preloaded_db(pairs: &[(Vec<u8>, Vec<u8>)]) -> OptimisticTransactionDb {
    let db = OptimisticTransactionDb::open_in_memory(&Options::default())
        .expect("open in-memory database");
    let write_options = WriteOptions::new();
    for (key, value) in pairs {
        db.put(&write_options, key, value).expect("preload write");
    }
    db
}

/// Picks a random index below `bound`.
pub fn random_index(bound: usize) -> usize {
    rand::thread_rng().gen_range(0..bound.max(1))
}
