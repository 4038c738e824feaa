//! Stress helpers for concurrent optimistic transactions.

use optikv_core::{
    CoreResult, OptimisticTransactionDb, OptimisticTransactionOptions, ReadOptions, WriteOptions,
};
use std::thread;
use std::time::{Duration, Instant};

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Increments each thread commits.
    pub increments_per_thread: usize,
    /// Number of distinct counter keys.
    pub counters: usize,
    /// Attempts per increment before giving up.
    pub max_attempts: usize,
    /// Whether transactions snapshot at begin.
    pub set_snapshot: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            increments_per_thread: 250,
            counters: 4,
            max_attempts: 1_000,
            set_snapshot: true,
        }
    }
}

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Increments that committed.
    pub committed: usize,
    /// Increments that gave up.
    pub failed: usize,
    /// Commit conflicts observed by the database during the run.
    pub conflicts: u64,
    /// Wall-clock duration.
    pub duration: Duration,
}

impl StressResult {
    /// Committed increments per second.
    pub fn commits_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.committed as f64 / secs
        } else {
            0.0
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Committed: {}", self.committed);
        println!("Failed: {}", self.failed);
        println!("Conflicts: {}", self.conflicts);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} commits/sec", self.commits_per_second());
    }
}

/// Key of counter `index`.
pub fn counter_key(index: usize) -> Vec<u8> {
    format!("counter:{index}").into_bytes()
}

/// Decodes a counter value; a missing counter is zero.
pub fn decode_counter(bytes: Option<&[u8]>) -> u64 {
    bytes
        .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
        .map_or(0, u64::from_le_bytes)
}

/// Reads counter `index` at the latest state.
pub fn read_counter(db: &OptimisticTransactionDb, index: usize) -> CoreResult<u64> {
    let view = db.get(&ReadOptions::new(), &counter_key(index))?;
    Ok(decode_counter(view.exists().then(|| view.data())))
}

/// Increments counter `index` in one transaction, retrying on conflicts.
pub fn increment_counter(
    db: &OptimisticTransactionDb,
    index: usize,
    txn_options: &OptimisticTransactionOptions,
    max_attempts: usize,
) -> CoreResult<u64> {
    let key = counter_key(index);
    db.transaction_with_retry(&WriteOptions::new(), txn_options, max_attempts, |txn| {
        let view = txn.get_for_update(&ReadOptions::new(), &key)?;
        let next = decode_counter(view.exists().then(|| view.data())) + 1;
        txn.put(&key, &next.to_le_bytes())?;
        Ok(next)
    })
}

/// Runs `threads` workers that each increment counters round-robin.
///
/// With correct conflict detection, the counters sum to `committed`.
pub fn stress_concurrent_increments(
    db: &OptimisticTransactionDb,
    config: &StressConfig,
) -> StressResult {
    let txn_options = OptimisticTransactionOptions::new().set_snapshot(config.set_snapshot);
    let conflicts_before = db.stats().conflicts;
    let start = Instant::now();

    let outcomes: Vec<(usize, usize)> = thread::scope(|scope| {
        let workers: Vec<_> = (0..config.threads)
            .map(|t| {
                scope.spawn(move || {
                    let mut committed = 0;
                    let mut failed = 0;
                    for i in 0..config.increments_per_thread {
                        let index = (t + i) % config.counters.max(1);
                        match increment_counter(db, index, &txn_options, config.max_attempts) {
                            Ok(_) => committed += 1,
                            Err(_) => failed += 1,
                        }
                    }
                    (committed, failed)
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("Thread panicked"))
            .collect()
    });

    StressResult {
        committed: outcomes.iter().map(|(c, _)| c).sum(),
        failed: outcomes.iter().map(|(_, f)| f).sum(),
        conflicts: db.stats().conflicts - conflicts_before,
        duration: start.elapsed(),
    }
}

/// Sums all counters of a stress run.
pub fn counters_total(db: &OptimisticTransactionDb, config: &StressConfig) -> CoreResult<u64> {
    (0..config.counters.max(1)).try_fold(0, |total, index| Ok(total + read_counter(db, index)?))
}
