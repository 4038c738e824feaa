//! Read path benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use optikv_bench::utils::{generate_pairs, key, preloaded_db, random_index};
use optikv_core::{OptimisticTransactionOptions, ReadOptions, WriteOptions};

/// Benchmark base-database point reads by value size.
fn bench_point_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let pairs = generate_pairs(1_000, size);
            let db = preloaded_db(&pairs);
            let ro = ReadOptions::new();

            b.iter(|| {
                let view = db.get(&ro, &key(random_index(pairs.len()))).unwrap();
                black_box(view.size());
            });
        });
    }
    group.finish();
}

/// Benchmark snapshot reads over keys with many versions pinned.
fn bench_snapshot_get(c: &mut Criterion) {
    let pairs = generate_pairs(100, 64);
    let db = preloaded_db(&pairs);
    let snapshot = db.new_snapshot();
    let wo = WriteOptions::new();
    for (k, _) in &pairs {
        for round in 0..10u8 {
            db.put(&wo, k, &[round]).unwrap();
        }
    }
    let ro = ReadOptions::new().snapshot(&snapshot);

    c.bench_function("get_at_snapshot", |b| {
        b.iter(|| {
            let view = db.get(&ro, &key(random_index(pairs.len()))).unwrap();
            black_box(view.exists());
        });
    });

    let mut snapshot = snapshot;
    db.release_snapshot(&mut snapshot);
}

/// Benchmark transactional reads, which also track keys.
fn bench_transaction_get(c: &mut Criterion) {
    let pairs = generate_pairs(1_000, 64);
    let db = preloaded_db(&pairs);
    let ro = ReadOptions::new();
    let wo = WriteOptions::new();
    let to = OptimisticTransactionOptions::new();

    c.bench_function("txn_get_100", |b| {
        b.iter(|| {
            let mut txn = db.transaction_begin(&wo, &to, None);
            for i in 0..100 {
                black_box(txn.get(&ro, &key(i)).unwrap().exists());
            }
            txn.rollback().unwrap();
        });
    });
}

/// Benchmark multi_get by batch size.
fn bench_multi_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_get");
    let pairs = generate_pairs(1_000, 64);
    let db = preloaded_db(&pairs);
    let ro = ReadOptions::new();

    for batch in [10usize, 100].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, &batch| {
            let keys: Vec<Vec<u8>> = (0..batch).map(key).collect();
            b.iter(|| {
                let views = db.multi_get(&ro, keys.iter()).unwrap();
                black_box(views.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_point_get,
    bench_snapshot_get,
    bench_transaction_get,
    bench_multi_get,
);
criterion_main!(benches);
