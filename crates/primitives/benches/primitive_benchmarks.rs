//! Collection Performance Benchmarks
//!
//! Measures the cost of each operation class against the in-memory store:
//! - list get: one path lookup
//! - list set: lookup + guarded mutate
//! - list len: full-document read
//! - set add: full read + scan + guarded append
//! - queue offer/poll: unguarded append, then lookup + guarded remove

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_primitives::{DocumentList, DocumentQueue, DocumentSet};
use strata_storage::InMemoryStore;

fn setup_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new())
}

/// Benchmark indexed reads and CAS-guarded writes on a list
fn bench_list_indexed(c: &mut Criterion) {
    let list = DocumentList::with_content("bench", setup_store(), 0..1000i64).unwrap();

    let mut group = c.benchmark_group("list");
    group.throughput(Throughput::Elements(1));

    let counter = AtomicU64::new(0);
    group.bench_function("get", |b| {
        b.iter(|| {
            let i = counter.fetch_add(1, Ordering::SeqCst) % 1000;
            list.get(i as usize).unwrap()
        })
    });

    group.bench_function("set", |b| {
        b.iter(|| {
            let i = counter.fetch_add(1, Ordering::SeqCst) % 1000;
            list.set(i as usize, i as i64).unwrap()
        })
    });
    group.finish();
}

/// Benchmark full-document reads at increasing sizes
fn bench_list_len(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_len");
    for size in [10i64, 100, 1000] {
        let list = DocumentList::with_content("bench", setup_store(), 0..size).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| list.len().unwrap())
        });
    }
    group.finish();
}

/// Benchmark set membership writes (scan + guarded append)
fn bench_set_add(c: &mut Criterion) {
    let set = DocumentSet::<u64, _>::open("bench", setup_store()).unwrap();

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    let counter = AtomicU64::new(0);
    group.bench_function("add", |b| {
        b.iter(|| {
            let i = counter.fetch_add(1, Ordering::SeqCst) % 500;
            set.add(i).unwrap()
        })
    });
    group.finish();
}

/// Benchmark queue offer followed by poll
fn bench_queue_round_trip(c: &mut Criterion) {
    let queue = DocumentQueue::<u64, _>::open("bench", setup_store()).unwrap();

    let mut group = c.benchmark_group("queue");
    group.throughput(Throughput::Elements(1));

    group.bench_function("offer_poll", |b| {
        b.iter(|| {
            queue.offer(1).unwrap();
            queue.poll().unwrap()
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_list_indexed,
    bench_list_len,
    bench_set_add,
    bench_queue_round_trip
);
criterion_main!(benches);
