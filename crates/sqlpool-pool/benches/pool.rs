//! Acquire/release throughput benchmarks.

#![allow(clippy::unwrap_used)]

use std::hint::black_box;
use std::thread;

use criterion::{Criterion, criterion_group, criterion_main};
use sqlpool_client::ConnectionConfig;
use sqlpool_pool::{BoxError, ConnectionPool, Pool, connection_factory};
use sqlpool_testing::MockDriver;

fn bench_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire_release");

    let pool = Pool::new(4, || Ok::<_, BoxError>(0u64)).unwrap();
    group.bench_function("uncontended", |b| {
        b.iter(|| {
            let conn = pool.acquire().unwrap();
            black_box(*conn);
        });
    });

    group.bench_function("shared_alias", |b| {
        b.iter(|| {
            let alias = pool.acquire().unwrap().into_shared();
            let copy = alias.clone();
            black_box(*copy);
        });
    });

    group.bench_function("contended_4_threads", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(|| {
                        for _ in 0..64 {
                            black_box(*pool.acquire().unwrap());
                        }
                    });
                }
            });
        });
    });

    group.finish();
}

fn bench_cached_prepare(c: &mut Criterion) {
    let driver = MockDriver::new();
    let pool: ConnectionPool<MockDriver> = Pool::new(
        1,
        connection_factory(driver, ":memory:", ConnectionConfig::new()),
    )
    .unwrap();
    let conn = pool.acquire().unwrap();

    c.bench_function("prepare_cached", |b| {
        b.iter(|| {
            let stmt = conn.prepare(black_box("SELECT 1;")).unwrap();
            black_box(stmt.id());
        });
    });
}

criterion_group!(benches, bench_acquire_release, bench_cached_prepare);
criterion_main!(benches);
