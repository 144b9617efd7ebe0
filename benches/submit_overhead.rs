//! Benchmarks for context capture and submission overhead

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ctxpool::context::{self, Authentication, User, UserToken};
use ctxpool::prelude::*;

fn pool() -> ThreadPool {
    let config = PoolConfig::builder()
        .core_pool_size(4)
        .thread_name_prefix("bench")
        .build()
        .unwrap();
    ThreadPool::new(config).unwrap()
}

fn populate_context() {
    context::put("user", "alice");
    context::put("token", UserToken::new("t-123", "u-1"));
    context::put("auth", Authentication::new(User::new("u-1", "alice")));
    context::put("request_id", 42i64);
}

fn bench_plain_pool(c: &mut Criterion) {
    let pool = pool();

    c.bench_function("plain_submit_join", |b| {
        b.iter(|| pool.submit(|| black_box(1u64)).unwrap().join().unwrap());
    });
}

fn bench_context_pool(c: &mut Criterion) {
    let executor = ContextExecutor::new(pool());

    context::clear();
    c.bench_function("context_submit_join_empty", |b| {
        b.iter(|| executor.submit(|| black_box(1u64)).unwrap().join().unwrap());
    });

    populate_context();
    c.bench_function("context_submit_join_populated", |b| {
        b.iter(|| executor.submit(|| black_box(1u64)).unwrap().join().unwrap());
    });
    context::clear();
}

fn bench_snapshot_capture(c: &mut Criterion) {
    populate_context();
    context::put("local_only", ContextValue::opaque(vec![0u8; 64]));

    c.bench_function("snapshot_capture", |b| {
        b.iter(|| black_box(ContextSnapshot::capture(&context::ThreadLocalStore)));
    });
    context::clear();
}

criterion_group!(
    benches,
    bench_plain_pool,
    bench_context_pool,
    bench_snapshot_capture
);
criterion_main!(benches);
