//! Stress tests for the context-propagating pool

use ctxpool::context;
use ctxpool::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn bounded_pool(core: usize, queue: usize, policy: RejectionPolicy) -> ContextExecutor<ThreadPool> {
    let config = PoolConfig::builder()
        .core_pool_size(core)
        .queue_capacity(queue)
        .rejection_policy(policy)
        .build()
        .unwrap();
    ContextExecutor::new(ThreadPool::new(config).unwrap())
}

#[test]
fn stress_test_discard_oldest_burst() {
    let executor = bounded_pool(4, 10, RejectionPolicy::DiscardOldest);
    let executed = Arc::new(AtomicUsize::new(0));

    context::clear();
    context::put("user", "burst");
    for _ in 0..1000 {
        let executed = executed.clone();
        executor
            .spawn(move || {
                assert_eq!(context::get("user"), Some(ContextValue::from("burst")));
                executed.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    context::clear();

    executor.inner().shutdown();
    assert!(executor.inner().await_termination(Duration::from_secs(10)));

    let executed = executed.load(Ordering::SeqCst);
    assert!(executed >= 14, "executed {}", executed);
    assert!(executed <= 1000);

    let stats = executor.inner().stats();
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.completed as usize, executed);
    assert!(executor.inner().is_terminated());
}

#[test]
#[ignore] // Run with --ignored flag
fn stress_test_many_submitters() {
    let executor = Arc::new(bounded_pool(8, 10_000, RejectionPolicy::CallerRuns));
    let total = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..16)
        .map(|i| {
            let executor = executor.clone();
            let total = total.clone();
            std::thread::spawn(move || {
                context::put("submitter", i as i64);
                for _ in 0..10_000 {
                    let total = total.clone();
                    executor
                        .spawn(move || {
                            assert_eq!(
                                context::get("submitter").and_then(|v| v.as_i64()),
                                Some(i as i64)
                            );
                            total.fetch_add(1, Ordering::Relaxed);
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for submitter in submitters {
        submitter.join().unwrap();
    }

    executor.inner().shutdown();
    assert!(executor.inner().await_termination(Duration::from_secs(60)));
    assert_eq!(total.load(Ordering::Relaxed), 160_000);
    assert_eq!(executor.inner().stats().failed, 0);
}

#[test]
#[ignore]
fn stress_test_submit_join() {
    let executor = bounded_pool(num_cpus::get(), 100_000, RejectionPolicy::Abort);

    let handles: Vec<_> = (0..100_000u64)
        .map(|i| executor.submit(move || i * 2).unwrap())
        .collect();
    let sum: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(sum, 2 * (0..100_000u64).sum::<u64>());
}
