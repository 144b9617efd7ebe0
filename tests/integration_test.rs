use ctxpool::context::{self, Authentication, User, UserToken};
use ctxpool::executor::{TaskError, TaskId};
use ctxpool::prelude::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn pool(core: usize) -> ContextExecutor<ThreadPool> {
    let config = PoolConfig::builder()
        .core_pool_size(core)
        .thread_name_prefix("it")
        .build()
        .unwrap();
    ContextExecutor::new(ThreadPool::new(config).unwrap())
}

struct Session;

#[test]
fn test_only_propagatable_values_reach_task() {
    init_tracing();
    let executor = pool(2);

    context::clear();
    context::put("user", "alice");
    context::put("session_obj", ContextValue::opaque(Session));

    let seen = executor.submit(context::get_all).unwrap().join().unwrap();
    context::clear();

    assert_eq!(seen.len(), 1);
    assert_eq!(seen.get("user"), Some(&ContextValue::from("alice")));
}

#[test]
fn test_security_values_propagate() {
    let executor = pool(1);
    let auth = Authentication::new(User::new("u-1", "alice")).with_attribute("tenant", "acme");

    context::clear();
    context::put("token", UserToken::new("t-123", "u-1"));
    context::put("auth", auth);
    context::put("retries", 3u32);

    let (token, tenant, retries) = executor
        .submit(|| {
            let token = context::get("token").and_then(|v| v.as_token().map(|t| t.token.clone()));
            let tenant = context::get("auth").and_then(|v| {
                v.as_authentication()
                    .and_then(|a| a.attribute("tenant").map(str::to_owned))
            });
            let retries = context::get("retries").and_then(|v| v.as_u64());
            (token, tenant, retries)
        })
        .unwrap()
        .join()
        .unwrap();
    context::clear();

    assert_eq!(token.as_deref(), Some("t-123"));
    assert_eq!(tenant.as_deref(), Some("acme"));
    assert_eq!(retries, Some(3));
}

#[test]
fn test_worker_store_empty_between_tasks() {
    let executor = pool(1);

    context::clear();
    context::put("user", "alice");
    executor.spawn(|| panic!("task failed")).unwrap();
    executor.spawn(|| {}).unwrap();
    context::clear();

    // same single worker, submitted with an empty caller context
    let leftover = executor.submit(context::get_all).unwrap().join().unwrap();
    assert!(leftover.is_empty());

    let stats = executor.inner().stats();
    assert_eq!(stats.pool_size, 1);
    assert_eq!(stats.failed, 1);
}

#[test]
fn test_concurrent_snapshots_are_isolated() {
    let executor = Arc::new(pool(4));
    let results = Arc::new(Mutex::new(HashMap::new()));

    let submitters: Vec<_> = (0..8)
        .map(|i| {
            let executor = executor.clone();
            let results = results.clone();
            std::thread::spawn(move || {
                context::put("user", format!("user-{}", i));
                let handle = executor
                    .submit(move || context::get("user").and_then(|v| v.as_str().map(str::to_owned)))
                    .unwrap();
                let seen = handle.join().unwrap();
                results.lock().insert(i, seen);
            })
        })
        .collect();

    for submitter in submitters {
        submitter.join().unwrap();
    }

    let results = results.lock();
    assert_eq!(results.len(), 8);
    for (i, seen) in results.iter() {
        assert_eq!(seen.as_deref(), Some(format!("user-{}", i).as_str()));
    }
}

#[test]
fn test_execute_with_passes_snapshot() {
    let executor = pool(1);
    let (tx, rx) = crossbeam_channel::bounded(1);

    context::clear();
    context::put("request_id", 42i64);
    executor
        .execute_with(move |snapshot| {
            let _ = tx.send(snapshot.get("request_id").and_then(ContextValue::as_i64));
        })
        .unwrap();
    context::clear();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Some(42));
}

#[test]
fn test_thread_names_monotonic_across_thread_deaths() {
    let config = PoolConfig::builder()
        .core_pool_size(1)
        .max_pool_size(1)
        .keep_alive(Duration::from_millis(10))
        .allow_core_thread_timeout(true)
        .thread_name_prefix("cycle")
        .build()
        .unwrap();
    let executor = pool_from(config);

    let mut names = Vec::new();
    for _ in 0..3 {
        let name = executor
            .submit(|| std::thread::current().name().map(str::to_owned))
            .unwrap()
            .join()
            .unwrap();
        names.push(name.unwrap());

        // let the idle worker time out before the next submission
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while executor.inner().stats().pool_size > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    assert_eq!(names, vec!["cycle-thread-1", "cycle-thread-2", "cycle-thread-3"]);
}

fn pool_from(config: PoolConfig) -> ContextExecutor<ThreadPool> {
    ContextExecutor::new(ThreadPool::new(config).unwrap())
}

fn saturated(policy: RejectionPolicy) -> (ContextExecutor<ThreadPool>, Arc<Barrier>) {
    let config = PoolConfig::builder()
        .core_pool_size(1)
        .max_pool_size(1)
        .queue_capacity(1)
        .rejection_policy(policy)
        .build()
        .unwrap();
    let executor = pool_from(config);

    let gate = Arc::new(Barrier::new(2));
    let blocker = gate.clone();
    executor.spawn(move || {
        blocker.wait();
    }).unwrap();
    executor.spawn(|| {}).unwrap();
    (executor, gate)
}

#[test]
fn test_abort_policy_rejects() {
    let (executor, gate) = saturated(RejectionPolicy::Abort);

    let err = executor.spawn(|| {}).unwrap_err();
    assert!(err.is_rejected());

    gate.wait();
    executor.inner().shutdown();
    assert!(executor.inner().await_termination(Duration::from_secs(5)));
    assert_eq!(executor.inner().stats().rejected, 1);
}

#[test]
fn test_caller_runs_policy_runs_inline_with_context() {
    let (executor, gate) = saturated(RejectionPolicy::CallerRuns);
    let caller = std::thread::current().id();

    context::clear();
    context::put("user", "bob");
    context::put("local_only", ContextValue::opaque(Session));

    let (tx, rx) = crossbeam_channel::bounded(1);
    executor
        .spawn(move || {
            let _ = tx.send((std::thread::current().id(), context::len()));
        })
        .unwrap();
    let (ran_on, visible) = rx.recv_timeout(Duration::from_secs(5)).unwrap();

    assert_eq!(ran_on, caller);
    assert_eq!(visible, 1);
    // the caller keeps its full context, including the local-only value
    assert_eq!(context::len(), 2);
    context::clear();

    gate.wait();
}

#[test]
fn test_failures_reach_uncaught_handler() {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = failures.clone();
    let handler = move |_: TaskId, err: &TaskError| sink.lock().push(err.is_panic());

    let config = PoolConfig::builder().core_pool_size(1).build().unwrap();
    let factory = Arc::new(NamedThreadFactory::new("handler"));
    let pool = ThreadPool::with_parts(config, factory, Arc::new(handler)).unwrap();
    let executor = ContextExecutor::new(pool);

    executor
        .try_spawn(|| Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "io failed")))
        .unwrap();
    executor.spawn(|| panic!("boom")).unwrap();

    executor.inner().shutdown();
    assert!(executor.inner().await_termination(Duration::from_secs(5)));
    assert_eq!(*failures.lock(), vec![false, true]);
}

#[test]
fn test_submit_returns_values_and_panics() {
    let executor = pool(2);

    let handles: Vec<_> = (0..10u64).map(|i| executor.submit(move || i * i).unwrap()).collect();
    let squares: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(squares, (0..10u64).map(|i| i * i).collect::<Vec<_>>());

    let failed = executor.submit(|| -> u32 { panic!("bad input") }).unwrap();
    assert!(matches!(failed.join(), Err(Error::TaskFailed(_))));
}

#[test]
fn test_global_services() {
    ctxpool::shutdown();
    assert!(matches!(ctxpool::execute(|| {}), Err(Error::NotInitialized)));

    let config = ServicesConfig {
        pool: PoolConfig::builder()
            .core_pool_size(2)
            .thread_name_prefix("global")
            .build()
            .unwrap(),
    };
    ctxpool::init_with_config(config).unwrap();

    context::clear();
    context::put("user", "carol");
    let (user, name) = ctxpool::submit(|| {
        (
            context::get("user"),
            std::thread::current().name().map(str::to_owned),
        )
    })
    .unwrap()
    .join()
    .unwrap();
    context::clear();

    assert_eq!(user, Some(ContextValue::from("carol")));
    assert!(name.unwrap().starts_with("global-thread-"));

    let ran = Arc::new(AtomicUsize::new(0));
    let counter = ran.clone();
    let handle = ctxpool::schedule(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        Duration::from_millis(10),
    )
    .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !handle.is_done() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(ran.load(Ordering::SeqCst), 1);

    ctxpool::shutdown();
}

fn context_value() -> impl Strategy<Value = ContextValue> {
    prop_oneof![
        "[a-z]{0,8}".prop_map(ContextValue::from),
        any::<bool>().prop_map(ContextValue::from),
        any::<i64>().prop_map(ContextValue::from),
        any::<u64>().prop_map(ContextValue::from),
        any::<char>().prop_map(ContextValue::from),
        Just(ContextValue::Null),
        any::<u8>().prop_map(ContextValue::opaque),
    ]
}

proptest! {
    #[test]
    fn prop_snapshot_keeps_exactly_propagatable(
        entries in prop::collection::hash_map("[a-z]{1,6}", context_value(), 0..12)
    ) {
        context::clear();
        for (key, value) in &entries {
            context::put(key.clone(), value.clone());
        }

        let snapshot = ContextSnapshot::capture(&context::ThreadLocalStore);
        context::clear();

        let expected: HashMap<String, ContextValue> = entries
            .into_iter()
            .filter(|(_, v)| v.is_propagatable())
            .collect();
        prop_assert_eq!(snapshot.len(), expected.len());
        for (key, value) in &expected {
            prop_assert_eq!(snapshot.get(key), Some(value));
        }
    }
}
