// worker thread stuff
use super::stats::PoolStats;
use super::task::Task;
use super::uncaught::{run_guarded, UncaughtErrorHandler};
use crate::config::PoolConfig;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::debug;

pub(crate) struct PoolState {
    pub queue: VecDeque<Task>,
    pub pool_size: usize,
    pub largest_pool_size: usize,
    pub shutdown: bool,
}

impl PoolState {
    /// Reserves a slot for a new worker.
    pub fn add_worker(&mut self) {
        self.pool_size += 1;
        self.largest_pool_size = self.largest_pool_size.max(self.pool_size);
    }
}

/// State shared between the pool handle and its workers.
pub(crate) struct Shared {
    pub config: PoolConfig,
    pub state: Mutex<PoolState>,
    /// Signalled when a task is queued or the pool shuts down.
    pub available: Condvar,
    /// Signalled when the last worker exits.
    pub terminated: Condvar,
    pub handler: Arc<dyn UncaughtErrorHandler>,
    pub active: AtomicUsize,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub rejected: AtomicU64,
}

impl Shared {
    pub fn new(config: PoolConfig, handler: Arc<dyn UncaughtErrorHandler>) -> Self {
        Self {
            config,
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                pool_size: 0,
                largest_pool_size: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
            terminated: Condvar::new(),
            handler,
            active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Runs one task on the current thread and updates the counters.
    pub fn run(&self, task: Task) {
        self.active.fetch_add(1, Ordering::Relaxed);
        let ok = run_guarded(task, self.handler.as_ref());
        self.active.fetch_sub(1, Ordering::Relaxed);

        if ok {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Blocks until a task is available. Returns `None` when this worker
    /// should exit, after giving up its slot in the pool.
    fn next_task(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.queue.pop_front() {
                return Some(task);
            }
            if state.shutdown {
                break;
            }

            if self.may_time_out(&state) {
                let result = self.available.wait_for(&mut state, self.config.keep_alive);
                if result.timed_out() && state.queue.is_empty() && self.may_time_out(&state) {
                    break;
                }
            } else {
                self.available.wait(&mut state);
            }
        }

        state.pool_size -= 1;
        let last = state.pool_size == 0;
        drop(state);

        if last {
            self.terminated.notify_all();
        }
        None
    }

    fn may_time_out(&self, state: &PoolState) -> bool {
        self.config.allow_core_thread_timeout || state.pool_size > self.config.core_pool_size
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            pool_size: state.pool_size,
            active_count: self.active.load(Ordering::Relaxed),
            largest_pool_size: state.largest_pool_size,
            queued: state.queue.len(),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

// main loop
pub(crate) fn run_worker(shared: Arc<Shared>, first: Option<Task>) {
    let name = thread::current().name().unwrap_or("unnamed").to_string();
    debug!(worker = %name, "worker started");

    let mut next = first;
    loop {
        let task = match next.take() {
            Some(task) => task,
            None => match shared.next_task() {
                Some(task) => task,
                None => break,
            },
        };
        shared.run(task);
    }

    debug!(worker = %name, "worker exiting");
}
