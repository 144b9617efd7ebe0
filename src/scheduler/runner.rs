use super::queue::{DelayQueue, Job, JobStatus, Period, ScheduledEntry};
use crate::error::{Error, Result};
use crate::executor::{NamedThreadFactory, ThreadFactory};
use crate::util::deadline::{checked_deadline, saturating_deadline};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Multiplier applied to the available parallelism when sizing the pool.
pub const PARALLELISM_MULTIPLIER: usize = 2;

struct RunnerState {
    queue: DelayQueue,
    live_workers: usize,
    shutdown: bool,
}

struct Shared {
    state: Mutex<RunnerState>,
    /// Signalled when the queue head may have changed or on shutdown.
    wakeup: Condvar,
    terminated: Condvar,
}

impl Shared {
    fn next_due(&self) -> Option<ScheduledEntry> {
        let mut state = self.state.lock();
        loop {
            if let Some(entry) = state.queue.pop_due(Instant::now()) {
                return Some(entry);
            }
            let head = state.queue.peek_due();
            match head {
                Some(due) => {
                    self.wakeup.wait_until(&mut state, due);
                }
                None if state.shutdown => return None,
                None => self.wakeup.wait(&mut state),
            }
        }
    }

    fn run(&self, entry: ScheduledEntry) {
        let ScheduledEntry {
            due, job, status, ..
        } = entry;

        if status.cancelled.load(Ordering::Acquire) {
            status.done.store(true, Ordering::Release);
            return;
        }

        match job {
            Job::Once(body) => {
                let result = catch_unwind(AssertUnwindSafe(body));
                status.runs.fetch_add(1, Ordering::Relaxed);
                if result.is_err() {
                    status.failed.store(true, Ordering::Release);
                    error!("scheduled task panicked");
                }
                status.done.store(true, Ordering::Release);
            }
            Job::Repeating { mut body, period } => {
                let result = catch_unwind(AssertUnwindSafe(|| body()));
                status.runs.fetch_add(1, Ordering::Relaxed);

                if result.is_err() {
                    status.failed.store(true, Ordering::Release);
                    status.done.store(true, Ordering::Release);
                    error!(runs = status.runs.load(Ordering::Relaxed), "periodic task panicked, no further runs");
                    return;
                }
                if status.cancelled.load(Ordering::Acquire) {
                    status.done.store(true, Ordering::Release);
                    return;
                }

                let next = match period {
                    Period::FixedRate(period) => saturating_deadline(due, period),
                    Period::FixedDelay(delay) => saturating_deadline(Instant::now(), delay),
                };

                let mut state = self.state.lock();
                if state.shutdown {
                    drop(state);
                    status.done.store(true, Ordering::Release);
                    return;
                }
                state.queue.push(next, Job::Repeating { body, period }, status);
                drop(state);
                self.wakeup.notify_one();
            }
        }
    }
}

fn run_worker(shared: Arc<Shared>) {
    while let Some(entry) = shared.next_due() {
        shared.run(entry);
    }

    let mut state = shared.state.lock();
    state.live_workers -= 1;
    let last = state.live_workers == 0;
    drop(state);
    if last {
        shared.terminated.notify_all();
    }
}

/// Handle to a delayed or periodic task.
#[derive(Clone)]
pub struct ScheduledHandle {
    status: Arc<JobStatus>,
}

impl ScheduledHandle {
    /// Stops future runs. A run already in progress finishes. Returns
    /// `false` if the task was already done or cancelled.
    pub fn cancel(&self) -> bool {
        if self.status.done.load(Ordering::Acquire) {
            return false;
        }
        !self.status.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.cancelled.load(Ordering::Acquire)
    }

    /// True once the task will never run again.
    pub fn is_done(&self) -> bool {
        self.status.done.load(Ordering::Acquire)
    }

    /// True if a run panicked.
    pub fn is_failed(&self) -> bool {
        self.status.failed.load(Ordering::Acquire)
    }

    pub fn run_count(&self) -> u64 {
        self.status.runs.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ScheduledHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledHandle")
            .field("runs", &self.run_count())
            .field("cancelled", &self.is_cancelled())
            .field("done", &self.is_done())
            .field("failed", &self.is_failed())
            .finish()
    }
}

/// Runs delayed and periodic tasks on its own threads. No context is
/// propagated into these tasks.
pub struct ScheduledRunner {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl ScheduledRunner {
    /// Starts `2 × available parallelism` threads.
    pub fn new() -> Result<Self> {
        Self::with_threads(num_cpus::get() * PARALLELISM_MULTIPLIER)
    }

    pub fn with_threads(num_threads: usize) -> Result<Self> {
        Self::with_factory(num_threads, &NamedThreadFactory::new("scheduled"))
    }

    pub fn with_factory(num_threads: usize, factory: &dyn ThreadFactory) -> Result<Self> {
        if num_threads == 0 {
            return Err(Error::config("need at least 1 thread"));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(RunnerState {
                queue: DelayQueue::new(),
                live_workers: 0,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
            terminated: Condvar::new(),
        });

        let runner = Self {
            shared,
            threads: Mutex::new(Vec::with_capacity(num_threads)),
            num_threads,
        };

        for _ in 0..num_threads {
            runner.shared.state.lock().live_workers += 1;
            let shared = runner.shared.clone();
            match factory.new_thread(Box::new(move || run_worker(shared))) {
                Ok(handle) => runner.threads.lock().push(handle),
                Err(e) => {
                    runner.shared.state.lock().live_workers -= 1;
                    // dropping `runner` stops and joins what was started
                    return Err(Error::spawn(e.to_string()));
                }
            }
        }

        debug!(threads = num_threads, "scheduled runner started");
        Ok(runner)
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    fn enqueue(&self, due: Instant, job: Job) -> Result<ScheduledHandle> {
        let status = Arc::new(JobStatus::default());
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(Error::Shutdown);
        }
        state.queue.push(due, job, status.clone());
        drop(state);

        self.shared.wakeup.notify_one();
        Ok(ScheduledHandle { status })
    }

    /// Runs `task` once as soon as a thread is free.
    pub fn execute<F>(&self, task: F) -> Result<ScheduledHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule(task, Duration::ZERO)
    }

    /// Runs `task` once after `delay`.
    pub fn schedule<F>(&self, task: F, delay: Duration) -> Result<ScheduledHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(
            saturating_deadline(Instant::now(), delay),
            Job::Once(Box::new(task)),
        )
    }

    /// Runs `task` after `initial_delay`, then every `period` measured from
    /// the start of each run. A late run is not skipped; it starts as soon
    /// as possible and the following runs keep the original cadence.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        task: F,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<ScheduledHandle>
    where
        F: FnMut() + Send + 'static,
    {
        if period.is_zero() {
            return Err(Error::config("period must be > 0"));
        }
        self.enqueue(
            saturating_deadline(Instant::now(), initial_delay),
            Job::Repeating {
                body: Box::new(task),
                period: Period::FixedRate(period),
            },
        )
    }

    /// Runs `task` after `initial_delay`, then again `delay` after each run
    /// completes.
    pub fn schedule_with_fixed_delay<F>(
        &self,
        task: F,
        initial_delay: Duration,
        delay: Duration,
    ) -> Result<ScheduledHandle>
    where
        F: FnMut() + Send + 'static,
    {
        if delay.is_zero() {
            return Err(Error::config("delay must be > 0"));
        }
        self.enqueue(
            saturating_deadline(Instant::now(), initial_delay),
            Job::Repeating {
                body: Box::new(task),
                period: Period::FixedDelay(delay),
            },
        )
    }

    /// Drops cancelled tasks that are still waiting for their due time.
    pub fn purge(&self) -> usize {
        let removed = self
            .shared
            .state
            .lock()
            .queue
            .retain(|e| !e.status.cancelled.load(Ordering::Acquire));
        mark_done(&removed);
        removed.len()
    }

    /// Pending tasks, including cancelled ones not yet purged.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Stops accepting tasks and drops periodic ones. Delayed one-shot
    /// tasks still run when due.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        state.shutdown = true;
        let removed = state.queue.retain(|e| {
            !e.job.is_periodic() && !e.status.cancelled.load(Ordering::Acquire)
        });
        drop(state);

        mark_done(&removed);
        debug!(dropped = removed.len(), "scheduled runner shutting down");
        self.shared.wakeup.notify_all();
    }

    /// Stops accepting tasks and drops everything pending. Returns how
    /// many tasks were dropped.
    pub fn shutdown_now(&self) -> usize {
        let mut state = self.shared.state.lock();
        state.shutdown = true;
        let removed = state.queue.drain();
        drop(state);

        mark_done(&removed);
        self.shared.wakeup.notify_all();
        removed.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    /// Waits until every thread has exited. Returns `false` on timeout.
    /// A timeout too large to represent waits without limit.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = checked_deadline(Instant::now(), timeout);
        let mut state = self.shared.state.lock();
        while state.live_workers > 0 {
            match deadline {
                Some(deadline) => {
                    if self.shared.terminated.wait_until(&mut state, deadline).timed_out() {
                        return state.live_workers == 0;
                    }
                }
                None => self.shared.terminated.wait(&mut state),
            }
        }
        true
    }
}

fn mark_done(entries: &[ScheduledEntry]) {
    for entry in entries {
        entry.status.done.store(true, Ordering::Release);
    }
}

impl fmt::Debug for ScheduledRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledRunner")
            .field("num_threads", &self.num_threads)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for ScheduledRunner {
    // pending delayed tasks are discarded on drop
    fn drop(&mut self) {
        self.shutdown_now();

        let current = thread::current().id();
        for handle in self.threads.get_mut().drain(..) {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}
