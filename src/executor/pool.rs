use super::stats::PoolStats;
use super::task::{Task, TaskId};
use super::thread_factory::{NamedThreadFactory, ThreadFactory};
use super::uncaught::{LoggingErrorHandler, UncaughtErrorHandler};
use super::worker::{run_worker, Shared};
use super::Executor;
use crate::config::{PoolConfig, RejectionPolicy};
use crate::error::{Error, Result};
use crate::util::deadline::checked_deadline;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Worker pool with core/max sizing, a FIFO queue and a configurable
/// rejection policy. Threads are started lazily as tasks arrive.
///
/// Submission follows the usual order: start a core thread, else queue,
/// else start an extra thread up to `max_pool_size`, else reject.
pub struct ThreadPool {
    shared: Arc<Shared>,
    factory: Arc<dyn ThreadFactory>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        let mut factory = NamedThreadFactory::new(config.thread_name_prefix.clone());
        if let Some(stack_size) = config.stack_size {
            factory = factory.with_stack_size(stack_size);
        }
        Self::with_parts(config, Arc::new(factory), Arc::new(LoggingErrorHandler))
    }

    pub fn with_parts(
        config: PoolConfig,
        factory: Arc<dyn ThreadFactory>,
        handler: Arc<dyn UncaughtErrorHandler>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared::new(config, handler)),
            factory,
            threads: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    fn spawn_worker(&self, first: Option<Task>) -> Result<()> {
        let shared = self.shared.clone();
        match self
            .factory
            .new_thread(Box::new(move || run_worker(shared, first)))
        {
            Ok(handle) => {
                let mut threads = self.threads.lock();
                threads.retain(|t| !t.is_finished());
                threads.push(handle);
                Ok(())
            }
            Err(e) => {
                let mut state = self.shared.state.lock();
                state.pool_size -= 1;
                let last = state.pool_size == 0;
                drop(state);
                if last {
                    self.shared.terminated.notify_all();
                }
                Err(Error::spawn(e.to_string()))
            }
        }
    }

    /// Starts a worker for a task already in the queue. If no thread can
    /// be started the task is taken back out, so it is never stranded.
    fn spawn_for_queued(&self, id: TaskId) -> Result<()> {
        let result = self.spawn_worker(None);
        if result.is_err() {
            let mut state = self.shared.state.lock();
            let pos = state.queue.iter().position(|t| t.id() == id);
            let stranded = pos.and_then(|pos| state.queue.remove(pos));
            drop(state);
            drop(stranded);
        }
        result
    }

    fn reject(&self, task: Task, pool_size: usize, queued: usize) -> Result<()> {
        let policy = self.shared.config.rejection_policy;
        self.shared.rejected.fetch_add(1, Ordering::Relaxed);

        match policy {
            RejectionPolicy::Abort => {
                warn!(task = %task.id(), pool_size, queued, "task rejected, pool saturated");
                Err(Error::Rejected {
                    policy,
                    pool_size,
                    queued,
                })
            }
            RejectionPolicy::Discard => {
                debug!(task = %task.id(), "pool saturated, discarding task");
                Ok(())
            }
            RejectionPolicy::DiscardOldest => {
                let mut state = self.shared.state.lock();
                if state.shutdown {
                    return Err(Error::Shutdown);
                }
                let dropped = state.queue.pop_front();
                let id = task.id();
                state.queue.push_back(task);
                // idle workers may have timed out since saturation was observed
                let needs_worker = state.pool_size == 0;
                if needs_worker {
                    state.add_worker();
                }
                drop(state);
                self.shared.available.notify_one();

                if let Some(dropped) = dropped {
                    debug!(task = %dropped.id(), "pool saturated, discarding oldest queued task");
                }
                if needs_worker {
                    return self.spawn_for_queued(id);
                }
                Ok(())
            }
            RejectionPolicy::CallerRuns => {
                if self.is_shutdown() {
                    return Err(Error::Shutdown);
                }
                debug!(task = %task.id(), "pool saturated, running task on caller thread");
                self.shared.run(task);
                Ok(())
            }
        }
    }

    /// Stops accepting tasks. Queued tasks still run.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        drop(state);

        debug!("thread pool shutting down");
        self.shared.available.notify_all();
    }

    /// Stops accepting tasks and drops everything still queued. Returns how
    /// many queued tasks were dropped.
    pub fn shutdown_now(&self) -> usize {
        let mut state = self.shared.state.lock();
        state.shutdown = true;
        let drained = std::mem::take(&mut state.queue);
        drop(state);

        self.shared.available.notify_all();
        let count = drained.len();
        drop(drained);
        count
    }

    /// Waits until every worker has exited. Returns `false` on timeout.
    /// A timeout too large to represent waits without limit.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = checked_deadline(Instant::now(), timeout);
        let mut state = self.shared.state.lock();
        while state.pool_size > 0 {
            match deadline {
                Some(deadline) => {
                    if self.shared.terminated.wait_until(&mut state, deadline).timed_out() {
                        return state.pool_size == 0;
                    }
                }
                None => self.shared.terminated.wait(&mut state),
            }
        }
        true
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    pub fn is_terminated(&self) -> bool {
        let state = self.shared.state.lock();
        state.shutdown && state.pool_size == 0
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }
}

impl Executor for ThreadPool {
    fn execute(&self, task: Task) -> Result<()> {
        let config = &self.shared.config;
        let mut state = self.shared.state.lock();

        if state.shutdown {
            drop(state);
            self.shared.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(Error::Shutdown);
        }

        if state.pool_size < config.core_pool_size {
            state.add_worker();
            drop(state);
            return self.spawn_worker(Some(task));
        }

        if config.queue_capacity.has_room(state.queue.len()) {
            let id = task.id();
            state.queue.push_back(task);
            let needs_worker = state.pool_size == 0;
            if needs_worker {
                state.add_worker();
            }
            drop(state);

            self.shared.available.notify_one();
            if needs_worker {
                return self.spawn_for_queued(id);
            }
            return Ok(());
        }

        if state.pool_size < config.max_pool_size {
            state.add_worker();
            drop(state);
            return self.spawn_worker(Some(task));
        }

        let (pool_size, queued) = (state.pool_size, state.queue.len());
        drop(state);
        self.reject(task, pool_size, queued)
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();

        let current = thread::current().id();
        for handle in self.threads.get_mut().drain(..) {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}
