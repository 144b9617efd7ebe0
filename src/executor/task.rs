//! Task representation and execution.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Error type a fallible task may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

type TaskFn = Box<dyn FnOnce() -> Result<(), BoxError> + Send + 'static>;

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A unit of work handed to an [`Executor`](super::Executor).
pub struct Task {
    id: TaskId,
    func: TaskFn,
    spawn_time: Instant,
}

impl Task {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::from_fn(TaskId::next(), Instant::now(), Box::new(move || {
            f();
            Ok(())
        }))
    }

    /// A task whose `Err` is reported to the pool's uncaught-error handler.
    pub fn fallible<F, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::from_fn(TaskId::next(), Instant::now(), Box::new(move || f().map_err(Into::into)))
    }

    fn from_fn(id: TaskId, spawn_time: Instant, func: TaskFn) -> Self {
        Task {
            id,
            func,
            spawn_time,
        }
    }

    /// Wraps this task in `around`, keeping its id and spawn time.
    /// `around` receives the original task and decides when to run it.
    pub fn decorate<D>(self, around: D) -> Task
    where
        D: FnOnce(Task) -> Result<(), BoxError> + Send + 'static,
    {
        let id = self.id;
        let spawn_time = self.spawn_time;
        Self::from_fn(id, spawn_time, Box::new(move || around(self)))
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn spawn_time(&self) -> Instant {
        self.spawn_time
    }

    pub fn run(self) -> Result<(), BoxError> {
        (self.func)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("spawn_time", &self.spawn_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_unique() {
        let a = Task::new(|| {});
        let b = Task::new(|| {});
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_decorate_keeps_id_and_runs_inner() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner_calls = calls.clone();
        let task = Task::new(move || {
            inner_calls.fetch_add(1, Ordering::SeqCst);
        });
        let id = task.id();

        let outer_calls = calls.clone();
        let wrapped = task.decorate(move |inner| {
            outer_calls.fetch_add(10, Ordering::SeqCst);
            inner.run()
        });

        assert_eq!(wrapped.id(), id);
        assert!(wrapped.run().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_fallible_task_returns_error() {
        let task = Task::fallible(|| Err::<(), _>("disk full"));
        let err = task.run().unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }
}
