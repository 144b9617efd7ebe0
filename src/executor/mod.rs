//! Task execution infrastructure.
//!
//! [`ThreadPool`] is the plain worker pool; [`ContextExecutor`] decorates any
//! [`Executor`] with context propagation. Threads come from a
//! [`ThreadFactory`], failures of fire-and-forget tasks go to an
//! [`UncaughtErrorHandler`].

pub mod handle;
pub mod pool;
pub mod propagating;
pub mod stats;
pub mod task;
pub mod thread_factory;
pub mod uncaught;
mod worker;

pub use handle::TaskHandle;
pub use pool::ThreadPool;
pub use propagating::ContextExecutor;
pub use stats::PoolStats;
pub use task::{BoxError, Task, TaskId};
pub use thread_factory::{NamedThreadFactory, Runnable, ThreadFactory};
pub use uncaught::{LoggingErrorHandler, TaskError, UncaughtErrorHandler};

use crate::error::Result;

/// Something that runs tasks.
pub trait Executor: Send + Sync {
    /// Hands `task` over for execution. Fails only when the task cannot be
    /// accepted; failures of the task itself never come back here.
    fn execute(&self, task: Task) -> Result<()>;
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn execute(&self, task: Task) -> Result<()> {
        (**self).execute(task)
    }
}

/// Closure conveniences for every [`Executor`].
pub trait ExecutorExt: Executor {
    /// Fire-and-forget.
    fn spawn<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(Task::new(f))
    }

    /// Fire-and-forget; an `Err` goes to the uncaught-error handler.
    fn try_spawn<F, E>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        self.execute(Task::fallible(f))
    }

    /// Runs `f` and hands back its result through a [`TaskHandle`].
    fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = TaskHandle::pair(f);
        self.execute(task)?;
        Ok(handle)
    }
}

impl<E: Executor + ?Sized> ExecutorExt for E {}
