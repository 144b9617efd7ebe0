use super::task::{BoxError, Task, TaskId};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Why a fire-and-forget task did not finish normally.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task panicked: {message}")]
    Panicked { message: String },

    #[error("task failed: {0}")]
    Failed(BoxError),
}

impl TaskError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        TaskError::Panicked { message }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked { .. })
    }
}

/// Receives failures of tasks nobody is waiting on.
///
/// Any `Fn(TaskId, &TaskError)` closure qualifies.
pub trait UncaughtErrorHandler: Send + Sync {
    fn handle(&self, task: TaskId, error: &TaskError);
}

impl<F> UncaughtErrorHandler for F
where
    F: Fn(TaskId, &TaskError) + Send + Sync,
{
    fn handle(&self, task: TaskId, error: &TaskError) {
        self(task, error)
    }
}

/// Default handler: logs the failure at `error` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingErrorHandler;

impl UncaughtErrorHandler for LoggingErrorHandler {
    fn handle(&self, task: TaskId, error: &TaskError) {
        error!(task = %task, error = %error, "unexpected error occurred invoking async task");
    }
}

/// Runs `task`, routing a panic or returned error to `handler`.
/// Returns `true` when the task completed normally.
pub(crate) fn run_guarded(task: Task, handler: &dyn UncaughtErrorHandler) -> bool {
    let id = task.id();
    let err = match catch_unwind(AssertUnwindSafe(|| task.run())) {
        Ok(Ok(())) => return true,
        Ok(Err(e)) => TaskError::Failed(e),
        Err(payload) => TaskError::from_panic(payload),
    };

    if catch_unwind(AssertUnwindSafe(|| handler.handle(id, &err))).is_err() {
        error!(task = %id, error = %err, "uncaught-error handler panicked");
    }
    false
}
