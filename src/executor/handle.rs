//! Result handles for submitted tasks.

use super::task::{Task, TaskId};
use super::uncaught::TaskError;
use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Outcome<T> = std::result::Result<T, TaskError>;

#[derive(Debug, Default)]
struct Flags {
    cancelled: AtomicBool,
    finished: AtomicBool,
}

/// Travels with the task. Marks the handle finished when dropped, whether
/// the task ran or was discarded unrun.
struct Completion<T> {
    sender: Sender<Outcome<T>>,
    flags: Arc<Flags>,
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        self.flags.finished.store(true, Ordering::Release);
    }
}

/// Handle to the eventual result of a task started with
/// [`ExecutorExt::submit`](super::ExecutorExt::submit).
///
/// A panic inside the task is delivered here as [`Error::TaskFailed`]
/// instead of going to the pool's uncaught-error handler. A task that was
/// cancelled before starting, or dropped by a discard policy or
/// `shutdown_now`, yields [`Error::Cancelled`].
pub struct TaskHandle<T> {
    id: TaskId,
    receiver: Receiver<Outcome<T>>,
    flags: Arc<Flags>,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub(crate) fn pair<F>(f: F) -> (Task, TaskHandle<T>)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = bounded(1);
        let flags = Arc::new(Flags::default());
        let completion = Completion {
            sender,
            flags: flags.clone(),
        };

        let task = Task::new(move || {
            if completion.flags.cancelled.load(Ordering::Acquire) {
                return;
            }
            let outcome = catch_unwind(AssertUnwindSafe(f)).map_err(TaskError::from_panic);
            let _ = completion.sender.send(outcome);
        });

        let handle = TaskHandle {
            id: task.id(),
            receiver,
            flags,
        };
        (task, handle)
    }
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Blocks until the task finishes.
    pub fn join(self) -> Result<T> {
        match self.receiver.recv() {
            Ok(outcome) => outcome.map_err(|e| Error::task_failed(e.to_string())),
            Err(_) => Err(Error::Cancelled),
        }
    }

    /// Like [`join`](Self::join) but gives up after `timeout`. The result
    /// can be taken only once.
    pub fn join_timeout(&self, timeout: Duration) -> Result<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => outcome.map_err(|e| Error::task_failed(e.to_string())),
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Cancelled),
        }
    }

    /// Returns the result if it is ready, without blocking.
    pub fn try_join(&self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome.map_err(|e| Error::task_failed(e.to_string()))),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::Cancelled)),
        }
    }

    /// Prevents the task from starting. A task already running is not
    /// interrupted. Returns `false` if the task had already finished or
    /// was already cancelled.
    pub fn cancel(&self) -> bool {
        if self.is_finished() {
            return false;
        }
        !self.flags.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.cancelled.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.flags.finished.load(Ordering::Acquire)
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}
