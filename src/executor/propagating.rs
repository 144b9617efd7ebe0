use super::pool::ThreadPool;
use super::task::Task;
use super::Executor;
use crate::context::{ContextScope, ContextSnapshot, ContextStore, ThreadLocalStore};
use crate::error::Result;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Decorates an [`Executor`] so every task sees the submitter's context.
///
/// At submission the propagatable part of the caller's context store is
/// captured. On the worker the store is cleared, the snapshot installed,
/// the task run, and the store cleared again, even if the task panics.
/// Values that are not propagatable are left behind without notice.
pub struct ContextExecutor<E = ThreadPool> {
    inner: E,
    store: Arc<dyn ContextStore>,
}

impl<E: Executor> ContextExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self::with_store(inner, Arc::new(ThreadLocalStore))
    }

    pub fn with_store(inner: E, store: Arc<dyn ContextStore>) -> Self {
        Self { inner, store }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    /// Runs `f` with the captured snapshot passed in explicitly, in
    /// addition to it being installed in the worker's store.
    pub fn execute_with<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&ContextSnapshot) + Send + 'static,
    {
        let snapshot = ContextSnapshot::capture(self.store.as_ref());
        let explicit = snapshot.clone();
        let task = Task::new(move || f(&explicit));
        self.inner.execute(self.wrap(task, snapshot))
    }

    fn wrap(&self, task: Task, snapshot: ContextSnapshot) -> Task {
        let store = self.store.clone();
        task.decorate(move |inner| {
            if !snapshot.is_empty() {
                info!(task = %inner.id(), context = ?snapshot, "share thread local info");
            }
            let _scope = ContextScope::enter(store.as_ref(), &snapshot);
            drop(snapshot);
            inner.run()
        })
    }
}

impl<E: Executor> Executor for ContextExecutor<E> {
    fn execute(&self, task: Task) -> Result<()> {
        let snapshot = ContextSnapshot::capture(self.store.as_ref());
        self.inner.execute(self.wrap(task, snapshot))
    }
}

impl<E: fmt::Debug> fmt::Debug for ContextExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextExecutor")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
