use crate::config::RejectionPolicy;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by pools, handles and the global services.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The pool was saturated under [`RejectionPolicy::Abort`].
    #[error("task rejected ({policy} policy): pool size {pool_size}, {queued} queued")]
    Rejected {
        policy: RejectionPolicy,
        pool_size: usize,
        queued: usize,
    },

    /// Submitted after `shutdown`.
    #[error("executor has been shut down")]
    Shutdown,

    #[error("config error: {0}")]
    Config(String),

    /// The thread factory could not start a thread.
    #[error("thread spawn failed: {0}")]
    Spawn(String),

    /// The task panicked; only reported through a `TaskHandle`.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// Cancelled, or discarded before it ran.
    #[error("task was cancelled")]
    Cancelled,

    #[error("timed out waiting for task")]
    Timeout,

    /// A global helper was called before `init`.
    #[error("executor services not initialized")]
    NotInitialized,

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn spawn<S: Into<String>>(msg: S) -> Self {
        Error::Spawn(msg.into())
    }

    pub fn task_failed<S: Into<String>>(msg: S) -> Self {
        Error::TaskFailed(msg.into())
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Error::Rejected { .. })
    }
}
