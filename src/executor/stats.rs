/// Point-in-time counters of a [`ThreadPool`](super::ThreadPool).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Live worker threads.
    pub pool_size: usize,
    /// Workers currently running a task.
    pub active_count: usize,
    /// Highest `pool_size` ever reached.
    pub largest_pool_size: usize,
    /// Tasks waiting in the queue.
    pub queued: usize,
    /// Tasks that ran to completion, including caller-run ones.
    pub completed: u64,
    /// Tasks that panicked or returned an error.
    pub failed: u64,
    /// Submissions that hit saturation or shutdown.
    pub rejected: u64,
}

impl PoolStats {
    /// Tasks that finished either way.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }
}
