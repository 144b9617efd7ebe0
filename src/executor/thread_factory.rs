use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Body of a freshly created thread.
pub type Runnable = Box<dyn FnOnce() + Send + 'static>;

/// Creates the OS threads a pool runs on.
pub trait ThreadFactory: Send + Sync {
    fn new_thread(&self, runnable: Runnable) -> io::Result<JoinHandle<()>>;
}

/// Names threads `"<prefix>-thread-<n>"`, with `n` counting up from 1 for
/// the life of the factory. Numbers are never handed out twice, so a name
/// identifies one thread even after earlier threads have exited.
#[derive(Debug)]
pub struct NamedThreadFactory {
    prefix: String,
    next_index: AtomicUsize,
    stack_size: Option<usize>,
}

impl NamedThreadFactory {
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
            next_index: AtomicUsize::new(1),
            stack_size: None,
        }
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of names handed out so far.
    pub fn created(&self) -> usize {
        self.next_index.load(Ordering::Relaxed) - 1
    }

    fn next_name(&self) -> String {
        let n = self.next_index.fetch_add(1, Ordering::Relaxed);
        format!("{}-thread-{}", self.prefix, n)
    }
}

impl ThreadFactory for NamedThreadFactory {
    fn new_thread(&self, runnable: Runnable) -> io::Result<JoinHandle<()>> {
        let mut builder = thread::Builder::new().name(self.next_name());

        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        builder.spawn(runnable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_and_name(factory: &NamedThreadFactory) -> String {
        factory
            .new_thread(Box::new(|| {}))
            .map(|handle| {
                let name = handle.thread().name().map(str::to_owned);
                handle.join().unwrap();
                name
            })
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_names_count_from_one() {
        let factory = NamedThreadFactory::new("jobs");
        assert_eq!(spawn_and_name(&factory), "jobs-thread-1");
        assert_eq!(spawn_and_name(&factory), "jobs-thread-2");
        assert_eq!(factory.created(), 2);
    }

    #[test]
    fn test_thread_sees_its_own_name() {
        let factory = NamedThreadFactory::new("io").with_stack_size(256 * 1024);
        let (tx, rx) = crossbeam_channel::bounded(1);
        let handle = factory
            .new_thread(Box::new(move || {
                let _ = tx.send(thread::current().name().map(str::to_owned));
            }))
            .unwrap();
        handle.join().unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("io-thread-1"));
    }
}
