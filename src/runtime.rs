use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::executor::{
    ContextExecutor, ExecutorExt, LoggingErrorHandler, NamedThreadFactory, TaskHandle, ThreadPool,
    UncaughtErrorHandler,
};
use crate::scheduler::{ScheduledHandle, ScheduledRunner};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ServicesConfig {
    pub pool: PoolConfig,
}

impl ServicesConfig {
    /// Reads the pool settings from `CTXPOOL_EXECUTOR_*` variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            pool: PoolConfig::from_env()?,
        })
    }
}

/// The executors an application shares: the context-propagating pool, its
/// thread factory and the scheduled runner.
pub struct ExecutorServices {
    thread_factory: Arc<NamedThreadFactory>,
    executor: ContextExecutor<ThreadPool>,
    scheduler: ScheduledRunner,
}

impl ExecutorServices {
    pub fn new(config: ServicesConfig) -> Result<Self> {
        Self::with_error_handler(config, Arc::new(LoggingErrorHandler))
    }

    pub fn with_error_handler(
        config: ServicesConfig,
        handler: Arc<dyn UncaughtErrorHandler>,
    ) -> Result<Self> {
        let mut factory = NamedThreadFactory::new(config.pool.thread_name_prefix.clone());
        if let Some(stack_size) = config.pool.stack_size {
            factory = factory.with_stack_size(stack_size);
        }
        let thread_factory = Arc::new(factory);

        let pool = ThreadPool::with_parts(config.pool, thread_factory.clone(), handler)?;
        let scheduler = ScheduledRunner::new()?;

        Ok(Self {
            thread_factory,
            executor: ContextExecutor::new(pool),
            scheduler,
        })
    }

    pub fn executor(&self) -> &ContextExecutor<ThreadPool> {
        &self.executor
    }

    pub fn scheduler(&self) -> &ScheduledRunner {
        &self.scheduler
    }

    pub fn thread_factory(&self) -> &Arc<NamedThreadFactory> {
        &self.thread_factory
    }

    pub fn shutdown(&self) {
        self.executor.inner().shutdown();
        self.scheduler.shutdown();
    }

    /// Shuts down and waits up to `timeout` for both pools to drain.
    pub fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();
        let executor_done = self.executor.inner().await_termination(timeout);
        let scheduler_done = self.scheduler.await_termination(timeout);
        executor_done && scheduler_done
    }
}

impl std::fmt::Debug for ExecutorServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorServices")
            .field("executor", &self.executor)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

// Global services for the simple API
static GLOBAL_SERVICES: RwLock<Option<Arc<ExecutorServices>>> = RwLock::new(None);

pub fn init() -> Result<()> {
    init_with_config(ServicesConfig::default())
}

pub fn init_with_config(config: ServicesConfig) -> Result<()> {
    let mut services = GLOBAL_SERVICES.write();

    if services.is_some() {
        return Err(Error::AlreadyInitialized);
    }

    *services = Some(Arc::new(ExecutorServices::new(config)?));
    debug!("global executor services initialized");
    Ok(())
}

/// Shuts down and releases the global services. Threads are joined once
/// the last outstanding reference is dropped.
pub fn shutdown() {
    let services = GLOBAL_SERVICES.write().take();
    if let Some(services) = services {
        services.shutdown();
        debug!("global executor services shut down");
    }
}

pub fn current() -> Result<Arc<ExecutorServices>> {
    GLOBAL_SERVICES.read().clone().ok_or(Error::NotInitialized)
}

/// Fire-and-forget on the global context-propagating executor.
pub fn execute<F>(f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    current()?.executor().spawn(f)
}

pub fn submit<F, T>(f: F) -> Result<TaskHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    current()?.executor().submit(f)
}

pub fn schedule<F>(f: F, delay: Duration) -> Result<ScheduledHandle>
where
    F: FnOnce() + Send + 'static,
{
    current()?.scheduler().schedule(f, delay)
}
