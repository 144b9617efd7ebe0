use crate::error::{Error, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Environment prefix read by [`PoolConfig::from_env`].
pub const ENV_PREFIX: &str = "CTXPOOL_EXECUTOR_";

/// What to do with a task when every thread is busy and the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionPolicy {
    /// Run the task on the submitting thread.
    CallerRuns,
    /// Drop the task without telling anyone.
    Discard,
    /// Drop the oldest queued task and enqueue this one.
    DiscardOldest,
    /// Fail the submission with [`Error::Rejected`].
    Abort,
}

impl Default for RejectionPolicy {
    fn default() -> Self {
        RejectionPolicy::Abort
    }
}

impl fmt::Display for RejectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionPolicy::CallerRuns => "caller-runs",
            RejectionPolicy::Discard => "discard",
            RejectionPolicy::DiscardOldest => "discard-oldest",
            RejectionPolicy::Abort => "abort",
        };
        f.write_str(s)
    }
}

impl FromStr for RejectionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "caller-runs" => Ok(RejectionPolicy::CallerRuns),
            "discard" => Ok(RejectionPolicy::Discard),
            "discard-oldest" => Ok(RejectionPolicy::DiscardOldest),
            "abort" => Ok(RejectionPolicy::Abort),
            other => Err(Error::config(format!("unknown rejection policy '{}'", other))),
        }
    }
}

/// Capacity of the pool's task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueCapacity {
    /// At most this many queued tasks; must be at least 1.
    Bounded(usize),
    Unbounded,
}

impl QueueCapacity {
    pub(crate) fn has_room(&self, len: usize) -> bool {
        match self {
            QueueCapacity::Bounded(cap) => len < *cap,
            QueueCapacity::Unbounded => true,
        }
    }
}

impl Default for QueueCapacity {
    fn default() -> Self {
        QueueCapacity::Unbounded
    }
}

impl fmt::Display for QueueCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueCapacity::Bounded(n) => write!(f, "{}", n),
            QueueCapacity::Unbounded => f.write_str("unbounded"),
        }
    }
}

impl FromStr for QueueCapacity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(QueueCapacity::Unbounded);
        }
        s.parse::<usize>()
            .map(QueueCapacity::Bounded)
            .map_err(|_| Error::config(format!("invalid queue capacity '{}'", s)))
    }
}

/// Sizing and behaviour of a [`ThreadPool`](crate::executor::ThreadPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Threads kept alive even when idle.
    pub core_pool_size: usize,
    /// Upper bound on threads; extra ones start only once the queue is full.
    pub max_pool_size: usize,
    /// How long a thread above the core size may stay idle.
    pub keep_alive: Duration,
    pub queue_capacity: QueueCapacity,
    pub rejection_policy: RejectionPolicy,
    /// Lets core threads time out after `keep_alive` too.
    pub allow_core_thread_timeout: bool,
    /// Threads are named `"<prefix>-thread-<n>"`.
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let cpus = num_cpus::get();
        Self {
            core_pool_size: cpus,
            max_pool_size: cpus,
            keep_alive: Duration::from_secs(60),
            queue_capacity: QueueCapacity::Unbounded,
            rejection_policy: RejectionPolicy::Abort,
            allow_core_thread_timeout: false,
            thread_name_prefix: "ctxpool".to_string(),
            stack_size: None,
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// Loads the config from `CTXPOOL_EXECUTOR_*` environment variables.
    ///
    /// # Environment Variables
    /// - `CORE_POOL_SIZE` - threads kept alive when idle (default: cpu count)
    /// - `MAX_POOL_SIZE` - upper bound on threads (default: core size)
    /// - `KEEP_ALIVE_SECONDS` - idle time before an extra thread exits (default: 60)
    /// - `QUEUE_CAPACITY` - a number or `unbounded` (default: unbounded)
    /// - `REJECTION_POLICY` - `caller-runs`, `discard`, `discard-oldest` or `abort`
    /// - `ALLOW_CORE_THREAD_TIMEOUT` - `true`/`false` (default: false)
    /// - `THREAD_NAME_PREFIX` - thread name prefix (default: `ctxpool`)
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    pub fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        Self::from_lookup(|key| env::var(format!("{}{}", prefix, key)).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to
    /// defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = PoolConfig::default();
        let mut max_set = false;

        if let Some(v) = lookup("CORE_POOL_SIZE") {
            config.core_pool_size = parse_number("CORE_POOL_SIZE", &v)?;
        }
        if let Some(v) = lookup("MAX_POOL_SIZE") {
            config.max_pool_size = parse_number("MAX_POOL_SIZE", &v)?;
            max_set = true;
        }
        if !max_set {
            config.max_pool_size = config.max_pool_size.max(config.core_pool_size);
        }
        if let Some(v) = lookup("KEEP_ALIVE_SECONDS") {
            config.keep_alive = Duration::from_secs(parse_number("KEEP_ALIVE_SECONDS", &v)?);
        }
        if let Some(v) = lookup("QUEUE_CAPACITY") {
            config.queue_capacity = v.parse()?;
        }
        if let Some(v) = lookup("REJECTION_POLICY") {
            config.rejection_policy = v.parse()?;
        }
        if let Some(v) = lookup("ALLOW_CORE_THREAD_TIMEOUT") {
            config.allow_core_thread_timeout = v
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("invalid ALLOW_CORE_THREAD_TIMEOUT '{}'", v)))?;
        }
        if let Some(v) = lookup("THREAD_NAME_PREFIX") {
            config.thread_name_prefix = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pool_size == 0 {
            return Err(Error::config("max_pool_size must be > 0"));
        }
        if self.core_pool_size > self.max_pool_size {
            return Err(Error::config(format!(
                "core_pool_size ({}) exceeds max_pool_size ({})",
                self.core_pool_size, self.max_pool_size
            )));
        }
        if self.queue_capacity == QueueCapacity::Bounded(0) {
            return Err(Error::config("bounded queue capacity must be > 0"));
        }
        if self.allow_core_thread_timeout && self.keep_alive.is_zero() {
            return Err(Error::config(
                "keep_alive must be > 0 when core threads may time out",
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("invalid {} '{}'", key, value)))
}

#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
    max_set: bool,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            max_set: false,
        }
    }

    pub fn core_pool_size(mut self, n: usize) -> Self {
        self.config.core_pool_size = n;
        self
    }

    pub fn max_pool_size(mut self, n: usize) -> Self {
        self.config.max_pool_size = n;
        self.max_set = true;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = QueueCapacity::Bounded(capacity);
        self
    }

    pub fn unbounded_queue(mut self) -> Self {
        self.config.queue_capacity = QueueCapacity::Unbounded;
        self
    }

    pub fn rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.config.rejection_policy = policy;
        self
    }

    pub fn allow_core_thread_timeout(mut self, allow: bool) -> Self {
        self.config.allow_core_thread_timeout = allow;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Validates and returns the config. An unset max size follows the
    /// core size upward.
    pub fn build(mut self) -> Result<PoolConfig> {
        if !self.max_set {
            self.config.max_pool_size = self.config.max_pool_size.max(self.config.core_pool_size);
        }
        self.config.validate()?;
        Ok(self.config)
    }
}
