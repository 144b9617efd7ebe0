//! Common imports.

pub use crate::config::{PoolConfig, QueueCapacity, RejectionPolicy};
pub use crate::context::{self, ContextScope, ContextSnapshot, ContextValue, EnumValue};
pub use crate::error::{Error, Result};
pub use crate::executor::{
    ContextExecutor, Executor, ExecutorExt, NamedThreadFactory, Task, TaskHandle, ThreadPool,
};
pub use crate::runtime::{ExecutorServices, ServicesConfig};
pub use crate::scheduler::{ScheduledHandle, ScheduledRunner};
pub use crate::{init, init_with_config, shutdown};
