//! ctxpool - context-propagating executors
//!
//! Thread pools that carry a per-thread key/value context (user, token,
//! authentication, plain values) from the submitting thread into the task,
//! and remove it again once the task finishes, so pooled threads never leak
//! one task's context into the next.
//!
//! # Quick Start
//!
//! ```no_run
//! use ctxpool::prelude::*;
//!
//! ctxpool::init().unwrap();
//!
//! context::put("user", "alice");
//! let user = ctxpool::submit(|| context::get("user")).unwrap().join().unwrap();
//! assert_eq!(user, Some(ContextValue::from("alice")));
//!
//! ctxpool::shutdown();
//! ```
//!
//! # Features
//!
//! - **Context propagation**: filtered snapshot of the caller's context
//!   installed for the duration of each task
//! - **Bounded pools**: core/max sizing, keep-alive, queue capacity and
//!   rejection policies
//! - **Named threads**: `<prefix>-thread-<n>` with a monotonic counter
//! - **Scheduling**: delayed, fixed-rate and fixed-delay tasks

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod runtime;
pub mod scheduler;
mod util;

// Re-export key types at crate root
pub use config::{PoolConfig, PoolConfigBuilder, QueueCapacity, RejectionPolicy};
pub use context::{ContextSnapshot, ContextValue};
pub use error::{Error, Result};
pub use executor::{ContextExecutor, Executor, ExecutorExt, NamedThreadFactory, ThreadPool};
pub use runtime::{
    execute, init, init_with_config, schedule, shutdown, submit, ExecutorServices, ServicesConfig,
};
pub use scheduler::ScheduledRunner;
