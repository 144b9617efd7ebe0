//! Delayed and periodic task execution.
//!
//! Independent of the context-propagating executor: nothing is captured
//! from the scheduling thread or installed for the task.

mod queue;
pub mod runner;

pub use runner::{ScheduledHandle, ScheduledRunner, PARALLELISM_MULTIPLIER};
