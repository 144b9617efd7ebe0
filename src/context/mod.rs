//! Per-thread context values and the snapshots that carry them across
//! executor boundaries.
//!
//! Application code writes request-scoped values with [`put`] and reads them
//! with [`get`]. When a task is handed to a
//! [`ContextExecutor`](crate::executor::ContextExecutor), the propagatable
//! subset is captured as a [`ContextSnapshot`] and installed on the worker
//! for the duration of the task.

pub mod security;
pub mod snapshot;
pub mod store;
pub mod value;

pub use security::{Authentication, Permission, TokenState, User, UserToken};
pub use snapshot::{ContextScope, ContextSnapshot};
pub use store::{clear, get, get_all, is_empty, len, put, remove, ContextStore, ThreadLocalStore};
pub use value::{ContextEnum, ContextValue, EnumValue};
