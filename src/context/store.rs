//! Per-thread context store.

use super::value::ContextValue;
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static CONTEXT: RefCell<HashMap<String, ContextValue>> = RefCell::new(HashMap::new());
}

/// Access to the context of whichever thread calls it.
///
/// Executors capture through this trait so an application can plug in its
/// own storage; [`ThreadLocalStore`] is the default.
pub trait ContextStore: Send + Sync + 'static {
    /// Copy of every entry visible to the calling thread.
    fn get_all(&self) -> HashMap<String, ContextValue>;

    /// Removes every entry visible to the calling thread.
    fn clear(&self);

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: String, value: ContextValue);

    /// Removes and returns everything in the store.
    fn take_all(&self) -> HashMap<String, ContextValue> {
        let all = self.get_all();
        self.clear();
        all
    }
}

/// The process-wide `thread_local!` store behind [`put`], [`get`] and friends.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLocalStore;

impl ContextStore for ThreadLocalStore {
    fn get_all(&self) -> HashMap<String, ContextValue> {
        get_all()
    }

    fn clear(&self) {
        clear();
    }

    fn put(&self, key: String, value: ContextValue) {
        CONTEXT.with(|ctx| {
            ctx.borrow_mut().insert(key, value);
        });
    }

    fn take_all(&self) -> HashMap<String, ContextValue> {
        CONTEXT.with(|ctx| std::mem::take(&mut *ctx.borrow_mut()))
    }
}

/// Stores `value` under `key` in the current thread's context, returning
/// the previous value.
pub fn put<K, V>(key: K, value: V) -> Option<ContextValue>
where
    K: Into<String>,
    V: Into<ContextValue>,
{
    CONTEXT.with(|ctx| ctx.borrow_mut().insert(key.into(), value.into()))
}

pub fn get(key: &str) -> Option<ContextValue> {
    CONTEXT.with(|ctx| ctx.borrow().get(key).cloned())
}

pub fn remove(key: &str) -> Option<ContextValue> {
    CONTEXT.with(|ctx| ctx.borrow_mut().remove(key))
}

pub fn get_all() -> HashMap<String, ContextValue> {
    CONTEXT.with(|ctx| ctx.borrow().clone())
}

pub fn clear() {
    CONTEXT.with(|ctx| ctx.borrow_mut().clear());
}

pub fn len() -> usize {
    CONTEXT.with(|ctx| ctx.borrow().len())
}

pub fn is_empty() -> bool {
    len() == 0
}
