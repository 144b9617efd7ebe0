use super::store::ContextStore;
use super::value::ContextValue;
use std::collections::HashMap;
use std::fmt;
use std::thread::{self, ThreadId};

/// Immutable, filtered copy of a thread's context taken at submission time.
///
/// Only propagatable values are kept; everything else is dropped without
/// notice. The snapshot owns its values, so later writes to the source
/// store never show up here.
#[derive(Clone)]
pub struct ContextSnapshot {
    entries: HashMap<String, ContextValue>,
    origin: ThreadId,
}

impl ContextSnapshot {
    pub fn capture(store: &dyn ContextStore) -> Self {
        Self::from_entries(store.get_all())
    }

    pub fn from_entries(entries: HashMap<String, ContextValue>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|(_, value)| value.is_propagatable())
            .collect();
        Self {
            entries,
            origin: thread::current().id(),
        }
    }

    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            origin: thread::current().id(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Thread that captured this snapshot.
    pub fn origin(&self) -> ThreadId {
        self.origin
    }

    pub fn to_map(&self) -> HashMap<String, ContextValue> {
        self.entries.clone()
    }
}

impl fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl PartialEq for ContextSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

/// Installs a snapshot into a store for the lifetime of the guard.
///
/// Entering clears the store before installing. Dropping clears it again,
/// also while unwinding. When the guard is entered on the thread that took
/// the snapshot (a caller-runs rejection), that thread's own context is
/// set aside on entry and put back on drop.
pub struct ContextScope<'a> {
    store: &'a dyn ContextStore,
    saved: Option<HashMap<String, ContextValue>>,
}

impl<'a> ContextScope<'a> {
    pub fn enter(store: &'a dyn ContextStore, snapshot: &ContextSnapshot) -> Self {
        let saved = if snapshot.origin() == thread::current().id() {
            Some(store.take_all())
        } else {
            store.clear();
            None
        };

        for (key, value) in snapshot.iter() {
            store.put(key.clone(), value.clone());
        }

        Self { store, saved }
    }
}

impl<'a> Drop for ContextScope<'a> {
    fn drop(&mut self) {
        self.store.clear();
        if let Some(saved) = self.saved.take() {
            for (key, value) in saved {
                self.store.put(key, value);
            }
        }
    }
}

impl<'a> fmt::Debug for ContextScope<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScope")
            .field("restores_caller", &self.saved.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::store::{self, ThreadLocalStore};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn test_capture_filters_disallowed() {
        store::clear();
        store::put("user", "alice");
        store::put("attempt", 3i32);
        store::put("session_obj", ContextValue::opaque(vec![1u8, 2, 3]));
        store::put("nothing", ContextValue::Null);

        let snapshot = ContextSnapshot::capture(&ThreadLocalStore);
        let mut keys: Vec<&str> = snapshot.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["attempt", "user"]);
        store::clear();
    }

    #[test]
    fn test_snapshot_unaffected_by_later_writes() {
        store::clear();
        store::put("user", "alice");
        let snapshot = ContextSnapshot::capture(&ThreadLocalStore);

        store::put("user", "mallory");
        store::put("extra", 1i32);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("user"), Some(&ContextValue::from("alice")));
        store::clear();
    }

    #[test]
    fn test_scope_clears_on_other_thread() {
        store::clear();
        store::put("user", "alice");
        let snapshot = ContextSnapshot::capture(&ThreadLocalStore);
        store::clear();

        std::thread::spawn(move || {
            store::put("stale", "left over");
            {
                let _scope = ContextScope::enter(&ThreadLocalStore, &snapshot);
                assert!(store::get("stale").is_none());
                assert_eq!(store::get("user"), Some(ContextValue::from("alice")));
            }
            assert!(store::is_empty());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_scope_clears_when_unwinding() {
        let snapshot = ContextSnapshot::from_entries(
            [("k".to_string(), ContextValue::from("v"))].into_iter().collect(),
        );

        std::thread::spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| {
                let _scope = ContextScope::enter(&ThreadLocalStore, &snapshot);
                panic!("boom");
            }));
            assert!(result.is_err());
            assert!(store::is_empty());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_scope_restores_on_origin_thread() {
        store::clear();
        store::put("user", "alice");
        store::put("session_obj", ContextValue::opaque(42u32));
        let snapshot = ContextSnapshot::capture(&ThreadLocalStore);

        {
            let _scope = ContextScope::enter(&ThreadLocalStore, &snapshot);
            assert_eq!(store::len(), 1);
        }

        assert_eq!(store::len(), 2);
        assert!(store::get("session_obj").is_some());
        store::clear();
    }
}
