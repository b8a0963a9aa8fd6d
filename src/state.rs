//! Per-test key-value state.
//!
//! Paths are dotted (`user.profile.tier`). A trailing `[]` on the last
//! segment (`cart.items[]`) appends to the array at that key, creating it if
//! needed. Writes through a denylisted segment are dropped.

use crate::safe_path;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Stores one nested JSON object per test id.
pub trait StateStore: Send + Sync {
    /// Write `value` at `path`.
    fn set(&self, test_id: &str, path: &str, value: Value);

    /// Write every entry of `partial`; keys are paths as for [`StateStore::set`].
    fn merge(&self, test_id: &str, partial: &Map<String, Value>) {
        for (path, value) in partial {
            self.set(test_id, path, value.clone());
        }
    }

    /// Read the value at a dotted path.
    fn get(&self, test_id: &str, key: &str) -> Option<Value>;

    /// Snapshot of the whole state object (empty object if never written).
    fn get_all(&self, test_id: &str) -> Value;

    /// Drop all state for `test_id`.
    fn reset(&self, test_id: &str);
}

/// In-memory state store.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    tests: Mutex<HashMap<String, Map<String, Value>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Map<String, Value>>> {
        self.tests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for InMemoryStateStore {
    fn set(&self, test_id: &str, path: &str, value: Value) {
        let mut tests = self.lock();
        let root = tests.entry(test_id.to_string()).or_default();
        set_path(root, path, value);
    }

    fn merge(&self, test_id: &str, partial: &Map<String, Value>) {
        let mut tests = self.lock();
        let root = tests.entry(test_id.to_string()).or_default();
        for (path, value) in partial {
            set_path(root, path, value.clone());
        }
    }

    fn get(&self, test_id: &str, key: &str) -> Option<Value> {
        let tests = self.lock();
        let root = tests.get(test_id)?;
        let mut segments = key.split('.');
        let first = segments.next()?;
        if safe_path::is_dangerous(first) {
            return None;
        }
        safe_path::walk(root.get(first)?, segments).cloned()
    }

    fn get_all(&self, test_id: &str) -> Value {
        Value::Object(self.lock().get(test_id).cloned().unwrap_or_default())
    }

    fn reset(&self, test_id: &str) {
        self.lock().remove(test_id);
    }
}

/// Write `value` into `root` at `path`. Returns false if the write was dropped.
pub fn set_path(root: &mut Map<String, Value>, path: &str, value: Value) -> bool {
    let (path, append) = match path.strip_suffix("[]") {
        Some(stripped) => (stripped, true),
        None => (path, false),
    };

    let segments: Vec<&str> = path.split('.').collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || safe_path::is_dangerous(s))
    {
        return false;
    }

    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = root;
    for segment in parents {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return false;
        };
        current = next;
    }

    if append {
        match current.get_mut(*last) {
            Some(Value::Array(items)) => items.push(value),
            _ => {
                current.insert(last.to_string(), Value::Array(vec![value]));
            }
        }
    } else {
        current.insert(last.to_string(), value);
    }
    true
}
