//! Data shared by every hook in a pipeline run.

use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Mutable key/value store shared by reference across one run.
///
/// Cloning yields another handle to the same data, so a value written by an
/// early hook is visible to every later one, including `finalize` hooks of
/// an aborting run. Hooks run one at a time, so the lock is never contended;
/// it exists only to make the handle `Send + Sync`.
#[derive(Clone, Debug)]
pub struct PipelineContext {
    run_id: Uuid,
    data: Arc<Mutex<Map<String, Value>>>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::with_data(Map::new())
    }

    /// Seed the context before a run.
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            data: Arc::new(Mutex::new(data)),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.lock().insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    /// Apply a change to a single entry in place.
    pub fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(&mut Value),
    {
        let mut data = self.lock();
        let entry = data.entry(key.to_string()).or_insert(Value::Null);
        f(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current data.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        // A hook that panicked mid-write leaves plain JSON behind; keep going.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
