//! Dedup set of recorded broadcast values

use std::collections::HashSet;

use parking_lot::RwLock;

use flood_core::Value;

/// Every distinct value this node has recorded. Membership only grows.
#[derive(Debug, Default)]
pub struct SeenSet {
    values: RwLock<HashSet<Value>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, value: Value) -> bool {
        self.values.read().contains(&value)
    }

    /// Idempotent insert
    pub fn insert(&self, value: Value) {
        self.values.write().insert(value);
    }

    /// Check-then-insert under a single write lock.
    ///
    /// Runs `on_novel` while the lock is still held, only when `value` was not
    /// present, and returns its result. Returns `None` for a repeat.
    pub fn record_then<R>(&self, value: Value, on_novel: impl FnOnce() -> R) -> Option<R> {
        let mut values = self.values.write();
        if !values.insert(value) {
            return None;
        }
        Some(on_novel())
    }

    /// All recorded values, in no particular order
    pub fn snapshot(&self) -> Vec<Value> {
        self.values.read().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}
