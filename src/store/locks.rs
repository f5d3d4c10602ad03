use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// One mutex per document id, created on demand and dropped once unused.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    table: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`. Calls for different keys
    /// never block each other.
    pub fn with_lock<T>(&self, key: Uuid, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut table = self.table.lock().expect("lock table poisoned");
            table.entry(key).or_default().clone()
        };

        let result = {
            // The guarded value is `()`, so a poisoned lock carries no broken state.
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f()
        };

        let mut table = self.table.lock().expect("lock table poisoned");
        // Clones are only handed out under the table lock: table + ours means idle.
        if Arc::strong_count(&lock) == 2 {
            table.remove(&key);
        }
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().expect("lock table poisoned").len()
    }
}
