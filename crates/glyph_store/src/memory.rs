//! In-memory relation store backend.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::StoreError;
use crate::relation::RelationStore;

/// A relation store with no persistence.
///
/// Used in tests and wherever the engine should run without touching
/// disk. `flush` is a no-op; `close` only disables further use.
#[derive(Debug, Default)]
pub struct MemoryStore<K, V> {
    map: BTreeMap<K, BTreeSet<V>>,
    closed: bool,
}

impl<K: Ord + Clone, V: Ord + Clone> MemoryStore<K, V> {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed {
                path: std::path::PathBuf::from("<memory>"),
            });
        }
        Ok(())
    }
}

impl<K: Ord + Clone, V: Ord + Clone> RelationStore<K, V> for MemoryStore<K, V> {
    fn get(&self, key: &K) -> Option<&BTreeSet<V>> {
        self.map.get(key)
    }

    fn put(&mut self, key: K, values: BTreeSet<V>) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.map.insert(key, values);
        Ok(())
    }

    fn remove(&mut self, key: &K) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.map.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<K> {
        self.map.keys().cloned().collect()
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove() {
        let mut store: MemoryStore<u32, u32> = MemoryStore::new();
        store.put(1, [10, 20].into_iter().collect()).unwrap();
        assert_eq!(store.get(&1).unwrap().len(), 2);
        store.remove(&1).unwrap();
        assert!(store.get(&1).is_none());
    }

    #[test]
    fn keys_are_sorted() {
        let mut store: MemoryStore<u32, u32> = MemoryStore::new();
        store.put(3, BTreeSet::new()).unwrap();
        store.put(1, BTreeSet::new()).unwrap();
        store.put(2, BTreeSet::new()).unwrap();
        assert_eq!(store.keys(), vec![1, 2, 3]);
    }

    #[test]
    fn use_after_close_errors() {
        let mut store: MemoryStore<u32, u32> = MemoryStore::new();
        store.close().unwrap();
        let err = store.put(1, BTreeSet::new()).unwrap_err();
        assert!(matches!(err, StoreError::Closed { .. }));
    }
}
