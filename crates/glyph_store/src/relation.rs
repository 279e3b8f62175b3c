//! The persisted map-of-sets contract.

use std::collections::BTreeSet;

use crate::error::StoreError;

/// A persisted map from a key to an ordered set of values.
///
/// This is the storage seam of the engine: the propagator and the
/// orchestrator only ever talk to stores through this trait, so the
/// backing engine (snapshot files, an embedded KV store, in-memory maps
/// for tests) is swappable without touching the invalidation logic.
///
/// Mutations are applied in memory and persisted by [`flush`]; [`close`]
/// flushes and disables the store. Using a closed store is a logic error
/// reported as [`StoreError::Closed`].
///
/// [`flush`]: RelationStore::flush
/// [`close`]: RelationStore::close
pub trait RelationStore<K: Ord + Clone, V: Ord + Clone> {
    /// Returns the value set stored under `key`, if any.
    fn get(&self, key: &K) -> Option<&BTreeSet<V>>;

    /// Replaces the value set stored under `key`.
    fn put(&mut self, key: K, values: BTreeSet<V>) -> Result<(), StoreError>;

    /// Removes the entry for `key`. Removing an absent key is a no-op.
    fn remove(&mut self, key: &K) -> Result<(), StoreError>;

    /// Returns a snapshot of all keys currently present.
    fn keys(&self) -> Vec<K>;

    /// Persists the current contents.
    fn flush(&mut self) -> Result<(), StoreError>;

    /// Flushes and disables the store.
    fn close(&mut self) -> Result<(), StoreError>;

    /// Inserts a single value into the set stored under `key`.
    fn add(&mut self, key: K, value: V) -> Result<(), StoreError> {
        let mut values = self.get(&key).cloned().unwrap_or_default();
        values.insert(value);
        self.put(key, values)
    }
}

/// Cascading removal for stores whose values are further keys.
///
/// Removing a key also removes every key reachable through stored value
/// sets. The traversal keeps a visited set, so a store containing a cycle
/// (which a well-formed index never does) terminates instead of looping.
pub trait RecursiveRelationStore<K: Ord + Clone>: RelationStore<K, K> {
    /// Removes `key` and, recursively, every key reachable from its values.
    fn remove_recursively(&mut self, key: &K) -> Result<(), StoreError> {
        let mut visited: BTreeSet<K> = BTreeSet::new();
        let mut stack = vec![key.clone()];
        while let Some(k) = stack.pop() {
            if !visited.insert(k.clone()) {
                continue;
            }
            if let Some(values) = self.get(&k) {
                stack.extend(values.iter().cloned());
            }
            self.remove(&k)?;
        }
        Ok(())
    }
}

impl<K: Ord + Clone, S: RelationStore<K, K>> RecursiveRelationStore<K> for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn set<T: Ord>(values: impl IntoIterator<Item = T>) -> BTreeSet<T> {
        values.into_iter().collect()
    }

    #[test]
    fn add_appends_to_existing_set() {
        let mut store: MemoryStore<String, String> = MemoryStore::new();
        store.add("a".to_string(), "x".to_string()).unwrap();
        store.add("a".to_string(), "y".to_string()).unwrap();
        assert_eq!(store.get(&"a".to_string()).unwrap().len(), 2);
    }

    #[test]
    fn remove_recursively_follows_values() {
        let mut store: MemoryStore<String, String> = MemoryStore::new();
        store
            .put("src".to_string(), set(["out1".to_string(), "out2".to_string()]))
            .unwrap();
        store
            .put("out1".to_string(), set(["nested".to_string()]))
            .unwrap();
        store.put("other".to_string(), set(["kept".to_string()])).unwrap();

        store.remove_recursively(&"src".to_string()).unwrap();

        assert!(store.get(&"src".to_string()).is_none());
        assert!(store.get(&"out1".to_string()).is_none());
        assert!(store.get(&"other".to_string()).is_some());
    }

    #[test]
    fn remove_recursively_terminates_on_cycle() {
        let mut store: MemoryStore<String, String> = MemoryStore::new();
        store.put("a".to_string(), set(["b".to_string()])).unwrap();
        store.put("b".to_string(), set(["a".to_string()])).unwrap();

        store.remove_recursively(&"a".to_string()).unwrap();
        assert!(store.keys().is_empty());
    }

    #[test]
    fn remove_recursively_absent_key_is_noop() {
        let mut store: MemoryStore<String, String> = MemoryStore::new();
        store.remove_recursively(&"missing".to_string()).unwrap();
        assert!(store.keys().is_empty());
    }
}
