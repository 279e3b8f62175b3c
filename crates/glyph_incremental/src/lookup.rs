//! Persisted inverted lookup indices.
//!
//! Whenever name resolution consults a symbol, the resolver records the
//! looking-up unit against that symbol. Records accumulate in memory
//! during a round and are merged into the persisted store at round end:
//! entries referencing dirty or removed units are pruned first, then the
//! round's records are inserted. Two independent instances exist, one for
//! symbols resolved against other processed units and one for symbols
//! resolved against already-compiled external code.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use glyph_common::{SourceUnit, Symbol};
use glyph_store::{RelationStore, SnapshotStore, StoreError};

/// One inverted index mapping `Symbol -> set of referencing source units`.
pub struct LookupIndex {
    store: SnapshotStore<Symbol, SourceUnit>,
    pending: BTreeMap<Symbol, BTreeSet<SourceUnit>>,
}

impl LookupIndex {
    /// Opens the index backed by the snapshot file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self {
            store: SnapshotStore::open(path)?,
            pending: BTreeMap::new(),
        })
    }

    /// Records that `unit` looked up `symbol` during this round.
    ///
    /// Append-only within a round; no bound on fan-out. A hot symbol may
    /// accumulate many referencing units, which is expected.
    pub fn record(&mut self, unit: SourceUnit, symbol: Symbol) {
        self.pending.entry(symbol).or_default().insert(unit);
    }

    /// Returns the persisted set of units that looked up `symbol`.
    ///
    /// Records from the current round are not visible until
    /// [`update`](Self::update) merges them.
    pub fn units_for(&self, symbol: &Symbol) -> BTreeSet<SourceUnit> {
        self.store.get(symbol).cloned().unwrap_or_default()
    }

    /// Merges this round's records into the persisted index.
    ///
    /// Every entry is first pruned of units in `dirty` or `removed` (their
    /// previous lookups are superseded or gone), then the recorded
    /// lookups are inserted.
    pub fn update(
        &mut self,
        dirty: &BTreeSet<SourceUnit>,
        removed: &[SourceUnit],
    ) -> Result<(), StoreError> {
        let mut stale: BTreeSet<SourceUnit> = dirty.clone();
        stale.extend(removed.iter().cloned());
        self.prune(&stale)?;

        for (symbol, units) in std::mem::take(&mut self.pending) {
            let mut merged = self.store.get(&symbol).cloned().unwrap_or_default();
            merged.extend(units);
            self.store.put(symbol, merged)?;
        }
        Ok(())
    }

    /// Prunes the given units from every entry, dropping entries that
    /// become empty. Used when previously generated outputs disappear.
    pub fn remove_lookups_from(&mut self, units: &BTreeSet<SourceUnit>) -> Result<(), StoreError> {
        self.prune(units)
    }

    fn prune(&mut self, units: &BTreeSet<SourceUnit>) -> Result<(), StoreError> {
        for symbol in self.store.keys() {
            let Some(current) = self.store.get(&symbol) else {
                continue;
            };
            if current.is_disjoint(units) {
                continue;
            }
            let remaining: BTreeSet<SourceUnit> = current.difference(units).cloned().collect();
            if remaining.is_empty() {
                self.store.remove(&symbol)?;
            } else {
                self.store.put(symbol, remaining)?;
            }
        }
        Ok(())
    }

    /// Persists the index.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.store.flush()
    }

    /// Flushes and disables the index.
    pub fn close(&mut self) -> Result<(), StoreError> {
        self.store.close()
    }

    /// The underlying relation store, for graph construction.
    pub(crate) fn store(&self) -> &dyn RelationStore<Symbol, SourceUnit> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_index(dir: &tempfile::TempDir) -> LookupIndex {
        LookupIndex::open(dir.path().join("symbolLookups.bin")).unwrap()
    }

    #[test]
    fn records_are_invisible_until_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = open_index(&dir);
        let sym = Symbol::new("Foo", "p");

        index.record(SourceUnit::new("b.kt"), sym.clone());
        assert!(index.units_for(&sym).is_empty());

        index.update(&BTreeSet::new(), &[]).unwrap();
        assert_eq!(index.units_for(&sym).len(), 1);
    }

    #[test]
    fn update_prunes_dirty_units_before_merging() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = open_index(&dir);
        let sym = Symbol::new("Foo", "p");

        index.record(SourceUnit::new("a.kt"), sym.clone());
        index.record(SourceUnit::new("b.kt"), sym.clone());
        index.update(&BTreeSet::new(), &[]).unwrap();

        // a.kt is reprocessed and this time only records a different symbol.
        let other = Symbol::new("Bar", "p");
        index.record(SourceUnit::new("a.kt"), other.clone());
        let dirty: BTreeSet<SourceUnit> = [SourceUnit::new("a.kt")].into_iter().collect();
        index.update(&dirty, &[]).unwrap();

        assert_eq!(
            index.units_for(&sym),
            [SourceUnit::new("b.kt")].into_iter().collect()
        );
        assert_eq!(
            index.units_for(&other),
            [SourceUnit::new("a.kt")].into_iter().collect()
        );
    }

    #[test]
    fn update_prunes_removed_units() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = open_index(&dir);
        let sym = Symbol::new("Foo", "p");

        index.record(SourceUnit::new("gone.kt"), sym.clone());
        index.update(&BTreeSet::new(), &[]).unwrap();

        index
            .update(&BTreeSet::new(), &[SourceUnit::new("gone.kt")])
            .unwrap();
        assert!(index.units_for(&sym).is_empty());
    }

    #[test]
    fn remove_lookups_from_drops_emptied_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = open_index(&dir);
        let sym = Symbol::new("Foo", "p");

        index.record(SourceUnit::new("gen/Out.kt"), sym.clone());
        index.update(&BTreeSet::new(), &[]).unwrap();

        let gone: BTreeSet<SourceUnit> = [SourceUnit::new("gen/Out.kt")].into_iter().collect();
        index.remove_lookups_from(&gone).unwrap();
        assert!(index.store().keys().is_empty());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let sym = Symbol::new("Foo", "p");

        {
            let mut index = open_index(&dir);
            index.record(SourceUnit::new("a.kt"), sym.clone());
            index.update(&BTreeSet::new(), &[]).unwrap();
            index.close().unwrap();
        }

        let index = open_index(&dir);
        assert_eq!(index.units_for(&sym).len(), 1);
    }
}
