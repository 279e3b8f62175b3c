//! The per-round incremental orchestrator.
//!
//! One [`IncrementalContext`] is created per processing round. It owns
//! every persisted index, computes the dirty set at round start, and
//! reconciles caches and outputs at round end. A round commits by
//! recreating the round marker after all mutations succeed; any error in
//! between leaves the marker absent, and the next round performs a full
//! rebuild. That fallback is the sole recovery mechanism; nothing is
//! retried.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use glyph_common::{OutputUnit, SourceUnit, Symbol};
use glyph_store::{RecursiveRelationStore, RelationStore, SnapshotStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::IncrementalError;
use crate::indexer::{collect_symbols, UnitDeclarations};
use crate::lookup::LookupIndex;
use crate::options::IncrementalOptions;
use crate::propagator::DirtinessPropagator;
use crate::report::{DirtySetReport, ReportWriter};

/// Zero-byte sentinel meaning "all indices are consistent with the
/// current output tree". Deleted before any mutation, recreated after
/// all of them succeed.
const ROUND_MARKER_FILE: &str = "caches.uptodate";

/// Subtree of the caches root mirroring the output root, byte for byte.
const BACKUPS_DIR: &str = "backups";

/// Orchestrates one incremental processing round.
///
/// The driver calls [`calc_dirty_files`](Self::calc_dirty_files) once at
/// round start, processes the returned units while recording lookups and
/// sealed queries, registers units generated mid-round, and finishes with
/// [`update_caches_and_outputs`](Self::update_caches_and_outputs). The
/// context owns its stores exclusively for the duration of the round.
pub struct IncrementalContext {
    options: IncrementalOptions,

    /// `options.modified` as a set, for membership tests.
    modified: BTreeSet<SourceUnit>,

    /// Symbols each unit exports. Persisted.
    symbols: SnapshotStore<SourceUnit, Symbol>,

    /// Sealed symbols whose subclasses were enumerated while processing
    /// each unit. Persisted.
    sealed: SnapshotStore<SourceUnit, Symbol>,

    /// Which outputs each source (or pseudo-source) produced. Outputs are
    /// keyed by their project-relative path so they can appear as keys
    /// themselves when a generated source produces further outputs.
    /// Persisted.
    source_to_outputs: SnapshotStore<SourceUnit, SourceUnit>,

    /// Lookups of symbols defined in processed sources. Persisted.
    symbol_lookups: LookupIndex,

    /// Lookups of symbols resolved against external compiled code.
    /// Persisted.
    class_lookups: LookupIndex,

    /// Symbols collected this round, merged into `symbols` at round end.
    updated_symbols: BTreeMap<SourceUnit, BTreeSet<Symbol>>,

    /// Sealed queries recorded this round, merged into `sealed` at round end.
    updated_sealed: BTreeMap<SourceUnit, BTreeSet<Symbol>>,

    marker_path: PathBuf,

    /// Marker was absent at construction: every index must be rebuilt
    /// from scratch this round.
    rebuild: bool,

    report: ReportWriter,
}

impl IncrementalContext {
    /// Opens all persisted stores under the caches root.
    ///
    /// If the round marker is present, a store file that fails validation
    /// is a consistency error and propagates. If the marker is absent the
    /// round is a full rebuild anyway, so corrupt store files are
    /// discarded and reopened empty.
    pub fn new(options: IncrementalOptions) -> Result<Self, IncrementalError> {
        let marker_path = options.caches_root.join(ROUND_MARKER_FILE);
        let rebuild = !marker_path.exists();

        let caches = &options.caches_root;
        let symbols = open_snapshot(caches.join("symbols.bin"), rebuild)?;
        let sealed = open_snapshot(caches.join("sealed.bin"), rebuild)?;
        let source_to_outputs = open_snapshot(caches.join("sourceToOutputs.bin"), rebuild)?;
        let symbol_lookups = open_lookup(caches.join("symbolLookups.bin"), rebuild)?;
        let class_lookups = open_lookup(caches.join("classLookups.bin"), rebuild)?;

        let report = ReportWriter::new(caches, options.verbose_reports);
        let modified = options.modified.iter().cloned().collect();

        Ok(Self {
            options,
            modified,
            symbols,
            sealed,
            source_to_outputs,
            symbol_lookups,
            class_lookups,
            updated_symbols: BTreeMap::new(),
            updated_sealed: BTreeMap::new(),
            marker_path,
            rebuild,
            report,
        })
    }

    /// Whether incremental mode is enabled.
    pub fn is_incremental(&self) -> bool {
        self.options.incremental
    }

    /// Records that `unit` looked up `symbol` during name resolution.
    ///
    /// `external` selects the index for symbols resolved against
    /// already-compiled code rather than processed sources.
    pub fn record_lookup(&mut self, unit: SourceUnit, symbol: Symbol, external: bool) {
        if !self.options.incremental {
            return;
        }
        if external {
            self.class_lookups.record(unit, symbol);
        } else {
            self.symbol_lookups.record(unit, symbol);
        }
    }

    /// Records that `unit` enumerated the subclasses of sealed `symbol`.
    pub fn record_sealed_query(&mut self, unit: SourceUnit, symbol: Symbol) {
        if !self.options.incremental {
            return;
        }
        self.updated_sealed.entry(unit).or_default().insert(symbol);
    }

    /// Computes the set of units that must be reprocessed this round.
    ///
    /// With the round marker absent this is all of them: the defined
    /// symbols of every unit are collected for first-time population and
    /// the full set is returned. Otherwise the seed set is built from the
    /// round's change inputs and propagated through the dependency graph;
    /// the result is intersected with units that still exist.
    pub fn calc_dirty_files(
        &mut self,
        units: &[UnitDeclarations],
    ) -> Result<BTreeSet<SourceUnit>, IncrementalError> {
        let all: BTreeSet<SourceUnit> = units.iter().map(|u| u.unit.clone()).collect();
        if !self.options.incremental {
            return Ok(all);
        }
        self.guarded(|ctx| ctx.calc_dirty_inner(units, all))
    }

    /// Indexes the defined symbols of units generated during this round,
    /// so they participate in later lookups. Incremental mode only.
    pub fn register_generated_files(&mut self, units: &[UnitDeclarations]) {
        if !self.options.incremental {
            return;
        }
        for unit in units {
            self.collect_defined(unit);
        }
    }

    /// Reconciles caches and outputs after processing.
    ///
    /// `dirty_units` are the units actually processed (the return of
    /// [`calc_dirty_files`](Self::calc_dirty_files)), `outputs` everything
    /// written this round, and `source_to_outputs` the source associations
    /// the processors declared. Commits by recreating the round marker.
    pub fn update_caches_and_outputs(
        &mut self,
        dirty_units: &BTreeSet<SourceUnit>,
        outputs: &BTreeSet<OutputUnit>,
        source_to_outputs: &BTreeMap<SourceUnit, BTreeSet<OutputUnit>>,
    ) -> Result<(), IncrementalError> {
        if !self.options.incremental {
            return Ok(());
        }
        self.guarded(|ctx| ctx.update_inner(dirty_units, outputs, source_to_outputs))
    }

    /// Runs `f`, and on error best-effort flushes and closes every open
    /// store before propagating, so on-disk files are left parseable. The
    /// round marker stays absent, forcing a full rebuild next round.
    fn guarded<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, IncrementalError>,
    ) -> Result<T, IncrementalError> {
        let result = f(self);
        if result.is_err() {
            let _ = self.symbols.close();
            let _ = self.sealed.close();
            let _ = self.source_to_outputs.close();
            let _ = self.symbol_lookups.close();
            let _ = self.class_lookups.close();
        }
        result
    }

    fn calc_dirty_inner(
        &mut self,
        units: &[UnitDeclarations],
        all: BTreeSet<SourceUnit>,
    ) -> Result<BTreeSet<SourceUnit>, IncrementalError> {
        if self.rebuild {
            for unit in units {
                self.collect_defined(unit);
            }
            let everything: Vec<SourceUnit> = all.iter().cloned().collect();
            self.report.dirty_set(&DirtySetReport {
                all: &everything,
                dirty: &everything,
                ..DirtySetReport::default()
            });
            return Ok(all);
        }

        // Newly defined symbols in modified units; also refreshes the
        // pending symbol entries merged at round end.
        let mut new_symbols: BTreeSet<Symbol> = BTreeSet::new();
        for unit in units.iter().filter(|u| self.modified.contains(&u.unit)) {
            let collected = collect_symbols(&unit.declarations);
            new_symbols.extend(collected.iter().cloned());
            self.updated_symbols
                .entry(unit.unit.clone())
                .or_default()
                .extend(collected);
        }

        let mut by_new_symbols: BTreeSet<SourceUnit> = BTreeSet::new();
        for symbol in &new_symbols {
            by_new_symbols.extend(self.symbol_lookups.units_for(symbol));
        }

        // Any unit that ever queried sealed subclasses is re-seeded on
        // every change; subclass provenance is untracked.
        let by_sealed: BTreeSet<SourceUnit> = self.sealed.keys().into_iter().collect();

        let mut by_external: BTreeSet<SourceUnit> = BTreeSet::new();
        for qualified in &self.options.changed_external {
            let symbol = Symbol::from_qualified(qualified);
            by_external.extend(self.class_lookups.units_for(&symbol));
            by_external.extend(self.symbol_lookups.units_for(&symbol));
        }

        // Outputs that existed two rounds ago but vanished by the last
        // one; their cleanup finishes this round.
        let removed_outputs: BTreeSet<SourceUnit> = self
            .source_to_outputs
            .get(&SourceUnit::removed_outputs_slot())
            .cloned()
            .unwrap_or_default();

        let no_source: BTreeSet<SourceUnit> = self
            .options
            .changed_external
            .iter()
            .map(|qualified| SourceUnit::no_source(qualified))
            .collect();

        let mut seed: BTreeSet<SourceUnit> = BTreeSet::new();
        seed.extend(self.modified.iter().cloned());
        seed.extend(self.options.removed.iter().cloned());
        seed.extend(removed_outputs.iter().cloned());
        seed.extend(by_external.iter().cloned());
        seed.extend(by_new_symbols.iter().cloned());
        seed.extend(by_sealed.iter().cloned());
        seed.extend(no_source.iter().cloned());

        // A modification can be seen as a removal plus an addition, so
        // the wildcard is seeded on any modification, not only new units.
        if !self.modified.is_empty() || !self.options.changed_external.is_empty() {
            seed.insert(SourceUnit::any_changes_wildcard());
        }

        let dirty = DirtinessPropagator::new(
            &self.symbols,
            self.symbol_lookups.store(),
            &self.source_to_outputs,
        )
        .propagate(&seed);

        self.purge_removed_outputs()?;

        let dirty_existing: BTreeSet<SourceUnit> = dirty.intersection(&all).cloned().collect();
        self.report.dirty_set(&DirtySetReport {
            all: &all.iter().cloned().collect::<Vec<_>>(),
            modified: &self.options.modified,
            removed: &self.options.removed,
            removed_outputs: &removed_outputs.iter().cloned().collect::<Vec<_>>(),
            by_external: &by_external.iter().cloned().collect::<Vec<_>>(),
            by_new_symbols: &by_new_symbols.iter().cloned().collect::<Vec<_>>(),
            by_sealed: &by_sealed.iter().cloned().collect::<Vec<_>>(),
            external_changes: &self.options.changed_external,
            dirty: &dirty_existing.iter().cloned().collect::<Vec<_>>(),
        });
        Ok(dirty_existing)
    }

    /// Finishes the cleanup of outputs that disappeared between the
    /// previous two rounds: their lookup, symbol, and sealed entries are
    /// purged and the slot is drained.
    fn purge_removed_outputs(&mut self) -> Result<(), IncrementalError> {
        let slot = SourceUnit::removed_outputs_slot();
        let Some(removed_outputs) = self.source_to_outputs.get(&slot).cloned() else {
            return Ok(());
        };

        self.symbol_lookups.remove_lookups_from(&removed_outputs)?;
        self.class_lookups.remove_lookups_from(&removed_outputs)?;
        for output in &removed_outputs {
            self.symbols.remove(output)?;
            self.sealed.remove(output)?;
        }
        self.source_to_outputs.remove_recursively(&slot)?;
        Ok(())
    }

    fn update_inner(
        &mut self,
        dirty_units: &BTreeSet<SourceUnit>,
        outputs: &BTreeSet<OutputUnit>,
        declared: &BTreeMap<SourceUnit, BTreeSet<OutputUnit>>,
    ) -> Result<(), IncrementalError> {
        // Crash window begins: the marker stays absent until every
        // mutation below has landed.
        self.delete_marker()?;

        // Bring outputs into the tracked project-relative namespace.
        let output_keys: BTreeMap<OutputUnit, SourceUnit> = outputs
            .iter()
            .map(|output| (output.clone(), self.output_key(output)))
            .collect();
        let declared_keys: BTreeMap<SourceUnit, BTreeSet<SourceUnit>> = declared
            .iter()
            .map(|(source, outs)| {
                let outs = outs.iter().map(|output| self.output_key(output)).collect();
                (source.clone(), outs)
            })
            .collect();

        // Outputs with no declared source are always dirty.
        let associated: BTreeSet<SourceUnit> = declared_keys.values().flatten().cloned().collect();
        let mut dirties: BTreeSet<SourceUnit> = output_keys
            .values()
            .filter(|key| !associated.contains(*key))
            .cloned()
            .collect();

        // Same-round grouping: everything reachable from a dirty source
        // through this round's declared associations is dirty too. This
        // guards against a processor only partially re-declaring a
        // multi-input output within the round.
        let mut work: Vec<SourceUnit> = vec![
            SourceUnit::any_changes_wildcard(),
            SourceUnit::removed_outputs_slot(),
        ];
        work.extend(dirty_units.iter().cloned());
        work.extend(declared_keys.keys().filter(|key| key.is_virtual()).cloned());
        let mut visited: BTreeSet<SourceUnit> = BTreeSet::new();
        while let Some(key) = work.pop() {
            if !visited.insert(key.clone()) {
                continue;
            }
            if let Some(outs) = declared_keys.get(&key) {
                work.extend(outs.iter().cloned());
            }
            dirties.insert(key);
        }

        let dirty_declared: BTreeMap<SourceUnit, BTreeSet<SourceUnit>> = declared_keys
            .iter()
            .filter(|(source, _)| dirties.contains(*source))
            .map(|(source, outs)| (source.clone(), outs.clone()))
            .collect();
        let dirty_outputs: BTreeSet<SourceUnit> = output_keys
            .values()
            .filter(|key| dirties.contains(*key))
            .cloned()
            .collect();

        // Outputs a dirty source produced last round but not this round
        // are gone; finish purging their indices next round.
        let mut old_outputs: BTreeSet<SourceUnit> = BTreeSet::new();
        for source in dirty_units {
            if let Some(outs) = self.source_to_outputs.get(source) {
                old_outputs.extend(outs.iter().cloned());
            }
        }
        let removed_outputs: BTreeSet<SourceUnit> =
            old_outputs.difference(&dirty_outputs).cloned().collect();

        self.update_source_to_outputs(dirty_units, &dirty_declared, &removed_outputs, &dirty_outputs)?;
        self.update_lookup_caches(dirty_units)?;
        self.update_symbol_caches()?;

        // Back up every output written this round, then restore clean
        // outputs the driver may have wiped before processing.
        for output in output_keys.keys() {
            self.backup_output(output)?;
        }
        let written: BTreeSet<SourceUnit> = output_keys.values().cloned().collect();
        let clean_outputs = self.clean_outputs(&dirties);
        for key in clean_outputs.difference(&written) {
            if let Some(output) = self.key_output(key) {
                self.restore_output(&output)?;
            }
        }

        // Commit.
        self.create_marker()
    }

    fn update_source_to_outputs(
        &mut self,
        dirty_units: &BTreeSet<SourceUnit>,
        dirty_declared: &BTreeMap<SourceUnit, BTreeSet<SourceUnit>>,
        removed_outputs: &BTreeSet<SourceUnit>,
        dirty_outputs: &BTreeSet<SourceUnit>,
    ) -> Result<(), IncrementalError> {
        for unit in &self.options.removed.clone() {
            self.source_to_outputs.remove_recursively(unit)?;
        }

        // Dirty sources that declared nothing this round produced nothing;
        // their old outputs (and anything those fed) are gone.
        for source in dirty_units {
            if !dirty_declared.contains_key(source) {
                self.source_to_outputs.remove_recursively(source)?;
            }
        }

        for output in removed_outputs {
            self.source_to_outputs.remove_recursively(output)?;
        }
        self.source_to_outputs
            .put(SourceUnit::removed_outputs_slot(), removed_outputs.clone())?;

        for (source, outs) in dirty_declared {
            self.source_to_outputs.put(source.clone(), outs.clone())?;
        }

        let accumulated: BTreeMap<SourceUnit, BTreeSet<SourceUnit>> = self
            .source_to_outputs
            .keys()
            .into_iter()
            .filter_map(|key| {
                let outs = self.source_to_outputs.get(&key)?.clone();
                Some((key, outs))
            })
            .collect();
        self.report
            .source_to_outputs(&accumulated, dirty_declared, dirty_outputs);

        // Closed here; the remaining backup/restore steps only read.
        self.source_to_outputs.close()?;
        Ok(())
    }

    fn update_lookup_caches(
        &mut self,
        dirty_units: &BTreeSet<SourceUnit>,
    ) -> Result<(), IncrementalError> {
        self.symbol_lookups.update(dirty_units, &self.options.removed)?;
        self.symbol_lookups.close()?;

        self.class_lookups.update(dirty_units, &self.options.removed)?;
        self.class_lookups.close()?;
        Ok(())
    }

    fn update_symbol_caches(&mut self) -> Result<(), IncrementalError> {
        if self.rebuild {
            for key in self.symbols.keys() {
                self.symbols.remove(&key)?;
            }
            for key in self.sealed.keys() {
                self.sealed.remove(&key)?;
            }
        }

        for (unit, symbols) in std::mem::take(&mut self.updated_symbols) {
            self.symbols.put(unit, symbols)?;
        }
        for (unit, symbols) in std::mem::take(&mut self.updated_sealed) {
            self.sealed.put(unit, symbols)?;
        }

        if !self.rebuild {
            for unit in &self.options.removed.clone() {
                self.symbols.remove(unit)?;
                self.sealed.remove(unit)?;
            }
        }

        self.symbols.close()?;
        self.sealed.close()?;
        Ok(())
    }

    /// Outputs of every source that stayed clean this round.
    fn clean_outputs(&self, dirties: &BTreeSet<SourceUnit>) -> BTreeSet<SourceUnit> {
        let mut clean: BTreeSet<SourceUnit> = BTreeSet::new();
        for source in self.source_to_outputs.keys() {
            if dirties.contains(&source) {
                continue;
            }
            if let Some(outs) = self.source_to_outputs.get(&source) {
                clean.extend(outs.iter().cloned());
            }
        }
        clean
    }

    fn collect_defined(&mut self, unit: &UnitDeclarations) {
        self.updated_symbols
            .entry(unit.unit.clone())
            .or_default()
            .extend(collect_symbols(&unit.declarations));
    }

    /// The project-relative path under which an output is tracked.
    fn output_key(&self, output: &OutputUnit) -> SourceUnit {
        SourceUnit::new(self.options.output_root.join(output.path()))
    }

    /// The inverse of [`output_key`](Self::output_key), when the key lies
    /// under the output root.
    fn key_output(&self, key: &SourceUnit) -> Option<OutputUnit> {
        key.path()
            .strip_prefix(&self.options.output_root)
            .ok()
            .map(|rel| OutputUnit::new(rel.to_path_buf()))
    }

    fn output_abs(&self, output: &OutputUnit) -> PathBuf {
        self.options
            .project_root
            .join(&self.options.output_root)
            .join(output.path())
    }

    fn backup_abs(&self, output: &OutputUnit) -> PathBuf {
        self.options
            .caches_root
            .join(BACKUPS_DIR)
            .join(output.path())
    }

    fn backup_output(&self, output: &OutputUnit) -> Result<(), IncrementalError> {
        copy_with_timestamp(&self.output_abs(output), &self.backup_abs(output))
    }

    fn restore_output(&self, output: &OutputUnit) -> Result<(), IncrementalError> {
        copy_with_timestamp(&self.backup_abs(output), &self.output_abs(output))
    }

    fn delete_marker(&self) -> Result<(), IncrementalError> {
        match std::fs::remove_file(&self.marker_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IncrementalError::io(self.marker_path.clone(), e)),
        }
    }

    fn create_marker(&self) -> Result<(), IncrementalError> {
        std::fs::create_dir_all(&self.options.caches_root)
            .map_err(|e| IncrementalError::io(self.options.caches_root.clone(), e))?;
        std::fs::write(&self.marker_path, b"")
            .map_err(|e| IncrementalError::io(self.marker_path.clone(), e))
    }
}

/// Opens a snapshot store, discarding a corrupt file when the round is a
/// full rebuild anyway.
fn open_snapshot<K, V>(path: PathBuf, rebuild: bool) -> Result<SnapshotStore<K, V>, StoreError>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
    V: Ord + Clone + Serialize + DeserializeOwned,
{
    match SnapshotStore::open(&path) {
        Err(StoreError::Corrupt { .. }) if rebuild => {
            let _ = std::fs::remove_file(&path);
            SnapshotStore::open(path)
        }
        other => other,
    }
}

fn open_lookup(path: PathBuf, rebuild: bool) -> Result<LookupIndex, StoreError> {
    match LookupIndex::open(&path) {
        Err(StoreError::Corrupt { .. }) if rebuild => {
            let _ = std::fs::remove_file(&path);
            LookupIndex::open(path)
        }
        other => other,
    }
}

/// Copies `from` to `to`, creating parent directories and carrying the
/// source's modification time over, so restored outputs do not look newer
/// than what downstream compilation already consumed.
fn copy_with_timestamp(from: &Path, to: &Path) -> Result<(), IncrementalError> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| IncrementalError::io(parent.to_path_buf(), e))?;
    }
    std::fs::copy(from, to).map_err(|e| IncrementalError::io(from.to_path_buf(), e))?;

    let mtime = std::fs::metadata(from)
        .and_then(|meta| meta.modified())
        .map_err(|e| IncrementalError::io(from.to_path_buf(), e))?;
    let file = std::fs::OpenOptions::new()
        .write(true)
        .open(to)
        .map_err(|e| IncrementalError::io(to.to_path_buf(), e))?;
    file.set_modified(mtime)
        .map_err(|e| IncrementalError::io(to.to_path_buf(), e))
}
