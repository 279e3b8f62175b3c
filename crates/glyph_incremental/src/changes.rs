//! Content-hash based change detection.
//!
//! The engine itself is told which units were modified or removed; this
//! module computes those lists for drivers that have no change tracking
//! of their own. Hashes from the previous round are kept in a JSON
//! manifest under the caches root, compared against freshly computed
//! hashes, and committed after a successful round.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use glyph_common::{ContentHash, SourceUnit};

use crate::error::IncrementalError;

/// Name of the hash manifest file within the caches root.
const MANIFEST_FILE: &str = "unit_hashes.json";

/// Result of comparing current unit hashes against the recorded manifest.
///
/// All lists are sorted for deterministic output.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Units not present in the manifest.
    pub new: Vec<SourceUnit>,

    /// Units whose content hash differs from the manifest.
    pub modified: Vec<SourceUnit>,

    /// Units present in the manifest but not in the current set.
    pub removed: Vec<SourceUnit>,

    /// Units whose content hash matches the manifest.
    pub unchanged: Vec<SourceUnit>,
}

impl ChangeSet {
    /// Returns `true` if nothing is new, modified, or removed.
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// New and modified units together: the `modified` input the
    /// orchestrator expects. (New units behave like modifications of a
    /// unit never seen before.)
    pub fn modified_units(&self) -> Vec<SourceUnit> {
        let mut units = self.new.clone();
        units.extend(self.modified.iter().cloned());
        units.sort();
        units
    }
}

/// Detects changed units by content hash.
pub struct ChangeDetector {
    manifest_path: PathBuf,
    recorded: BTreeMap<SourceUnit, ContentHash>,
}

impl ChangeDetector {
    /// Loads the hash manifest from the caches root.
    ///
    /// A missing or unparsable manifest yields an empty detector, which
    /// reports every unit as new. That is fail-safe: over-reporting
    /// changes only costs reprocessing.
    pub fn load(caches_root: &Path) -> Self {
        let manifest_path = caches_root.join(MANIFEST_FILE);
        let recorded = std::fs::read_to_string(&manifest_path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        Self {
            manifest_path,
            recorded,
        }
    }

    /// Hashes each unit's file under `project_root` and compares against
    /// the manifest.
    ///
    /// Units whose file cannot be read are reported as removed.
    pub fn detect(&self, project_root: &Path, units: &BTreeSet<SourceUnit>) -> ChangeSet {
        let mut changes = ChangeSet::default();

        for unit in units {
            let opened = std::fs::File::open(project_root.join(unit.path()))
                .and_then(ContentHash::from_reader);
            let Ok(hash) = opened else {
                changes.removed.push(unit.clone());
                continue;
            };
            match self.recorded.get(unit) {
                None => changes.new.push(unit.clone()),
                Some(recorded) if *recorded == hash => changes.unchanged.push(unit.clone()),
                Some(_) => changes.modified.push(unit.clone()),
            }
        }

        for unit in self.recorded.keys() {
            if !units.contains(unit) {
                changes.removed.push(unit.clone());
            }
        }

        changes.removed.sort();
        changes.removed.dedup();
        changes
    }

    /// Rehashes the given units and saves the manifest.
    ///
    /// Call after a committed round so the next round diffs against the
    /// processed content.
    pub fn commit(
        &mut self,
        project_root: &Path,
        units: &BTreeSet<SourceUnit>,
    ) -> Result<(), IncrementalError> {
        let mut recorded = BTreeMap::new();
        for unit in units {
            let path = project_root.join(unit.path());
            let hash = std::fs::File::open(&path)
                .and_then(ContentHash::from_reader)
                .map_err(|e| IncrementalError::io(path.clone(), e))?;
            recorded.insert(unit.clone(), hash);
        }
        self.recorded = recorded;

        if let Some(parent) = self.manifest_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| IncrementalError::io(parent.to_path_buf(), e))?;
        }
        let json = serde_json::to_string_pretty(&self.recorded).map_err(|e| {
            IncrementalError::io(
                self.manifest_path.clone(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        std::fs::write(&self.manifest_path, json)
            .map_err(|e| IncrementalError::io(self.manifest_path.clone(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_unit(root: &Path, rel: &str, content: &str) -> SourceUnit {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
        SourceUnit::new(rel)
    }

    #[test]
    fn fresh_detector_reports_everything_new() {
        let dir = tempfile::tempdir().unwrap();
        let unit = write_unit(dir.path(), "a.kt", "class A");
        let detector = ChangeDetector::load(&dir.path().join("caches"));

        let changes = detector.detect(dir.path(), &[unit.clone()].into_iter().collect());
        assert_eq!(changes.new, vec![unit]);
        assert!(!changes.is_empty());
    }

    #[test]
    fn committed_hashes_make_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let caches = dir.path().join("caches");
        let unit = write_unit(dir.path(), "a.kt", "class A");
        let units: BTreeSet<SourceUnit> = [unit.clone()].into_iter().collect();

        let mut detector = ChangeDetector::load(&caches);
        detector.commit(dir.path(), &units).unwrap();

        let detector = ChangeDetector::load(&caches);
        let changes = detector.detect(dir.path(), &units);
        assert!(changes.is_empty());
        assert_eq!(changes.unchanged, vec![unit]);
    }

    #[test]
    fn modified_and_removed_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        let caches = dir.path().join("caches");
        let a = write_unit(dir.path(), "a.kt", "class A");
        let b = write_unit(dir.path(), "b.kt", "class B");
        let units: BTreeSet<SourceUnit> = [a.clone(), b.clone()].into_iter().collect();

        let mut detector = ChangeDetector::load(&caches);
        detector.commit(dir.path(), &units).unwrap();

        write_unit(dir.path(), "a.kt", "class A2");
        let detector = ChangeDetector::load(&caches);
        let changes = detector.detect(dir.path(), &[a.clone()].into_iter().collect());
        assert_eq!(changes.modified, vec![a]);
        assert_eq!(changes.removed, vec![b]);
    }

    #[test]
    fn modified_units_merges_new_and_modified() {
        let changes = ChangeSet {
            new: vec![SourceUnit::new("n.kt")],
            modified: vec![SourceUnit::new("m.kt")],
            removed: vec![],
            unchanged: vec![],
        };
        assert_eq!(
            changes.modified_units(),
            vec![SourceUnit::new("m.kt"), SourceUnit::new("n.kt")]
        );
    }

    #[test]
    fn corrupt_manifest_is_fail_safe() {
        let dir = tempfile::tempdir().unwrap();
        let caches = dir.path().join("caches");
        std::fs::create_dir_all(&caches).unwrap();
        std::fs::write(caches.join(MANIFEST_FILE), "{{{not json").unwrap();

        let unit = write_unit(dir.path(), "a.kt", "class A");
        let detector = ChangeDetector::load(&caches);
        let changes = detector.detect(dir.path(), &[unit].into_iter().collect());
        assert_eq!(changes.new.len(), 1);
    }
}
