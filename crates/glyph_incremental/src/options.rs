//! Driver-supplied configuration for a processing round.

use std::path::PathBuf;

use glyph_common::SourceUnit;

/// Configuration handed to [`IncrementalContext`](crate::IncrementalContext)
/// by the processing driver.
///
/// The modified/removed unit lists and the changed external symbol names
/// come from whatever change tracking the driver has; drivers without one
/// can compute the unit lists with [`ChangeDetector`](crate::ChangeDetector).
#[derive(Debug, Clone)]
pub struct IncrementalOptions {
    /// Absolute path of the project root. All [`SourceUnit`] paths are
    /// relative to it.
    pub project_root: PathBuf,

    /// Path of the output root, relative to the project root. Generated
    /// outputs live under it and are tracked in the indices under their
    /// project-relative path.
    pub output_root: PathBuf,

    /// Absolute path of the caches root: persisted stores, the round
    /// marker, the backup mirror, and report logs live here.
    pub caches_root: PathBuf,

    /// Whether incremental processing is enabled. When `false`, every
    /// round processes everything and no caches are touched.
    pub incremental: bool,

    /// Write plain-text dirty-set and source-to-outputs reports under
    /// `<caches_root>/logs/`.
    pub verbose_reports: bool,

    /// Units modified since the previous round.
    pub modified: Vec<SourceUnit>,

    /// Units removed since the previous round.
    pub removed: Vec<SourceUnit>,

    /// Fully qualified names of externally compiled symbols that changed
    /// since the previous round (classpath changes).
    pub changed_external: Vec<String>,
}

impl IncrementalOptions {
    /// Creates options with incremental mode on, no verbose reports, and
    /// empty change lists.
    pub fn new(
        project_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        caches_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            output_root: output_root.into(),
            caches_root: caches_root.into(),
            incremental: true,
            verbose_reports: false,
            modified: Vec::new(),
            removed: Vec::new(),
            changed_external: Vec::new(),
        }
    }

    /// Sets the units modified since the previous round.
    pub fn with_modified(mut self, modified: Vec<SourceUnit>) -> Self {
        self.modified = modified;
        self
    }

    /// Sets the units removed since the previous round.
    pub fn with_removed(mut self, removed: Vec<SourceUnit>) -> Self {
        self.removed = removed;
        self
    }

    /// Sets the changed external symbol names.
    pub fn with_changed_external(mut self, changed: Vec<String>) -> Self {
        self.changed_external = changed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = IncrementalOptions::new("/proj", "build/generated", "/proj/.glyph");
        assert!(opts.incremental);
        assert!(!opts.verbose_reports);
        assert!(opts.modified.is_empty());
        assert!(opts.removed.is_empty());
        assert!(opts.changed_external.is_empty());
    }

    #[test]
    fn builders() {
        let opts = IncrementalOptions::new("/proj", "gen", "/caches")
            .with_modified(vec![SourceUnit::new("a.kt")])
            .with_removed(vec![SourceUnit::new("b.kt")])
            .with_changed_external(vec!["com.example.Ext".to_string()]);
        assert_eq!(opts.modified.len(), 1);
        assert_eq!(opts.removed.len(), 1);
        assert_eq!(opts.changed_external.len(), 1);
    }
}
