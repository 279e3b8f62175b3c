//! Plain-text diagnostic reports.
//!
//! When verbose reporting is enabled, each round appends a dirty-set
//! report and a source-to-outputs report under `<caches>/logs/`. The
//! reports are purely observational and never read back, so write
//! failures are ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use glyph_common::SourceUnit;

/// Name of the dirty-set report file.
const DIRTY_SET_LOG: &str = "dirty_set.log";

/// Name of the source-to-outputs report file.
const SOURCE_TO_OUTPUTS_LOG: &str = "source_to_outputs.log";

/// Inputs to the dirty-set report, grouped by how each unit was seeded.
#[derive(Debug, Default)]
pub struct DirtySetReport<'a> {
    /// All units offered this round.
    pub all: &'a [SourceUnit],
    /// Units modified since the previous round.
    pub modified: &'a [SourceUnit],
    /// Units removed since the previous round.
    pub removed: &'a [SourceUnit],
    /// Outputs that disappeared between the previous two rounds.
    pub removed_outputs: &'a [SourceUnit],
    /// Units seeded by changed external symbols.
    pub by_external: &'a [SourceUnit],
    /// Units seeded by newly collected symbols.
    pub by_new_symbols: &'a [SourceUnit],
    /// Units seeded by sealed queries.
    pub by_sealed: &'a [SourceUnit],
    /// Changed external symbol names.
    pub external_changes: &'a [String],
    /// The final dirty set.
    pub dirty: &'a [SourceUnit],
}

/// Appends per-round report sections to the log files.
pub struct ReportWriter {
    logs_dir: PathBuf,
    enabled: bool,
    round_stamp: u128,
}

impl ReportWriter {
    /// Creates a writer that appends under `<caches_root>/logs/` when
    /// `enabled`, and does nothing otherwise.
    pub fn new(caches_root: &std::path::Path, enabled: bool) -> Self {
        let round_stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Self {
            logs_dir: caches_root.join("logs"),
            enabled,
            round_stamp,
        }
    }

    /// Appends the dirty-set report for this round.
    pub fn dirty_set(&self, report: &DirtySetReport<'_>) {
        if !self.enabled {
            return;
        }

        let mut text = String::new();
        let _ = writeln!(text, "=== Round {} ===", self.round_stamp);
        Self::section(&mut text, "All units", report.all.iter());
        Self::section(&mut text, "Modified", report.modified.iter());
        Self::section(&mut text, "Removed", report.removed.iter());
        Self::section(&mut text, "Disappeared outputs", report.removed_outputs.iter());
        Self::section(&mut text, "Affected by external", report.by_external.iter());
        Self::section(&mut text, "Affected by new symbols", report.by_new_symbols.iter());
        Self::section(&mut text, "Affected by sealed", report.by_sealed.iter());
        Self::section(&mut text, "External changes", report.external_changes.iter());
        Self::section(&mut text, "Dirty", report.dirty.iter());
        let percentage = if report.all.is_empty() {
            100.0
        } else {
            report.dirty.len() as f64 / report.all.len() as f64 * 100.0
        };
        let _ = writeln!(text, "Dirty / all: {percentage:.2}%\n");

        self.append(DIRTY_SET_LOG, &text);
    }

    /// Appends the source-to-outputs report for this round.
    pub fn source_to_outputs(
        &self,
        accumulated: &BTreeMap<SourceUnit, BTreeSet<SourceUnit>>,
        this_round: &BTreeMap<SourceUnit, BTreeSet<SourceUnit>>,
        outputs: &BTreeSet<SourceUnit>,
    ) {
        if !self.enabled {
            return;
        }

        let mut text = String::new();
        let _ = writeln!(text, "=== Round {} ===", self.round_stamp);

        let _ = writeln!(text, "Accumulated source-to-outputs map");
        for (source, outs) in accumulated {
            let _ = writeln!(text, "  {source}:");
            for out in outs {
                let _ = writeln!(text, "    {out}");
            }
        }

        let _ = writeln!(text, "Reprocessed sources and their outputs");
        for (source, outs) in this_round {
            let _ = writeln!(text, "  {source}:");
            for out in outs {
                let _ = writeln!(text, "    {out}");
            }
        }

        // Can be larger than the union of the above; some outputs have no
        // declared source.
        let _ = writeln!(text, "All reprocessed outputs");
        for out in outputs {
            let _ = writeln!(text, "  {out}");
        }
        text.push('\n');

        self.append(SOURCE_TO_OUTPUTS_LOG, &text);
    }

    fn section<T: std::fmt::Display>(text: &mut String, title: &str, items: impl Iterator<Item = T>) {
        let _ = writeln!(text, "{title}");
        for item in items {
            let _ = writeln!(text, "  {item}");
        }
    }

    fn append(&self, file_name: &str, text: &str) {
        // Observational only; errors are intentionally dropped.
        if std::fs::create_dir_all(&self.logs_dir).is_err() {
            return;
        }
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.logs_dir.join(file_name))
        {
            let _ = file.write_all(text.as_bytes());
        }
    }
}
