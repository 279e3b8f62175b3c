//! Identities for tracked inputs and generated outputs.
//!
//! A [`SourceUnit`] is one processable input, identified by its path
//! relative to the project root. An [`OutputUnit`] is one generated
//! artifact, identified by its path relative to the output root. A few
//! reserved virtual paths act as pseudo-units wired into the dependency
//! indices: the any-changes wildcard, the removed-outputs slot, and
//! placeholders for externally changed symbols with no source.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Virtual path of the any-changes wildcard unit.
const ANY_CHANGES_PATH: &str = "<AnyChanges is a virtual unit; DO NOT USE.>";

/// Virtual path of the slot holding outputs that disappeared last round.
const REMOVED_OUTPUTS_PATH: &str = "<This is a virtual key for removed outputs; DO NOT USE.>";

/// One processable input, identified by its path relative to the project root.
///
/// Units may cease to exist between rounds; index entries keyed by a
/// removed unit are purged at the next round end.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SourceUnit(PathBuf);

impl SourceUnit {
    /// Creates a unit from a path relative to the project root.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// The wildcard pseudo-unit: outputs associated with it depend on any
    /// change whatsoever and are regenerated whenever anything changed.
    pub fn any_changes_wildcard() -> Self {
        Self(PathBuf::from(ANY_CHANGES_PATH))
    }

    /// The pseudo-unit under which outputs that disappeared between the
    /// previous two rounds are stashed, so their cleanup can finish one
    /// round late.
    pub fn removed_outputs_slot() -> Self {
        Self(PathBuf::from(REMOVED_OUTPUTS_PATH))
    }

    /// A placeholder unit for an externally changed symbol that has no
    /// source representation in this project.
    pub fn no_source(qualified_name: &str) -> Self {
        Self(PathBuf::from(format!(
            "<NoSource for {qualified_name} is a virtual unit; DO NOT USE.>"
        )))
    }

    /// Returns `true` for the reserved virtual units.
    pub fn is_virtual(&self) -> bool {
        self.0
            .to_str()
            .is_some_and(|s| s.starts_with('<') && s.ends_with('>'))
    }

    /// The unit's path relative to the project root.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// One generated artifact, identified by its path relative to the output root.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct OutputUnit(PathBuf);

impl OutputUnit {
    /// Creates an output from a path relative to the output root.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// The output's path relative to the output root.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for OutputUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_units_are_distinct() {
        assert_ne!(
            SourceUnit::any_changes_wildcard(),
            SourceUnit::removed_outputs_slot()
        );
        assert_ne!(
            SourceUnit::no_source("com.example.Foo"),
            SourceUnit::no_source("com.example.Bar")
        );
    }

    #[test]
    fn virtual_units_are_flagged() {
        assert!(SourceUnit::any_changes_wildcard().is_virtual());
        assert!(SourceUnit::removed_outputs_slot().is_virtual());
        assert!(SourceUnit::no_source("a.B").is_virtual());
        assert!(!SourceUnit::new("src/main.kt").is_virtual());
    }

    #[test]
    fn ordering_is_by_path() {
        let a = SourceUnit::new("a.kt");
        let b = SourceUnit::new("b.kt");
        assert!(a < b);
    }

    #[test]
    fn serde_roundtrip() {
        let unit = SourceUnit::new("pkg/File.kt");
        let json = serde_json::to_string(&unit).unwrap();
        let back: SourceUnit = serde_json::from_str(&json).unwrap();
        assert_eq!(unit, back);

        let out = OutputUnit::new("gen/FileGen.kt");
        let json = serde_json::to_string(&out).unwrap();
        let back: OutputUnit = serde_json::from_str(&json).unwrap();
        assert_eq!(out, back);
    }
}
