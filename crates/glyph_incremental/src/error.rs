//! Error type for round-level operations.

use std::path::PathBuf;

use glyph_store::StoreError;

/// Errors that abort a processing round.
///
/// There is no recoverable-error channel inside the engine: any failure
/// leaves the round marker absent, so the next round performs a full
/// rebuild. Before propagating, the orchestrator best-effort flushes and
/// closes all open stores to avoid corrupting their files.
#[derive(Debug, thiserror::Error)]
pub enum IncrementalError {
    /// A persisted store failed to open, mutate, or flush.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An I/O error occurred on the output tree, the backup mirror, or
    /// the round marker.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl IncrementalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
