//! Incremental recomputation engine for symbol processing.
//!
//! Given the source units that changed since the previous round, this
//! crate computes the minimal-but-sound set of units that must be
//! reprocessed, and reconciles previously generated outputs so unaffected
//! ones are restored rather than regenerated. Invalidation is
//! deliberately conservative: the engine never under-invalidates, at the
//! cost of occasionally reprocessing more than strictly necessary.
//!
//! The driver calls [`IncrementalContext::calc_dirty_files`] at round
//! start, runs processing on the returned units (recording lookups and
//! sealed-subclass queries as resolution happens), then calls
//! [`IncrementalContext::update_caches_and_outputs`] with the outputs it
//! actually wrote. All cross-round state lives in persisted stores under
//! a caches root; a round either commits (round marker recreated) or is
//! discarded wholesale, in which case the next round rebuilds from
//! scratch.

#![warn(missing_docs)]

pub mod changes;
pub mod context;
pub mod error;
pub mod indexer;
pub mod lookup;
pub mod options;
pub mod propagator;
pub mod report;

pub use changes::{ChangeDetector, ChangeSet};
pub use context::IncrementalContext;
pub use error::IncrementalError;
pub use indexer::UnitDeclarations;
pub use lookup::LookupIndex;
pub use options::IncrementalOptions;
pub use propagator::DirtinessPropagator;
