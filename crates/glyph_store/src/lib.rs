//! Persisted map-of-sets storage for the glyph incremental engine.
//!
//! Every cross-round index (defined symbols, lookups, source-to-outputs)
//! is a map from a key to an ordered set of values. This crate provides
//! that contract as the [`RelationStore`] trait plus two backends: a
//! snapshot file store with a validated binary header, and an in-memory
//! store for tests and embedding.

#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod relation;
pub mod snapshot;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use relation::{RecursiveRelationStore, RelationStore};
pub use snapshot::SnapshotStore;
