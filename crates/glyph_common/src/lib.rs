//! Shared foundational types for the glyph incremental processing engine.
//!
//! This crate provides the identities tracked across processing rounds
//! (source units, output units, lookup symbols), content hashing for change
//! detection, and the minimal declaration-tree model handed over by the
//! resolver.

#![warn(missing_docs)]

pub mod decl;
pub mod hash;
pub mod symbol;
pub mod unit;

pub use decl::{Declaration, DeclarationKind};
pub use hash::ContentHash;
pub use symbol::Symbol;
pub use unit::{OutputUnit, SourceUnit};
