//! Lookup symbols: the coarse identity used for sound invalidation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope assigned to a qualified name with no enclosing scope.
const ANONYMOUS_SCOPE: &str = "<anonymous>";

/// A `(name, scope)` pair identifying a lookup target.
///
/// `scope` is the enclosing qualified name with the symbol's own simple
/// name stripped. Two symbols are equal iff both fields match; this is
/// coarser than full type identity and intentionally conservative, so a
/// change to any declaration with the same name and scope invalidates
/// every recorded lookup of it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Symbol {
    /// The symbol's simple name.
    pub name: String,
    /// The enclosing qualified name, or `<anonymous>` if there is none.
    pub scope: String,
}

impl Symbol {
    /// Creates a symbol from its simple name and enclosing scope.
    pub fn new(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
        }
    }

    /// Splits a dot-separated qualified name into a symbol.
    ///
    /// The last segment becomes the name and the rest becomes the scope;
    /// a name without any dot gets the `<anonymous>` scope. This is how
    /// changed external symbols, reported as qualified name strings, are
    /// keyed into the lookup indices.
    pub fn from_qualified(qualified_name: &str) -> Self {
        match qualified_name.rsplit_once('.') {
            Some((scope, name)) => Self::new(name, scope),
            None => Self::new(qualified_name, ANONYMOUS_SCOPE),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.scope, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_qualified_splits_last_segment() {
        let sym = Symbol::from_qualified("com.example.Foo");
        assert_eq!(sym.name, "Foo");
        assert_eq!(sym.scope, "com.example");
    }

    #[test]
    fn from_qualified_nested() {
        let sym = Symbol::from_qualified("com.example.Outer.Inner");
        assert_eq!(sym.name, "Inner");
        assert_eq!(sym.scope, "com.example.Outer");
    }

    #[test]
    fn from_qualified_top_level_gets_anonymous_scope() {
        let sym = Symbol::from_qualified("TopLevel");
        assert_eq!(sym.name, "TopLevel");
        assert_eq!(sym.scope, "<anonymous>");
    }

    #[test]
    fn equality_needs_both_fields() {
        assert_eq!(Symbol::new("Foo", "a.b"), Symbol::new("Foo", "a.b"));
        assert_ne!(Symbol::new("Foo", "a.b"), Symbol::new("Foo", "a.c"));
        assert_ne!(Symbol::new("Foo", "a.b"), Symbol::new("Bar", "a.b"));
    }

    #[test]
    fn serde_roundtrip() {
        let sym = Symbol::new("Foo", "com.example");
        let json = serde_json::to_string(&sym).unwrap();
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(sym, back);
    }
}
