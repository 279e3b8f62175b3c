//! Minimal declaration-tree model handed over by the resolver.
//!
//! The full declaration/type API lives outside this engine; the indexer
//! only needs enough structure to enumerate externally visible symbols.
//! The resolver lowers each source unit into a list of [`Declaration`]s
//! carrying names, visibility, and nesting.

use serde::{Deserialize, Serialize};

/// Whether a declaration is a container of further declarations or a
/// function body.
///
/// Declarations inside a function body are local and invisible to other
/// units, so symbol collection never descends into functions.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum DeclarationKind {
    /// A class, interface, object, or other container whose nested
    /// declarations are externally addressable.
    Container,
    /// A function; its children are local declarations.
    Function,
}

/// One node of a source unit's declaration tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Declaration {
    /// Container or function.
    pub kind: DeclarationKind,
    /// The declaration's simple name.
    pub simple_name: String,
    /// The fully qualified name, if one can be derived. Declarations
    /// without one cannot be looked up externally and are skipped by the
    /// indexer.
    pub qualified_name: Option<String>,
    /// Private-equivalent visibility; private declarations export nothing.
    pub private: bool,
    /// Nested declarations.
    pub children: Vec<Declaration>,
}

impl Declaration {
    /// Creates a public container declaration with a qualified name.
    pub fn container(simple_name: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        Self {
            kind: DeclarationKind::Container,
            simple_name: simple_name.into(),
            qualified_name: Some(qualified_name.into()),
            private: false,
            children: Vec::new(),
        }
    }

    /// Creates a public function declaration with a qualified name.
    pub fn function(simple_name: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        Self {
            kind: DeclarationKind::Function,
            simple_name: simple_name.into(),
            qualified_name: Some(qualified_name.into()),
            private: false,
            children: Vec::new(),
        }
    }

    /// Marks this declaration private.
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Removes the qualified name, e.g. for anonymous declarations.
    pub fn unqualified(mut self) -> Self {
        self.qualified_name = None;
        self
    }

    /// Attaches nested declarations.
    pub fn with_children(mut self, children: Vec<Declaration>) -> Self {
        self.children = children;
        self
    }
}
