//! Symbol collection over a source unit's declaration tree.

use std::collections::BTreeSet;

use glyph_common::{Declaration, DeclarationKind, SourceUnit, Symbol};

/// A source unit together with its top-level declarations, as lowered by
/// the (out-of-scope) resolver.
#[derive(Debug, Clone)]
pub struct UnitDeclarations {
    /// The unit's identity.
    pub unit: SourceUnit,
    /// The unit's top-level declarations.
    pub declarations: Vec<Declaration>,
}

impl UnitDeclarations {
    /// Pairs a unit with its declarations.
    pub fn new(unit: SourceUnit, declarations: Vec<Declaration>) -> Self {
        Self { unit, declarations }
    }
}

/// Collects every externally visible symbol a declaration tree defines.
///
/// Private declarations export nothing. Declarations without a derivable
/// qualified name cannot be looked up externally and are skipped, but
/// their children are still visited. Function bodies are never entered:
/// local declarations are invisible to other units.
///
/// Every contributed symbol is `(simple_name, qualified_name with the
/// simple name stripped)` — the coarse identity the lookup indices key on.
pub fn collect_symbols(declarations: &[Declaration]) -> BTreeSet<Symbol> {
    let mut symbols = BTreeSet::new();
    let mut stack: Vec<&Declaration> = declarations.iter().collect();

    while let Some(decl) = stack.pop() {
        if decl.private {
            continue;
        }

        if let Some(qualified) = &decl.qualified_name {
            let name = &decl.simple_name;
            // The resolver does not guarantee that the qualified name is
            // `scope.simple_name`; anything else gets an empty scope.
            let scope = qualified
                .strip_suffix(name.as_str())
                .map(|prefix| prefix.strip_suffix('.').unwrap_or(prefix))
                .unwrap_or_default();
            symbols.insert(Symbol::new(name.clone(), scope.to_string()));
        }

        if decl.kind != DeclarationKind::Function {
            stack.extend(decl.children.iter());
        }
    }

    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_yields_empty_set() {
        assert!(collect_symbols(&[]).is_empty());
    }

    #[test]
    fn top_level_container() {
        let decls = vec![Declaration::container("Foo", "com.example.Foo")];
        let symbols = collect_symbols(&decls);
        assert_eq!(symbols.len(), 1);
        assert!(symbols.contains(&Symbol::new("Foo", "com.example")));
    }

    #[test]
    fn nested_declarations_are_scoped_to_their_container() {
        let decls = vec![Declaration::container("Outer", "com.example.Outer")
            .with_children(vec![
                Declaration::container("Inner", "com.example.Outer.Inner"),
                Declaration::function("method", "com.example.Outer.method"),
            ])];
        let symbols = collect_symbols(&decls);
        assert_eq!(symbols.len(), 3);
        assert!(symbols.contains(&Symbol::new("Outer", "com.example")));
        assert!(symbols.contains(&Symbol::new("Inner", "com.example.Outer")));
        assert!(symbols.contains(&Symbol::new("method", "com.example.Outer")));
    }

    #[test]
    fn function_bodies_are_not_entered() {
        let decls = vec![Declaration::function("run", "com.example.run").with_children(vec![
            Declaration::container("Local", "com.example.run.Local"),
        ])];
        let symbols = collect_symbols(&decls);
        assert_eq!(symbols.len(), 1);
        assert!(symbols.contains(&Symbol::new("run", "com.example")));
    }

    #[test]
    fn private_declarations_are_skipped_entirely() {
        let decls = vec![
            Declaration::container("Hidden", "com.example.Hidden")
                .private()
                .with_children(vec![Declaration::container(
                    "Nested",
                    "com.example.Hidden.Nested",
                )]),
            Declaration::container("Visible", "com.example.Visible"),
        ];
        let symbols = collect_symbols(&decls);
        assert_eq!(symbols.len(), 1);
        assert!(symbols.contains(&Symbol::new("Visible", "com.example")));
    }

    #[test]
    fn unqualified_declaration_is_skipped_but_children_visited() {
        let decls = vec![Declaration::container("anon", "x")
            .unqualified()
            .with_children(vec![Declaration::container("Child", "pkg.Child")])];
        let symbols = collect_symbols(&decls);
        assert_eq!(symbols.len(), 1);
        assert!(symbols.contains(&Symbol::new("Child", "pkg")));
    }

    #[test]
    fn top_level_name_without_package_gets_empty_scope() {
        let decls = vec![Declaration::container("Root", "Root")];
        let symbols = collect_symbols(&decls);
        assert!(symbols.contains(&Symbol::new("Root", "")));
    }

    #[test]
    fn degenerate_qualified_names_still_produce_symbols() {
        // No dot before the simple name, with a multi-byte character
        // right where naive slicing would cut.
        let decls = vec![Declaration::container("b", "αb")];
        let symbols = collect_symbols(&decls);
        assert!(symbols.contains(&Symbol::new("b", "α")));

        // Simple name not a suffix of the qualified name at all.
        let decls = vec![Declaration::container("X", "com.example.Y")];
        let symbols = collect_symbols(&decls);
        assert!(symbols.contains(&Symbol::new("X", "")));
    }

    #[test]
    fn multibyte_package_names_are_scoped_normally() {
        let decls = vec![Declaration::container("Gräf", "com.exämple.Gräf")];
        let symbols = collect_symbols(&decls);
        assert!(symbols.contains(&Symbol::new("Gräf", "com.exämple")));
    }
}
