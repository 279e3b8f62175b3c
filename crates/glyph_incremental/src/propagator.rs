//! Dirtiness propagation over the persisted dependency graph.

use std::collections::{BTreeSet, HashMap};

use glyph_common::{SourceUnit, Symbol};
use glyph_store::RelationStore;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

/// A node in the propagation graph.
///
/// Path nodes cover both source units and tracked outputs: outputs are
/// indexed under their project-relative paths, so an output that is
/// itself consumed as a generated source is one node, not two.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
enum Node {
    Path(SourceUnit),
    Symbol(Symbol),
}

/// Graph reachability from a seed set of units to the final dirty set.
///
/// The graph is materialized once per propagation from the persisted
/// indices, with four edge kinds:
///
/// 1. unit → each symbol it defines,
/// 2. symbol → each unit that recorded a lookup of it,
/// 3. unit → each output it produced last round,
/// 4. output → each unit that co-produced it (the reverse of 3, built
///    from all non-wildcard, non-removed-slot entries).
///
/// Edge 4 exists because if two units jointly produce one output,
/// invalidating one must force reprocessing of the other, or the output
/// would be rebuilt from a stale partial input set. Node visitation is
/// memoized by the DFS, so propagation is linear in the stored edges and
/// terminates even with cycles.
pub struct DirtinessPropagator {
    graph: DiGraph<Node, ()>,
    ids: HashMap<Node, NodeIndex>,
}

impl DirtinessPropagator {
    /// Builds the propagation graph from the persisted indices.
    pub fn new(
        defined_symbols: &dyn RelationStore<SourceUnit, Symbol>,
        lookups: &dyn RelationStore<Symbol, SourceUnit>,
        source_to_outputs: &dyn RelationStore<SourceUnit, SourceUnit>,
    ) -> Self {
        let mut propagator = Self {
            graph: DiGraph::new(),
            ids: HashMap::new(),
        };

        for unit in defined_symbols.keys() {
            if let Some(symbols) = defined_symbols.get(&unit) {
                for symbol in symbols {
                    propagator.edge(Node::Path(unit.clone()), Node::Symbol(symbol.clone()));
                }
            }
        }

        for symbol in lookups.keys() {
            if let Some(units) = lookups.get(&symbol) {
                for unit in units {
                    propagator.edge(Node::Symbol(symbol.clone()), Node::Path(unit.clone()));
                }
            }
        }

        let wildcard = SourceUnit::any_changes_wildcard();
        let removed_slot = SourceUnit::removed_outputs_slot();
        for source in source_to_outputs.keys() {
            if let Some(outputs) = source_to_outputs.get(&source) {
                for output in outputs {
                    propagator.edge(Node::Path(source.clone()), Node::Path(output.clone()));
                    if source != wildcard && source != removed_slot {
                        propagator.edge(Node::Path(output.clone()), Node::Path(source.clone()));
                    }
                }
            }
        }

        propagator
    }

    /// Computes everything reachable from `seed`, returned as path nodes.
    ///
    /// The caller intersects the result with units that still exist. An
    /// empty seed yields an empty result; seed units with no edges are
    /// still part of the result.
    pub fn propagate(&mut self, seed: &BTreeSet<SourceUnit>) -> BTreeSet<SourceUnit> {
        let roots: Vec<NodeIndex> = seed
            .iter()
            .map(|unit| self.intern(Node::Path(unit.clone())))
            .collect();

        let mut visited = BTreeSet::new();
        let mut dfs = Dfs::empty(&self.graph);
        for root in roots {
            dfs.move_to(root);
            while let Some(idx) = dfs.next(&self.graph) {
                if let Node::Path(unit) = &self.graph[idx] {
                    visited.insert(unit.clone());
                }
            }
        }
        visited
    }

    fn intern(&mut self, node: Node) -> NodeIndex {
        if let Some(&idx) = self.ids.get(&node) {
            return idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.ids.insert(node, idx);
        idx
    }

    fn edge(&mut self, from: Node, to: Node) {
        let from = self.intern(from);
        let to = self.intern(to);
        self.graph.update_edge(from, to, ());
    }
}
