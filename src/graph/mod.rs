//! The method-level call graph.
//!
//! A directed multigraph over [`MethodId`] nodes; each edge records the
//! syntactic call site, a dispatch kind, and a per-edge confidence used by
//! the coverage index. Within a node's successor list, edges are ordered
//! by `(target id, site file, site line, site col)` — query results are
//! deterministic regardless of build interleaving.

pub mod builder;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::symbols::MethodId;

pub use builder::GraphBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum CallKind {
    Direct,
    VirtualOrInterface,
    Extension,
    Constructor,
    DelegateInvoke,
    DynamicDispatch,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallSite {
    pub file: PathBuf,
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub site: CallSite,
    pub kind: CallKind,
    /// False when the target is an interface or abstract member whose
    /// concrete implementation could not be determined statically.
    pub resolved_concrete: bool,
    /// The receiver was traced to a mocking-framework proxy; the coverage
    /// index caps path confidence accordingly.
    pub via_mock: bool,
    /// Per-edge confidence contribution, fixed at build time.
    pub confidence: f64,
}

/// `G = (M, E)`: methods and call edges.
pub struct CallGraph {
    graph: DiGraph<MethodId, EdgeData>,
    nodes: HashMap<MethodId, NodeIndex>,
}

impl Default for CallGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CallGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, id: MethodId) -> NodeIndex {
        match self.nodes.get(&id) {
            Some(ix) => *ix,
            None => {
                let ix = self.graph.add_node(id.clone());
                self.nodes.insert(id, ix);
                ix
            }
        }
    }

    pub fn add_edge(&mut self, from: MethodId, to: MethodId, data: EdgeData) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        self.graph.add_edge(from, to, data);
    }

    pub fn contains_method(&self, id: &MethodId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All method ids, sorted.
    pub fn methods(&self) -> Vec<&MethodId> {
        let mut ids: Vec<&MethodId> = self.nodes.keys().collect();
        ids.sort();
        ids
    }

    /// Outgoing edges of `m` in canonical order.
    pub fn successors(&self, m: &MethodId) -> Vec<(&MethodId, &EdgeData)> {
        let Some(&ix) = self.nodes.get(m) else {
            return Vec::new();
        };
        let mut out: Vec<(&MethodId, &EdgeData)> = self
            .graph
            .edges_directed(ix, Direction::Outgoing)
            .map(|e| (&self.graph[e.target()], e.weight()))
            .collect();
        out.sort_by(|a, b| {
            (a.0, &a.1.site).cmp(&(b.0, &b.1.site))
        });
        out
    }

    /// Incoming edges of `m` in canonical order.
    pub fn predecessors(&self, m: &MethodId) -> Vec<(&MethodId, &EdgeData)> {
        let Some(&ix) = self.nodes.get(m) else {
            return Vec::new();
        };
        let mut out: Vec<(&MethodId, &EdgeData)> = self
            .graph
            .edges_directed(ix, Direction::Incoming)
            .map(|e| (&self.graph[e.source()], e.weight()))
            .collect();
        out.sort_by(|a, b| (a.0, &a.1.site).cmp(&(b.0, &b.1.site)));
        out
    }

    /// Every method reachable from `seed` within `max_depth` edges (the
    /// seed itself is not included). Cycles are fine: the visited set
    /// bounds the walk.
    pub fn reachable_from(&self, seed: &MethodId, max_depth: Option<usize>) -> BTreeSet<MethodId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((seed.clone(), 0usize));
        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for (next, _) in self.successors(&current) {
                if next != seed && seen.insert(next.clone()) {
                    queue.push_back((next.clone(), depth + 1));
                }
            }
        }
        seen
    }

    /// Enumerate walks from `from` to `to`, shortest first; ties broken by
    /// edge-confidence product, descending. Depth is bounded by
    /// `max_depth`; enumeration is capped at `max_paths` to keep cyclic
    /// graphs tractable.
    pub fn paths(
        &self,
        from: &MethodId,
        to: &MethodId,
        max_depth: usize,
        max_paths: usize,
    ) -> Vec<(Vec<MethodId>, f64)> {
        let mut found: Vec<(Vec<MethodId>, f64)> = Vec::new();
        // Breadth-first over partial walks; a node may repeat across
        // branches but not within one walk.
        let mut frontier: VecDeque<(Vec<MethodId>, f64)> = VecDeque::new();
        frontier.push_back((vec![from.clone()], 1.0));
        while let Some((walk, confidence)) = frontier.pop_front() {
            if found.len() >= max_paths {
                break;
            }
            if walk.len() > max_depth {
                continue;
            }
            let Some(last) = walk.last() else { continue };
            if last == to && walk.len() > 1 {
                found.push((walk, confidence));
                continue;
            }
            for (next, edge) in self.successors(last) {
                if walk.iter().any(|m| m == next) {
                    continue;
                }
                let mut extended = walk.clone();
                extended.push(next.clone());
                frontier.push_back((extended, confidence * edge.confidence));
            }
        }
        found.sort_by(|a, b| {
            a.0.len()
                .cmp(&b.0.len())
                .then(b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.0.cmp(&b.0))
        });
        found
    }
}
