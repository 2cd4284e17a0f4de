//! The in-memory code graph: nodes, edges, and the adjacency structure the
//! graph engine and MUQL planner read from.

pub mod edge;
pub mod node;

pub use edge::{Edge, EdgeKind, EdgeProperties};
pub use node::{Node, NodeKind, Parameter, Properties};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Internal petgraph handle. Never exposed outside this module — all public
/// APIs operate on `Node::id` strings, per SPEC_FULL.md §9 ("use arena-and-
/// index style ... rather than direct references").
pub type NodeIdx = NodeIndex;

/// Maps old node ids (in a merged-in graph) to themselves — merging by stable
/// string id never needs remapping, unlike the teacher's `NodeIndex`-keyed
/// graph, but the concept (successor-graph join) is kept as `merge`.
pub type MergeMap = HashMap<String, String>;

/// The in-memory code graph: a `petgraph::DiGraph` of nodes and edges, plus
/// a stable-id index so callers never have to deal with petgraph's
/// `NodeIndex` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeGraph {
    graph: DiGraph<Node, Edge>,
    by_id: HashMap<String, NodeIdx>,
    root_path: PathBuf,
    /// Bumped on every structural mutation; the graph engine and any derived
    /// view compares this against the epoch that was current when they were
    /// built to detect staleness (SPEC_FULL.md §3, §5).
    epoch: u64,
}

impl CodeGraph {
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            graph: DiGraph::new(),
            by_id: HashMap::new(),
            root_path,
            epoch: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Insert or replace a node by its stable id. Returns the id for
    /// chaining into `add_edge`.
    pub fn add_node(&mut self, node: Node) -> String {
        let id = node.id.clone();
        if let Some(&idx) = self.by_id.get(&id) {
            self.graph[idx] = node;
        } else {
            let idx = self.graph.add_node(node);
            self.by_id.insert(id.clone(), idx);
        }
        self.epoch += 1;
        id
    }

    /// Add an edge, enforcing the "at most one edge of a given kind between
    /// an ordered pair" invariant (SPEC_FULL.md §3) by upserting in place.
    pub fn add_edge(&mut self, edge: Edge) -> crate::error::Result<()> {
        let src = *self
            .by_id
            .get(&edge.source_id)
            .ok_or_else(|| crate::error::MuError::NotFound(edge.source_id.clone()))?;
        let tgt = *self
            .by_id
            .get(&edge.target_id)
            .ok_or_else(|| crate::error::MuError::NotFound(edge.target_id.clone()))?;

        if let Some(existing) = self
            .graph
            .edges(src)
            .find(|e| e.target() == tgt && e.weight().kind == edge.kind)
            .map(|e| e.id())
        {
            self.graph[existing] = edge;
        } else {
            self.graph.add_edge(src, tgt, edge);
        }
        self.epoch += 1;
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.by_id.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        if let Some(&idx) = self.by_id.get(id) {
            Some(&mut self.graph[idx])
        } else {
            None
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    /// Outgoing edges from `id`, as `(target_id, edge)`.
    pub fn edges_from<'a>(&'a self, id: &str) -> Vec<(&'a str, &'a Edge)> {
        let Some(&idx) = self.by_id.get(id) else {
            return Vec::new();
        };
        self.graph
            .edges(idx)
            .map(|e| (self.graph[e.target()].id.as_str(), e.weight()))
            .collect()
    }

    /// Incoming edges to `id`, as `(source_id, edge)`.
    pub fn edges_to<'a>(&'a self, id: &str) -> Vec<(&'a str, &'a Edge)> {
        let Some(&idx) = self.by_id.get(id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, petgraph::Direction::Incoming)
            .map(|e| (self.graph[e.source()].id.as_str(), e.weight()))
            .collect()
    }

    pub fn root_path(&self) -> &PathBuf {
        &self.root_path
    }

    pub fn inner(&self) -> &DiGraph<Node, Edge> {
        &self.graph
    }

    /// Merge another graph into this one. Because nodes are keyed by stable
    /// string id rather than a process-local index, merging never needs to
    /// remap — the [`MergeMap`] returned is effectively an identity map over
    /// the merged node ids, kept for symmetry with the ingestion pipeline's
    /// parallel-parse-then-merge flow (SPEC_FULL.md §4.2).
    pub fn merge(&mut self, other: CodeGraph) -> MergeMap {
        let mut map = MergeMap::new();
        for node in other.graph.node_weights() {
            let id = node.id.clone();
            self.add_node(node.clone());
            map.insert(id.clone(), id);
        }
        for edge in other.graph.edge_weights() {
            // Cross-file edges may reference nodes not yet merged in from
            // another worker's shard; skip silently, the assembler's
            // cross-file resolution pass re-derives these afterwards.
            let _ = self.add_edge(edge.clone());
        }
        map
    }

    /// Replace the entire working set in one step (SPEC_FULL.md §4.1
    /// `build`: "delete the current working set, insert the new one").
    pub fn rebuild(&mut self, root_path: PathBuf) {
        self.graph = DiGraph::new();
        self.by_id = HashMap::new();
        self.root_path = root_path;
        self.epoch += 1;
    }
}
