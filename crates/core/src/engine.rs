//! The graph engine — traversal queries that don't fit naturally in SQL
//! (SPEC_FULL.md §4.3): impact, dependencies, path-finding, cycle detection.

use crate::error::{MuError, Result};
use crate::model::{CodeGraph, EdgeKind};
use std::collections::{HashSet, VecDeque};

/// An in-memory adjacency view loaded from a [`CodeGraph`] at a point in
/// time, tagged with the epoch it was loaded at so callers can detect when
/// it has gone stale (SPEC_FULL.md §3 "Derived views declare themselves
/// stale when the store advertises a rebuild epoch bump").
pub struct GraphEngine<'a> {
    graph: &'a CodeGraph,
    epoch: u64,
}

impl<'a> GraphEngine<'a> {
    /// `load(store)` in the spec's terms — here, load from an already
    /// materialised [`CodeGraph`] (the store hands one back via
    /// `reconstruct_graph`, see `store::mod`).
    pub fn load(graph: &'a CodeGraph) -> Self {
        Self {
            graph,
            epoch: graph.epoch(),
        }
    }

    pub fn is_stale(&self) -> bool {
        self.epoch != self.graph.epoch()
    }

    fn filtered_edges_to<'b>(
        &'b self,
        id: &str,
        kinds: Option<&[EdgeKind]>,
    ) -> Vec<&'b str> {
        self.graph
            .edges_to(id)
            .into_iter()
            .filter(|(_, e)| kinds.map(|k| k.contains(&e.kind)).unwrap_or(true))
            .map(|(src, _)| src)
            .collect()
    }

    fn filtered_edges_from<'b>(
        &'b self,
        id: &str,
        kinds: Option<&[EdgeKind]>,
    ) -> Vec<&'b str> {
        self.graph
            .edges_from(id)
            .into_iter()
            .filter(|(_, e)| kinds.map(|k| k.contains(&e.kind)).unwrap_or(true))
            .map(|(tgt, _)| tgt)
            .collect()
    }

    /// Reverse BFS: the set of nodes that transitively depend on `node_id`.
    /// Ordering is by BFS layer, then lexicographically on node id within a
    /// layer, for reproducibility (SPEC_FULL.md §4.3).
    pub fn impact(&self, node_id: &str, edge_kinds: Option<&[EdgeKind]>) -> Result<Vec<String>> {
        self.impact_depth(node_id, edge_kinds, None)
    }

    /// `impact` bounded to at most `depth` BFS layers. Monotone in `depth`
    /// (SPEC_FULL.md §8 invariant 3: `impact(N, D) ⊇ impact(N, D-1)`).
    pub fn impact_depth(
        &self,
        node_id: &str,
        edge_kinds: Option<&[EdgeKind]>,
        depth: Option<usize>,
    ) -> Result<Vec<String>> {
        if !self.graph.contains(node_id) {
            return Err(MuError::NotFound(node_id.to_string()));
        }
        Ok(self.bfs(node_id, edge_kinds, depth, true))
    }

    /// Forward BFS, symmetric to `impact`.
    pub fn dependencies(
        &self,
        node_id: &str,
        edge_kinds: Option<&[EdgeKind]>,
        depth: Option<usize>,
    ) -> Result<Vec<String>> {
        if !self.graph.contains(node_id) {
            return Err(MuError::NotFound(node_id.to_string()));
        }
        Ok(self.bfs(node_id, edge_kinds, depth, false))
    }

    fn bfs(
        &self,
        start: &str,
        edge_kinds: Option<&[EdgeKind]>,
        max_depth: Option<usize>,
        reverse: bool,
    ) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(start.to_string());
        queue.push_back((start.to_string(), 0usize));

        let mut layers: Vec<Vec<String>> = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if let Some(max) = max_depth {
                if depth >= max {
                    continue;
                }
            }
            let neighbours = if reverse {
                self.filtered_edges_to(&current, edge_kinds)
            } else {
                self.filtered_edges_from(&current, edge_kinds)
            };
            for n in neighbours {
                if visited.insert(n.to_string()) {
                    if layers.len() <= depth {
                        layers.resize_with(depth + 1, Vec::new);
                    }
                    layers[depth].push(n.to_string());
                    queue.push_back((n.to_string(), depth + 1));
                }
            }
        }

        let mut out = Vec::new();
        for layer in &mut layers {
            layer.sort();
            out.extend(layer.drain(..));
        }
        out
    }

    /// Shortest path under BFS, optionally constrained to a single edge kind.
    pub fn path(
        &self,
        from_id: &str,
        to_id: &str,
        max_depth: usize,
        via: Option<EdgeKind>,
    ) -> Result<Vec<String>> {
        if !self.graph.contains(from_id) {
            return Err(MuError::NotFound(from_id.to_string()));
        }
        if !self.graph.contains(to_id) {
            return Err(MuError::NotFound(to_id.to_string()));
        }

        let kinds = via.map(|k| vec![k]);
        let kinds_ref = kinds.as_deref();

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(from_id.to_string());
        queue.push_back(vec![from_id.to_string()]);

        while let Some(path) = queue.pop_front() {
            let current = path.last().unwrap().clone();
            if current == to_id {
                return Ok(path);
            }
            if path.len() > max_depth {
                continue;
            }
            let mut neighbours = self.filtered_edges_from(&current, kinds_ref);
            neighbours.sort();
            for n in neighbours {
                if visited.insert(n.to_string()) {
                    let mut next = path.clone();
                    next.push(n.to_string());
                    queue.push_back(next);
                }
            }
        }

        Ok(Vec::new())
    }

    /// Strongly-connected components of size ≥ 2 over the "cyclable" edge
    /// kinds (imports/calls/uses), plus self-loops on kinds that admit them
    /// by design. One representative cycle per SCC.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        use petgraph::algo::tarjan_scc;
        use petgraph::visit::{EdgeFiltered, EdgeRef};

        let inner = self.graph.inner();
        let cyclable = EdgeFiltered::from_fn(inner, |e| e.weight().kind.is_cyclable());
        let sccs = tarjan_scc(cyclable);
        let mut out = Vec::new();

        for scc in sccs {
            if scc.len() >= 2 {
                let ids: Vec<String> = scc.iter().map(|&idx| inner[idx].id.clone()).collect();
                out.push(ids);
            } else if scc.len() == 1 {
                let idx = scc[0];
                let has_self_loop = inner.edges(idx).any(|e| {
                    e.target() == idx && e.weight().kind.is_cyclable() && e.weight().kind.admits_self_cycle()
                });
                if has_self_loop {
                    out.push(vec![inner[idx].id.clone()]);
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeKind, Node, NodeKind};

    fn n(graph: &mut CodeGraph, name: &str) -> String {
        graph.add_node(Node::new(NodeKind::Module, name, name, format!("{name}.py"), 1, 10))
    }

    #[test]
    fn impact_is_reverse_of_dependencies() {
        let mut graph = CodeGraph::new("/".into());
        let a = n(&mut graph, "a");
        let b = n(&mut graph, "b");
        graph.add_edge(Edge::new(a.clone(), b.clone(), EdgeKind::Imports)).unwrap();

        let engine = GraphEngine::load(&graph);
        assert_eq!(engine.impact(&b, None).unwrap(), vec![a.clone()]);
        assert_eq!(engine.dependencies(&a, None, None).unwrap(), vec![b]);
    }

    #[test]
    fn impact_on_unknown_node_fails() {
        let graph = CodeGraph::new("/".into());
        let engine = GraphEngine::load(&graph);
        assert!(matches!(
            engine.impact("module:missing.py", None),
            Err(MuError::NotFound(_))
        ));
    }

    #[test]
    fn impact_grows_monotonically_with_depth() {
        let mut graph = CodeGraph::new("/".into());
        let a = n(&mut graph, "a");
        let b = n(&mut graph, "b");
        let c = n(&mut graph, "c");
        graph.add_edge(Edge::new(a.clone(), b.clone(), EdgeKind::Imports)).unwrap();
        graph.add_edge(Edge::new(b.clone(), c.clone(), EdgeKind::Imports)).unwrap();

        let engine = GraphEngine::load(&graph);
        let d1 = engine.dependencies(&a, None, Some(1)).unwrap();
        let d2 = engine.dependencies(&a, None, Some(2)).unwrap();
        assert!(d2.len() >= d1.len());
        assert!(d1.iter().all(|x| d2.contains(x)));
    }

    #[test]
    fn self_loop_cycle_only_reported_for_calls() {
        let mut graph = CodeGraph::new("/".into());
        let a = n(&mut graph, "a");
        graph.add_edge(Edge::new(a.clone(), a.clone(), EdgeKind::Calls)).unwrap();
        let engine = GraphEngine::load(&graph);
        assert_eq!(engine.cycles(), vec![vec![a]]);
    }

    #[test]
    fn mutual_imports_form_a_cycle() {
        let mut graph = CodeGraph::new("/".into());
        let a = n(&mut graph, "a");
        let b = n(&mut graph, "b");
        graph.add_edge(Edge::new(a.clone(), b.clone(), EdgeKind::Imports)).unwrap();
        graph.add_edge(Edge::new(b.clone(), a.clone(), EdgeKind::Imports)).unwrap();

        let engine = GraphEngine::load(&graph);
        let cycles = engine.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }

    #[test]
    fn contains_edges_never_form_a_cycle() {
        // A module "contains" a class which "contains" a method that (via a
        // modeling quirk) points back at the module — none of these edge
        // kinds are cyclable, so this must not be reported.
        let mut graph = CodeGraph::new("/".into());
        let a = n(&mut graph, "a");
        let b = n(&mut graph, "b");
        graph.add_edge(Edge::new(a.clone(), b.clone(), EdgeKind::Contains)).unwrap();
        graph.add_edge(Edge::new(b.clone(), a.clone(), EdgeKind::Contains)).unwrap();

        let engine = GraphEngine::load(&graph);
        assert!(engine.cycles().is_empty());
    }
}
