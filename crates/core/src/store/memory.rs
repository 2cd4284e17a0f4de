//! In-memory [`Store`] implementation backed directly by a [`CodeGraph`].
//! Always available (no feature flag); used by tests and by any caller that
//! doesn't need `.mu/mubase` persisted to disk (SPEC_FULL.md §4.1).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{MuError, Result};
use crate::model::{CodeGraph, Edge, EdgeKind, Node};

use super::{Embedding, EmbeddingType, EdgeChange, NodeChange, Snapshot, Store, StoreStats};

#[derive(Debug, Clone, Default)]
struct EmbeddingTable {
    dimension: Option<u32>,
    by_node: HashMap<(String, EmbeddingType), Embedding>,
}

#[derive(Debug, Clone, Default)]
struct History {
    snapshots: Vec<Snapshot>,
    node_changes: HashMap<String, Vec<NodeChange>>,
    edge_changes: HashMap<String, Vec<EdgeChange>>,
}

pub struct MemoryStore {
    graph: RwLock<CodeGraph>,
    embeddings: RwLock<EmbeddingTable>,
    history: RwLock<History>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(CodeGraph::new(PathBuf::new())),
            embeddings: RwLock::new(EmbeddingTable::default()),
            history: RwLock::new(History::default()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CodeGraph> {
        self.graph.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CodeGraph> {
        self.graph.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Glob-like `%`-wildcard pattern match (SPEC_FULL.md §4.1 `find_by_name`).
pub(crate) fn glob_match(pattern: &str, candidate: &str) -> bool {
    if !pattern.contains('%') {
        return pattern == candidate;
    }
    let parts: Vec<&str> = pattern.split('%').collect();
    let mut rest = candidate;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !rest.starts_with(part) {
                return false;
            }
            rest = &rest[part.len()..];
        } else if i == parts.len() - 1 {
            if !rest.ends_with(part) {
                return false;
            }
        } else if let Some(pos) = rest.find(part) {
            rest = &rest[pos + part.len()..];
        } else {
            return false;
        }
    }
    true
}

impl Store for MemoryStore {
    fn add_node(&mut self, node: Node) -> Result<()> {
        self.write().add_node(node);
        Ok(())
    }

    fn add_edge(&mut self, edge: Edge) -> Result<()> {
        self.write().add_edge(edge)
    }

    fn add_embedding(&mut self, embedding: Embedding) -> Result<()> {
        let mut table = self.embeddings.write().unwrap_or_else(|e| e.into_inner());
        match table.dimension {
            Some(dim) if dim != embedding.dimension => {
                return Err(MuError::Config(format!(
                    "embedding dimension mismatch: store uses {dim}, got {}",
                    embedding.dimension
                )));
            }
            _ => table.dimension = Some(embedding.dimension),
        }
        table
            .by_node
            .insert((embedding.node_id.clone(), embedding.embedding_type), embedding);
        Ok(())
    }

    fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.read().node(id).cloned())
    }

    fn get_edge(&self, id: &str) -> Result<Option<Edge>> {
        Ok(self.read().edges().find(|e| e.id == id).cloned())
    }

    fn find_by_name(&self, pattern: &str, limit: usize) -> Result<Vec<Node>> {
        let graph = self.read();
        let mut matches: Vec<Node> = graph
            .nodes()
            .filter(|n| glob_match(pattern, &n.name) || glob_match(pattern, &n.qualified_name))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            let a_exact = a.name == pattern;
            let b_exact = b.name == pattern;
            b_exact
                .cmp(&a_exact)
                .then(b.complexity.cmp(&a.complexity))
                .then(a.id.cmp(&b.id))
        });
        matches.truncate(limit);
        Ok(matches)
    }

    fn get_children(&self, id: &str) -> Result<Vec<Node>> {
        let graph = self.read();
        Ok(graph
            .edges_from(id)
            .into_iter()
            .filter(|(_, e)| e.kind == EdgeKind::Contains)
            .filter_map(|(target, _)| graph.node(target).cloned())
            .collect())
    }

    fn get_dependents(&self, id: &str, depth: usize, edge_kinds: Option<&[EdgeKind]>) -> Result<Vec<Node>> {
        if !self.read().contains(id) {
            return Err(MuError::NotFound(id.to_string()));
        }
        let graph = self.read();
        let engine = crate::engine::GraphEngine::load(&graph);
        let ids = engine.impact_depth(id, edge_kinds, Some(depth))?;
        Ok(ids.into_iter().filter_map(|i| graph.node(&i).cloned()).collect())
    }

    fn vector_search(&self, query: &[f32], embedding_type: EmbeddingType, limit: usize) -> Result<Vec<(Node, f32)>> {
        let table = self.embeddings.read().unwrap_or_else(|e| e.into_inner());
        let graph = self.read();
        let mut scored: Vec<(Node, f32)> = table
            .by_node
            .values()
            .filter(|e| e.embedding_type == embedding_type)
            .filter_map(|e| graph.node(&e.node_id).map(|n| (n.clone(), cosine_similarity(query, &e.vector))))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    fn execute(&self, _statement: &str) -> Result<serde_json::Value> {
        Err(MuError::External {
            provider: "memory-store".to_string(),
            message: "execute() requires the cozo-backed store".to_string(),
        })
    }

    fn stats(&self) -> Result<StoreStats> {
        let graph = self.read();
        let table = self.embeddings.read().unwrap_or_else(|e| e.into_inner());
        let mut node_counts = std::collections::BTreeMap::new();
        for node in graph.nodes() {
            *node_counts.entry(node.kind.as_str().to_string()).or_insert(0) += 1;
        }
        let mut edge_counts = std::collections::BTreeMap::new();
        for edge in graph.edges() {
            *edge_counts.entry(edge.kind.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(StoreStats {
            total_nodes: graph.node_count(),
            node_counts,
            edge_counts,
            embedding_dimension: table.dimension,
            nodes_with_embeddings: table.by_node.len(),
            root_path: graph.root_path().clone(),
            epoch: graph.epoch(),
        })
    }

    fn build(&mut self, nodes: Vec<Node>, edges: Vec<Edge>, root: &Path) -> Result<()> {
        let mut graph = self.write();
        graph.rebuild(root.to_path_buf());
        for node in nodes {
            graph.add_node(node);
        }
        for edge in edges {
            // Endpoints were derived from the same `nodes` set by the
            // assembler; a missing endpoint means a dangling cross-file
            // reference that didn't resolve and is dropped rather than
            // failing the whole rebuild.
            let _ = graph.add_edge(edge);
        }
        Ok(())
    }

    fn epoch(&self) -> u64 {
        self.read().epoch()
    }

    fn snapshot_graph(&self) -> Result<CodeGraph> {
        Ok(self.read().clone())
    }

    fn write_snapshot(
        &mut self,
        snapshot: Snapshot,
        node_changes: Vec<NodeChange>,
        edge_changes: Vec<EdgeChange>,
    ) -> Result<()> {
        let mut history = self.history.write().unwrap_or_else(|e| e.into_inner());
        history
            .node_changes
            .insert(snapshot.id.clone(), node_changes);
        history
            .edge_changes
            .insert(snapshot.id.clone(), edge_changes);
        history.snapshots.push(snapshot);
        Ok(())
    }

    fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        Ok(history.snapshots.iter().find(|s| s.id == id).cloned())
    }

    fn snapshot_by_commit(&self, commit_hash: &str) -> Result<Option<Snapshot>> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        Ok(history
            .snapshots
            .iter()
            .find(|s| s.commit_hash == commit_hash)
            .cloned())
    }

    fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        Ok(history.snapshots.clone())
    }

    fn node_changes_at(&self, snapshot_id: &str) -> Result<Vec<NodeChange>> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        Ok(history.node_changes.get(snapshot_id).cloned().unwrap_or_default())
    }

    fn edge_changes_at(&self, snapshot_id: &str) -> Result<Vec<EdgeChange>> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        Ok(history.edge_changes.get(snapshot_id).cloned().unwrap_or_default())
    }

    fn delete_snapshot(&mut self, id: &str) -> Result<()> {
        let mut history = self.history.write().unwrap_or_else(|e| e.into_inner());
        history.snapshots.retain(|s| s.id != id);
        history.node_changes.remove(id);
        history.edge_changes.remove(id);
        Ok(())
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    fn node(kind: NodeKind, name: &str, path: &str) -> Node {
        Node::new(kind, name, name, path, 1, 10)
    }

    #[test]
    fn build_replaces_working_set_atomically() {
        let mut store = MemoryStore::new();
        let root = Path::new("/repo");
        let a = node(NodeKind::Module, "a", "a.py");
        store.build(vec![a.clone()], vec![], root).unwrap();
        assert_eq!(store.stats().unwrap().total_nodes, 1);

        let b = node(NodeKind::Module, "b", "b.py");
        store.build(vec![b], vec![], root).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_nodes, 1);
        assert!(store.get_node(&a.id).unwrap().is_none());
    }

    #[test]
    fn find_by_name_orders_exact_before_wildcard_by_complexity() {
        let mut store = MemoryStore::new();
        let mut low = node(NodeKind::Function, "handle", "a.py");
        low.complexity = 2;
        let mut high = node(NodeKind::Function, "handler_two", "b.py");
        high.complexity = 9;
        store.build(vec![low.clone(), high.clone()], vec![], Path::new("/repo")).unwrap();

        let results = store.find_by_name("handle%", 10).unwrap();
        assert_eq!(results[0].id, low.id);
        assert_eq!(results[1].id, high.id);
    }

    #[test]
    fn vector_search_empty_table_returns_empty() {
        let store = MemoryStore::new();
        let result = store.vector_search(&[1.0, 0.0], EmbeddingType::Code, 5).unwrap();
        assert!(result.is_empty());
        assert_eq!(store.stats().unwrap().nodes_with_embeddings, 0);
    }

    #[test]
    fn vector_search_returns_self_at_rank_zero_with_score_one() {
        let mut store = MemoryStore::new();
        let n = node(NodeKind::Function, "f", "a.py");
        store.build(vec![n.clone()], vec![], Path::new("/repo")).unwrap();
        store
            .add_embedding(Embedding {
                node_id: n.id.clone(),
                embedding_type: EmbeddingType::Code,
                dimension: 2,
                vector: vec![1.0, 0.0],
            })
            .unwrap();
        let results = store.vector_search(&[1.0, 0.0], EmbeddingType::Code, 5).unwrap();
        assert_eq!(results[0].0.id, n.id);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mixed_dimension_embedding_write_fails() {
        let mut store = MemoryStore::new();
        let n = node(NodeKind::Function, "f", "a.py");
        store.build(vec![n.clone()], vec![], Path::new("/repo")).unwrap();
        store
            .add_embedding(Embedding {
                node_id: n.id.clone(),
                embedding_type: EmbeddingType::Code,
                dimension: 2,
                vector: vec![1.0, 0.0],
            })
            .unwrap();
        let err = store.add_embedding(Embedding {
            node_id: n.id,
            embedding_type: EmbeddingType::Doc,
            dimension: 3,
            vector: vec![1.0, 0.0, 0.0],
        });
        assert!(err.is_err());
    }
}
