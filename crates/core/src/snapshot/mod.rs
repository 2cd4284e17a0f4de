//! The snapshot & diff layer (SPEC_FULL.md §4.9): point-in-time views over
//! the store's temporal schema, plus semantic diffing between two graphs.

pub mod diff;
pub mod git;

pub use diff::{BreakingRule, ChangeKind, EntityChange, EntityKind, SemanticDiff};

use std::collections::HashMap;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::MuConfig;
use crate::error::{MuError, Result};
use crate::model::{CodeGraph, Edge, Node};
use crate::store::{ChangeType, EdgeChange, NodeChange, Snapshot, Store};

/// Content hash of a node's material fields (SPEC_FULL.md §3, GLOSSARY
/// "Snapshot delta"). Deliberately excludes `id` (derived from the same
/// fields) so a rename shows up as remove+add rather than a no-op modify.
pub fn content_hash_node(node: &Node) -> String {
    let mut hasher = Sha256::new();
    hasher.update(node.kind.as_str().as_bytes());
    hasher.update(node.name.as_bytes());
    hasher.update(node.qualified_name.as_bytes());
    hasher.update(node.file_path.as_bytes());
    hasher.update(node.line_start.to_le_bytes());
    hasher.update(node.line_end.to_le_bytes());
    hasher.update(node.complexity.to_le_bytes());
    if let Ok(props) = serde_json::to_vec(&node.properties) {
        hasher.update(&props);
    }
    format!("{:x}", hasher.finalize())
}

pub fn content_hash_edge(edge: &Edge) -> String {
    let mut hasher = Sha256::new();
    hasher.update(edge.source_id.as_bytes());
    hasher.update(edge.kind.as_str().as_bytes());
    hasher.update(edge.target_id.as_bytes());
    if let Ok(props) = serde_json::to_vec(&edge.properties) {
        hasher.update(&props);
    }
    format!("{:x}", hasher.finalize())
}

/// Walks the `parent_id` chain from `snapshot_id` back to the root and folds
/// each snapshot's change records forward, producing the effective
/// (entity id -> content hash) membership at that snapshot. Entities whose
/// most recent change is `removed` are absent from the result
/// (SPEC_FULL.md §3 "a temporal view... enumerates all entities whose most
/// recent change at <= S is not removed").
fn effective_node_hashes(store: &dyn Store, snapshot_id: &str) -> Result<HashMap<String, String>> {
    let mut chain = Vec::new();
    let mut cursor = Some(snapshot_id.to_string());
    while let Some(id) = cursor {
        let snap = store
            .get_snapshot(&id)?
            .ok_or_else(|| MuError::NotFound(format!("snapshot {id}")))?;
        cursor = snap.parent_id.clone();
        chain.push(snap.id);
    }
    chain.reverse();

    let mut state = HashMap::new();
    for id in chain {
        for change in store.node_changes_at(&id)? {
            match change.change_type {
                ChangeType::Removed => {
                    state.remove(&change.node_id);
                }
                _ => {
                    state.insert(change.node_id, change.content_hash);
                }
            }
        }
    }
    Ok(state)
}

fn effective_edge_hashes(store: &dyn Store, snapshot_id: &str) -> Result<HashMap<String, String>> {
    let mut chain = Vec::new();
    let mut cursor = Some(snapshot_id.to_string());
    while let Some(id) = cursor {
        let snap = store
            .get_snapshot(&id)?
            .ok_or_else(|| MuError::NotFound(format!("snapshot {id}")))?;
        cursor = snap.parent_id.clone();
        chain.push(snap.id);
    }
    chain.reverse();

    let mut state = HashMap::new();
    for id in chain {
        for change in store.edge_changes_at(&id)? {
            match change.change_type {
                ChangeType::Removed => {
                    state.remove(&change.edge_id);
                }
                _ => {
                    state.insert(change.edge_id, change.content_hash);
                }
            }
        }
    }
    Ok(state)
}

/// Picks the parent snapshot for a new one: the most recent existing
/// snapshot whose commit is an ancestor of `commit_hash`, per git ancestry
/// when a repository handle is available; otherwise the most recently
/// created snapshot (documented fallback for callers with no git context).
fn find_parent(
    store: &dyn Store,
    repo: Option<&git2::Repository>,
    commit_hash: &str,
) -> Result<Option<Snapshot>> {
    let mut snapshots = store.list_snapshots()?;
    if snapshots.is_empty() {
        return Ok(None);
    }
    snapshots.sort_by(|a, b| a.commit_date.cmp(&b.commit_date));

    if let Some(repo) = repo {
        if let Ok(target) = repo.revparse_single(commit_hash).and_then(|o| o.peel_to_commit()) {
            for candidate in snapshots.iter().rev() {
                let Ok(ancestor_obj) = repo.revparse_single(&candidate.commit_hash) else {
                    continue;
                };
                let Ok(ancestor) = ancestor_obj.peel_to_commit() else {
                    continue;
                };
                if ancestor.id() == target.id() {
                    continue;
                }
                if repo
                    .graph_descendant_of(target.id(), ancestor.id())
                    .unwrap_or(false)
                {
                    return Ok(Some(candidate.clone()));
                }
            }
            return Ok(None);
        }
    }

    Ok(snapshots.last().cloned())
}

/// `create_snapshot(commit_hash?, force)` (SPEC_FULL.md §4.9). Compares the
/// current working set's content hashes against the parent's effective
/// membership, writes the new snapshot plus all change records.
pub fn create_snapshot(
    store: &mut dyn Store,
    repo: Option<&git2::Repository>,
    commit_hash: &str,
    commit_message: &str,
    commit_author: &str,
    commit_date: &str,
    force: bool,
) -> Result<Snapshot> {
    if let Some(existing) = store.snapshot_by_commit(commit_hash)? {
        if !force {
            return Err(MuError::Corruption(format!(
                "snapshot already exists for commit {commit_hash} (use force to recreate)"
            )));
        }
        store.delete_snapshot(&existing.id)?;
    }

    let parent = find_parent(store, repo, commit_hash)?;
    let parent_nodes = match &parent {
        Some(p) => effective_node_hashes(store, &p.id)?,
        None => HashMap::new(),
    };
    let parent_edges = match &parent {
        Some(p) => effective_edge_hashes(store, &p.id)?,
        None => HashMap::new(),
    };

    let graph = store.snapshot_graph()?;

    let mut node_changes = Vec::new();
    let mut nodes_added = 0usize;
    let mut nodes_removed = 0usize;
    let mut nodes_modified = 0usize;
    let snapshot_id = format!("snap-{commit_hash}");

    let mut seen = std::collections::HashSet::new();
    for node in graph.nodes() {
        seen.insert(node.id.clone());
        let hash = content_hash_node(node);
        let change_type = match parent_nodes.get(&node.id) {
            None => {
                nodes_added += 1;
                ChangeType::Added
            }
            Some(prev) if prev != &hash => {
                nodes_modified += 1;
                ChangeType::Modified
            }
            Some(_) => ChangeType::Unchanged,
        };
        node_changes.push(NodeChange {
            snapshot_id: snapshot_id.clone(),
            node_id: node.id.clone(),
            change_type,
            content_hash: hash,
        });
    }
    for (id, hash) in &parent_nodes {
        if !seen.contains(id) {
            nodes_removed += 1;
            node_changes.push(NodeChange {
                snapshot_id: snapshot_id.clone(),
                node_id: id.clone(),
                change_type: ChangeType::Removed,
                content_hash: hash.clone(),
            });
        }
    }

    let mut edge_changes = Vec::new();
    let mut edges_added = 0usize;
    let mut edges_removed = 0usize;
    let mut edges_modified = 0usize;
    let mut seen_edges = std::collections::HashSet::new();
    for edge in graph.edges() {
        seen_edges.insert(edge.id.clone());
        let hash = content_hash_edge(edge);
        let change_type = match parent_edges.get(&edge.id) {
            None => {
                edges_added += 1;
                ChangeType::Added
            }
            Some(prev) if prev != &hash => {
                edges_modified += 1;
                ChangeType::Modified
            }
            Some(_) => ChangeType::Unchanged,
        };
        edge_changes.push(EdgeChange {
            snapshot_id: snapshot_id.clone(),
            edge_id: edge.id.clone(),
            change_type,
            content_hash: hash,
        });
    }
    for (id, hash) in &parent_edges {
        if !seen_edges.contains(id) {
            edges_removed += 1;
            edge_changes.push(EdgeChange {
                snapshot_id: snapshot_id.clone(),
                edge_id: id.clone(),
                change_type: ChangeType::Removed,
                content_hash: hash.clone(),
            });
        }
    }

    let snapshot = Snapshot {
        id: snapshot_id,
        commit_hash: commit_hash.to_string(),
        commit_message: commit_message.to_string(),
        commit_author: commit_author.to_string(),
        commit_date: commit_date.to_string(),
        parent_id: parent.map(|p| p.id),
        total_nodes: graph.node_count(),
        total_edges: graph.edge_count(),
        nodes_added,
        nodes_removed,
        nodes_modified,
        edges_added,
        edges_removed,
        edges_modified,
    };

    store.write_snapshot(snapshot.clone(), node_changes, edge_changes)?;
    Ok(snapshot)
}

/// A read-only, point-in-time view over the store (SPEC_FULL.md §4.9
/// `MUbaseSnapshot`). Field values are read from the live working set:
/// membership (which nodes/edges existed at this snapshot) comes from the
/// temporal schema, but this implementation does not retain historical
/// field values once a node is superseded by a later build, so a node whose
/// fields changed after this snapshot will show its current fields under
/// its old membership. Semantic diff (`diff::SemanticDiff`) sidesteps this
/// by comparing two independently materialised graphs instead.
pub struct MuBaseSnapshot<'a> {
    store: &'a dyn Store,
    snapshot: Snapshot,
    node_ids: std::collections::HashSet<String>,
}

impl<'a> MuBaseSnapshot<'a> {
    pub fn open(store: &'a dyn Store, snapshot_id: &str) -> Result<Self> {
        let snapshot = store
            .get_snapshot(snapshot_id)?
            .ok_or_else(|| MuError::NotFound(format!("snapshot {snapshot_id}")))?;
        let node_ids = effective_node_hashes(store, snapshot_id)?.into_keys().collect();
        Ok(Self { store, snapshot, node_ids })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn get_node(&self, id: &str) -> Result<Option<Node>> {
        if !self.node_ids.contains(id) {
            return Ok(None);
        }
        self.store.get_node(id)
    }

    pub fn get_nodes(&self) -> Result<Vec<Node>> {
        let mut out = Vec::new();
        for id in &self.node_ids {
            if let Some(node) = self.store.get_node(id)? {
                out.push(node);
            }
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    pub fn get_edges(&self) -> Result<Vec<Edge>> {
        let edge_ids = effective_edge_hashes(self.store, &self.snapshot.id)?;
        let mut out = Vec::new();
        for id in edge_ids.keys() {
            if let Some(edge) = self.store.get_edge(id)? {
                out.push(edge);
            }
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    pub fn stats(&self) -> (usize, usize) {
        (self.snapshot.total_nodes, self.snapshot.total_edges)
    }
}

/// `build_with_history(commits?)` (SPEC_FULL.md §4.9): iterates commits
/// chronologically, builds the store from each commit's git tree (no
/// checkout — see [`git::graph_at_ref`]), and snapshots. The working set is
/// left at the final commit.
pub fn build_with_history(
    store: &mut dyn Store,
    repo: &git2::Repository,
    root: &Path,
    config: &MuConfig,
    commits: &[self::git::CommitInfo],
) -> Result<Vec<Snapshot>> {
    let mut snapshots = Vec::new();
    for commit in commits {
        let (nodes, edges) = match git::graph_at_ref(repo, root, &commit.hash, config) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(commit = %commit.hash, error = %e, "skipping commit: failed to parse tree");
                continue;
            }
        };
        store.build(nodes, edges, root)?;
        match create_snapshot(
            store,
            Some(repo),
            &commit.hash,
            &commit.message,
            &commit.author,
            &commit.date,
            false,
        ) {
            Ok(snap) => snapshots.push(snap),
            Err(MuError::Corruption(e)) => {
                tracing::warn!(commit = %commit.hash, error = %e, "skipping commit: snapshot creation failed");
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;
    use crate::store::MemoryStore;

    fn node(name: &str, path: &str) -> Node {
        Node::new(NodeKind::Module, name, name, path, 1, 10)
    }

    #[test]
    fn snapshot_tracks_added_then_removed() {
        let mut store = MemoryStore::new();
        let root = Path::new("/repo");
        let a = node("a", "a.py");
        store.build(vec![a.clone()], vec![], root).unwrap();
        let s1 = create_snapshot(&mut store, None, "c1", "init", "me", "2024-01-01", false).unwrap();
        assert_eq!(s1.nodes_added, 1);
        assert!(s1.parent_id.is_none());

        store.build(vec![], vec![], root).unwrap();
        let s2 = create_snapshot(&mut store, None, "c2", "remove a", "me", "2024-01-02", false).unwrap();
        assert_eq!(s2.nodes_removed, 1);
        assert_eq!(s2.parent_id, Some(s1.id.clone()));
    }

    #[test]
    fn duplicate_snapshot_requires_force() {
        let mut store = MemoryStore::new();
        store.build(vec![node("a", "a.py")], vec![], Path::new("/repo")).unwrap();
        create_snapshot(&mut store, None, "c1", "init", "me", "2024-01-01", false).unwrap();
        let err = create_snapshot(&mut store, None, "c1", "init again", "me", "2024-01-01", false);
        assert!(err.is_err());
        let ok = create_snapshot(&mut store, None, "c1", "init again", "me", "2024-01-01", true);
        assert!(ok.is_ok());
    }
}
