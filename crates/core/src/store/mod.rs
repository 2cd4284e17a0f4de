//! The store (SPEC_FULL.md §4.1): durable, transactional persistence of the
//! data model plus secondary indices. Two implementations share the
//! [`Store`] trait:
//!
//! - [`memory::MemoryStore`] — in-process, always available, backs tests and
//!   any caller that doesn't need `.mu/mubase` persisted to disk.
//! - [`cozo::CozoStore`] (behind the `cozo-store` feature) — CozoDB-backed,
//!   persists to `<repo>/.mu/mubase` and enforces the single-writer lock.

pub mod memory;

#[cfg(feature = "cozo-store")]
pub mod cozo;

pub use memory::MemoryStore;

#[cfg(feature = "cozo-store")]
pub use cozo::CozoStore;

use std::path::{Path, PathBuf};

use crate::error::{MuError, Result};
use crate::model::{CodeGraph, Edge, EdgeKind, Node};

/// `open(path, mode)` mode parameter (SPEC_FULL.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadWrite,
    ReadOnly,
}

/// `embedding_type` discriminator (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingType {
    Code,
    Doc,
    Query,
}

impl EmbeddingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingType::Code => "code",
            EmbeddingType::Doc => "doc",
            EmbeddingType::Query => "query",
        }
    }
}

/// A vector attached to a node for semantic search (SPEC_FULL.md §3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Embedding {
    pub node_id: String,
    pub embedding_type: EmbeddingType,
    pub dimension: u32,
    pub vector: Vec<f32>,
}

/// `change_type` for a [`NodeChange`]/[`EdgeChange`] history row (SPEC_FULL.md
/// §3). `Unchanged` is deliberate: it lets a temporal view enumerate every
/// entity whose most recent change at or before a snapshot isn't `Removed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Removed => "removed",
            ChangeType::Modified => "modified",
            ChangeType::Unchanged => "unchanged",
        }
    }
}

/// One (snapshot, node) history row (SPEC_FULL.md §3 NodeChange).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeChange {
    pub snapshot_id: String,
    pub node_id: String,
    pub change_type: ChangeType,
    /// Content hash of the node's material fields, used to decide "modified".
    pub content_hash: String,
}

/// One (snapshot, edge) history row (SPEC_FULL.md §3 EdgeChange).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EdgeChange {
    pub snapshot_id: String,
    pub edge_id: String,
    pub change_type: ChangeType,
    pub content_hash: String,
}

/// A labelled, immutable view of nodes and edges at one point in time
/// (SPEC_FULL.md §3 Snapshot). Never mutated after creation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub commit_hash: String,
    pub commit_message: String,
    pub commit_author: String,
    /// RFC 3339 timestamp; kept as a string so the store doesn't need a
    /// datetime dependency beyond what it already uses for hashing.
    pub commit_date: String,
    pub parent_id: Option<String>,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub nodes_modified: usize,
    pub edges_added: usize,
    pub edges_removed: usize,
    pub edges_modified: usize,
}

/// `stats()` response (SPEC_FULL.md §4.1, §6 `status` command).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    pub node_counts: std::collections::BTreeMap<String, usize>,
    pub edge_counts: std::collections::BTreeMap<String, usize>,
    pub embedding_dimension: Option<u32>,
    pub nodes_with_embeddings: usize,
    pub total_nodes: usize,
    pub root_path: PathBuf,
    pub epoch: u64,
}

/// The storage contract every component reads from (SPEC_FULL.md §4.1). All
/// write methods are transactional: either the whole call commits or no
/// user-visible state changes (enforced by each impl internally).
pub trait Store: Send + Sync {
    fn add_node(&mut self, node: Node) -> Result<()>;
    fn add_edge(&mut self, edge: Edge) -> Result<()>;
    fn add_embedding(&mut self, embedding: Embedding) -> Result<()>;

    fn get_node(&self, id: &str) -> Result<Option<Node>>;
    fn get_edge(&self, id: &str) -> Result<Option<Edge>>;

    /// Glob-pattern (`%` wildcard) name lookup, ordered exact-match first
    /// then descending complexity, capped at `limit`.
    fn find_by_name(&self, pattern: &str, limit: usize) -> Result<Vec<Node>>;

    /// `contains`-edge children of `id`.
    fn get_children(&self, id: &str) -> Result<Vec<Node>>;

    /// Transitive closure over incoming edges of the given kinds (or all
    /// kinds if `None`), up to `depth` layers.
    fn get_dependents(&self, id: &str, depth: usize, edge_kinds: Option<&[EdgeKind]>) -> Result<Vec<Node>>;

    /// Exact for stores up to 10^6 embeddings (SPEC_FULL.md §4.1).
    fn vector_search(&self, query: &[f32], embedding_type: EmbeddingType, limit: usize) -> Result<Vec<(Node, f32)>>;

    /// Escape hatch used by the MUQL executor only (SPEC_FULL.md §4.1).
    fn execute(&self, statement: &str) -> Result<serde_json::Value>;

    fn stats(&self) -> Result<StoreStats>;

    /// Atomic rebuild: replace the whole working set and bump the epoch.
    fn build(&mut self, nodes: Vec<Node>, edges: Vec<Edge>, root: &Path) -> Result<()>;

    fn epoch(&self) -> u64;

    /// Materialise the current working set into an in-memory [`CodeGraph`]
    /// for components that need adjacency (graph engine, resolver, MUQL
    /// planner, pattern detector, context extractor).
    fn snapshot_graph(&self) -> Result<CodeGraph>;

    /// Persist a completed snapshot plus its change records in one write.
    /// The temporal schema is created lazily on the first call
    /// (SPEC_FULL.md §4.1, §4.9).
    fn write_snapshot(
        &mut self,
        snapshot: Snapshot,
        node_changes: Vec<NodeChange>,
        edge_changes: Vec<EdgeChange>,
    ) -> Result<()>;

    fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>>;
    fn snapshot_by_commit(&self, commit_hash: &str) -> Result<Option<Snapshot>>;

    /// All snapshots, oldest first.
    fn list_snapshots(&self) -> Result<Vec<Snapshot>>;

    fn node_changes_at(&self, snapshot_id: &str) -> Result<Vec<NodeChange>>;
    fn edge_changes_at(&self, snapshot_id: &str) -> Result<Vec<EdgeChange>>;

    /// Deletes the snapshot and cascades to its change records
    /// (SPEC_FULL.md §3 "Deleting a snapshot cascades to its change records").
    fn delete_snapshot(&mut self, id: &str) -> Result<()>;
}

/// Advisory write-lock file shared by every persistent `Store` impl
/// (SPEC_FULL.md §4.1, §6 `<repo>/.mu/mubase.lock`).
pub struct WriteLock {
    path: PathBuf,
    file: std::fs::File,
}

impl WriteLock {
    pub fn acquire(mu_dir: &Path) -> Result<Self> {
        use fs4::fs_std::FileExt;
        use std::fs::OpenOptions;

        std::fs::create_dir_all(mu_dir)
            .map_err(|e| MuError::Config(format!("creating {}: {e}", mu_dir.display())))?;
        let path = mu_dir.join("mubase.lock");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| MuError::Locked(format!("{}: {e}", path.display())))?;
        file.try_lock_exclusive()
            .map_err(|_| MuError::Locked(path.display().to_string()))?;
        Ok(Self { path, file })
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        use fs4::fs_std::FileExt;
        let _ = FileExt::unlock(&self.file);
    }
}

/// Open the store at `<repo>/.mu` in the given mode. This is the facade the
/// CLI and any embedding host uses instead of constructing `MemoryStore` or
/// `CozoStore` directly.
#[cfg(feature = "cozo-store")]
pub fn open(root: &Path, mode: OpenMode) -> Result<Box<dyn Store>> {
    let mu_dir = root.join(".mu");
    Ok(Box::new(cozo::CozoStore::open(&mu_dir, mode)?))
}

#[cfg(not(feature = "cozo-store"))]
pub fn open(_root: &Path, _mode: OpenMode) -> Result<Box<dyn Store>> {
    Ok(Box::new(MemoryStore::new()))
}
