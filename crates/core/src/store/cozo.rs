//! CozoDB-backed [`Store`] implementation (SPEC_FULL.md §4.1, §6). Persists
//! to `<repo>/.mu/mubase` (SQLite-backed CozoDB) behind the `cozo-store`
//! feature, and enforces the single-writer lock via [`super::WriteLock`].
//!
//! Schema: `nodes`/`edges`/`embeddings` are created eagerly; the temporal
//! schema (`snapshots`/`node_changes`/`edge_changes`) is created lazily on
//! the first [`Store::write_snapshot`] call so stores without snapshots pay
//! no storage cost for it (SPEC_FULL.md §4.1 "Key design decisions").

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cozo_ce::{DataValue, DbInstance, NamedRows, Num, ScriptMutability};

use crate::error::{MuError, Result};
use crate::model::{CodeGraph, Edge, EdgeKind, EdgeProperties, Node, NodeKind, Properties};

use super::{
    ChangeType, EdgeChange, Embedding, EmbeddingType, NodeChange, OpenMode, Snapshot, Store,
    StoreStats, WriteLock,
};

pub struct CozoStore {
    db: DbInstance,
    _lock: Option<WriteLock>,
    temporal_ready: std::sync::atomic::AtomicBool,
}

fn cozo_err(e: impl std::fmt::Display) -> MuError {
    MuError::Corruption(e.to_string())
}

impl CozoStore {
    /// Open (creating if absent) the CozoDB file at `<mu_dir>/mubase`.
    pub fn open(mu_dir: &Path, mode: OpenMode) -> Result<Self> {
        std::fs::create_dir_all(mu_dir)
            .map_err(|e| MuError::Config(format!("creating {}: {e}", mu_dir.display())))?;

        let lock = match mode {
            OpenMode::ReadWrite => Some(WriteLock::acquire(mu_dir)?),
            OpenMode::ReadOnly => None,
        };

        let db_path = mu_dir.join("mubase");
        let db = DbInstance::new("sqlite", db_path.as_path(), Default::default())
            .map_err(|e| MuError::Corruption(format!("opening mubase: {e}")))?;

        let store = Self {
            db,
            _lock: lock,
            temporal_ready: std::sync::atomic::AtomicBool::new(false),
        };
        store.init_core_schema()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_memory() -> Result<Self> {
        let db = DbInstance::new("mem", "", Default::default()).map_err(cozo_err)?;
        let store = Self {
            db,
            _lock: None,
            temporal_ready: std::sync::atomic::AtomicBool::new(false),
        };
        store.init_core_schema()?;
        Ok(store)
    }

    fn init_core_schema(&self) -> Result<()> {
        let statements = [
            r#":create nodes {
                id: String
                =>
                kind: String,
                name: String,
                qualified_name: String,
                file_path: String,
                line_start: Int,
                line_end: Int,
                complexity: Int,
                properties_json: String
            }"#,
            r#":create edges {
                id: String
                =>
                source_id: String,
                target_id: String,
                kind: String,
                properties_json: String
            }"#,
            r#":create embeddings {
                node_id: String,
                embedding_type: String
                =>
                dimension: Int,
                vector_json: String
            }"#,
            r#":create meta {
                key: String
                =>
                value: String
            }"#,
        ];
        for script in statements {
            self.ignore_exists(self.run_mut(script, BTreeMap::new()))?;
        }
        Ok(())
    }

    /// Creates the temporal relations on first use (SPEC_FULL.md §4.1).
    fn ensure_temporal_schema(&self) -> Result<()> {
        if self.temporal_ready.load(std::sync::atomic::Ordering::Relaxed) {
            return Ok(());
        }
        let statements = [
            r#":create snapshots {
                id: String
                =>
                commit_hash: String,
                commit_message: String,
                commit_author: String,
                commit_date: String,
                parent_id: String,
                total_nodes: Int,
                total_edges: Int,
                nodes_added: Int,
                nodes_removed: Int,
                nodes_modified: Int,
                edges_added: Int,
                edges_removed: Int,
                edges_modified: Int
            }"#,
            r#":create node_changes {
                snapshot_id: String,
                node_id: String
                =>
                change_type: String,
                content_hash: String
            }"#,
            r#":create edge_changes {
                snapshot_id: String,
                edge_id: String
                =>
                change_type: String,
                content_hash: String
            }"#,
        ];
        for script in statements {
            self.ignore_exists(self.run_mut(script, BTreeMap::new()))?;
        }
        self.temporal_ready.store(true, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    fn ignore_exists(&self, result: Result<NamedRows>) -> Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("already exists") {
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    fn run_mut(&self, script: &str, params: BTreeMap<String, DataValue>) -> Result<NamedRows> {
        self.db
            .run_script(script, params, ScriptMutability::Mutable)
            .map_err(cozo_err)
    }

    fn run_query(&self, script: &str, params: BTreeMap<String, DataValue>) -> Result<NamedRows> {
        self.db
            .run_script(script, params, ScriptMutability::Immutable)
            .map_err(cozo_err)
    }

    fn epoch_unlocked(&self) -> u64 {
        let result = self.run_query(
            "?[value] := *meta{key, value}, key = \"epoch\"",
            BTreeMap::new(),
        );
        match result {
            Ok(rows) if !rows.rows.is_empty() => {
                row_str(&rows.rows[0][0]).unwrap_or("0").parse().unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn bump_epoch(&self) -> Result<u64> {
        let next = self.epoch_unlocked() + 1;
        let mut params = BTreeMap::new();
        params.insert("v".to_string(), DataValue::Str(next.to_string().into()));
        self.run_mut(
            r#"?[key, value] <- [["epoch", $v]] :put meta {key => value}"#,
            params,
        )?;
        Ok(next)
    }

    fn root_path_unlocked(&self) -> PathBuf {
        let result = self.run_query(
            "?[value] := *meta{key, value}, key = \"root_path\"",
            BTreeMap::new(),
        );
        match result {
            Ok(rows) if !rows.rows.is_empty() => {
                PathBuf::from(row_str(&rows.rows[0][0]).unwrap_or(""))
            }
            _ => PathBuf::new(),
        }
    }

    fn node_to_row(node: &Node) -> Result<Vec<DataValue>> {
        let props = serde_json::to_string(&node.properties).map_err(|e| MuError::Corruption(e.to_string()))?;
        Ok(vec![
            DataValue::Str(node.id.clone().into()),
            DataValue::Str(node.kind.as_str().into()),
            DataValue::Str(node.name.clone().into()),
            DataValue::Str(node.qualified_name.clone().into()),
            DataValue::Str(node.file_path.clone().into()),
            DataValue::from(node.line_start as i64),
            DataValue::from(node.line_end as i64),
            DataValue::from(node.complexity as i64),
            DataValue::Str(props.into()),
        ])
    }

    fn row_to_node(row: &[DataValue]) -> Result<Node> {
        let kind: NodeKind = row_str(&row[1])?.parse().map_err(MuError::Corruption)?;
        let properties: Properties =
            serde_json::from_str(row_str(&row[8])?).map_err(|e| MuError::Corruption(e.to_string()))?;
        Ok(Node {
            id: row_str(&row[0])?.to_string(),
            kind,
            name: row_str(&row[2])?.to_string(),
            qualified_name: row_str(&row[3])?.to_string(),
            file_path: row_str(&row[4])?.to_string(),
            line_start: row_int(&row[5])? as u32,
            line_end: row_int(&row[6])? as u32,
            complexity: row_int(&row[7])? as u32,
            properties,
        })
    }

    fn edge_to_row(edge: &Edge) -> Result<Vec<DataValue>> {
        let props = serde_json::to_string(&edge.properties).map_err(|e| MuError::Corruption(e.to_string()))?;
        Ok(vec![
            DataValue::Str(edge.id.clone().into()),
            DataValue::Str(edge.source_id.clone().into()),
            DataValue::Str(edge.target_id.clone().into()),
            DataValue::Str(edge.kind.as_str().into()),
            DataValue::Str(props.into()),
        ])
    }

    fn row_to_edge(row: &[DataValue]) -> Result<Edge> {
        let kind: EdgeKind = row_str(&row[3])?.parse().map_err(MuError::Corruption)?;
        let properties: EdgeProperties =
            serde_json::from_str(row_str(&row[4])?).map_err(|e| MuError::Corruption(e.to_string()))?;
        Ok(Edge {
            id: row_str(&row[0])?.to_string(),
            source_id: row_str(&row[1])?.to_string(),
            target_id: row_str(&row[2])?.to_string(),
            kind,
            properties,
        })
    }

    fn all_nodes(&self) -> Result<Vec<Node>> {
        let rows = self.run_query(
            "?[id, kind, name, qualified_name, file_path, line_start, line_end, complexity, properties_json] := \
             *nodes{id, kind, name, qualified_name, file_path, line_start, line_end, complexity, properties_json}",
            BTreeMap::new(),
        )?;
        rows.rows.iter().map(|r| Self::row_to_node(r)).collect()
    }

    fn all_edges(&self) -> Result<Vec<Edge>> {
        let rows = self.run_query(
            "?[id, source_id, target_id, kind, properties_json] := \
             *edges{id, source_id, target_id, kind, properties_json}",
            BTreeMap::new(),
        )?;
        rows.rows.iter().map(|r| Self::row_to_edge(r)).collect()
    }
}

fn row_int(val: &DataValue) -> Result<i64> {
    match val {
        DataValue::Num(Num::Int(i)) => Ok(*i),
        DataValue::Num(Num::Float(f)) => Ok(*f as i64),
        other => Err(MuError::Corruption(format!("expected integer, got {other:?}"))),
    }
}

fn row_str(val: &DataValue) -> Result<&str> {
    match val {
        DataValue::Str(s) => Ok(s.as_str()),
        other => Err(MuError::Corruption(format!("expected string, got {other:?}"))),
    }
}

impl Store for CozoStore {
    fn add_node(&mut self, node: Node) -> Result<()> {
        let row = Self::node_to_row(&node)?;
        let mut params = BTreeMap::new();
        params.insert("row".to_string(), DataValue::List(row));
        self.run_mut(
            r#"?[id, kind, name, qualified_name, file_path, line_start, line_end, complexity, properties_json] <- [$row]
               :put nodes {id => kind, name, qualified_name, file_path, line_start, line_end, complexity, properties_json}"#,
            params,
        )?;
        self.bump_epoch()?;
        Ok(())
    }

    fn add_edge(&mut self, edge: Edge) -> Result<()> {
        if self.get_node(&edge.source_id)?.is_none() || self.get_node(&edge.target_id)?.is_none() {
            return Err(MuError::NotFound(format!(
                "edge endpoint missing: {} -> {}",
                edge.source_id, edge.target_id
            )));
        }
        let row = Self::edge_to_row(&edge)?;
        let mut params = BTreeMap::new();
        params.insert("row".to_string(), DataValue::List(row));
        self.run_mut(
            r#"?[id, source_id, target_id, kind, properties_json] <- [$row]
               :put edges {id => source_id, target_id, kind, properties_json}"#,
            params,
        )?;
        self.bump_epoch()?;
        Ok(())
    }

    fn add_embedding(&mut self, embedding: Embedding) -> Result<()> {
        let existing = self.run_query(
            "?[value] := *meta{key, value}, key = \"embedding_dimension\"",
            BTreeMap::new(),
        )?;
        if let Some(row) = existing.rows.first() {
            let dim: u32 = row_str(&row[0])?.parse().unwrap_or(embedding.dimension);
            if dim != embedding.dimension {
                return Err(MuError::Config(format!(
                    "embedding dimension mismatch: store uses {dim}, got {}",
                    embedding.dimension
                )));
            }
        } else {
            let mut params = BTreeMap::new();
            params.insert(
                "v".to_string(),
                DataValue::Str(embedding.dimension.to_string().into()),
            );
            self.run_mut(
                r#"?[key, value] <- [["embedding_dimension", $v]] :put meta {key => value}"#,
                params,
            )?;
        }

        let vector_json =
            serde_json::to_string(&embedding.vector).map_err(|e| MuError::Corruption(e.to_string()))?;
        let mut params = BTreeMap::new();
        params.insert("node_id".to_string(), DataValue::Str(embedding.node_id.clone().into()));
        params.insert(
            "etype".to_string(),
            DataValue::Str(embedding.embedding_type.as_str().into()),
        );
        params.insert("dim".to_string(), DataValue::from(embedding.dimension as i64));
        params.insert("vec".to_string(), DataValue::Str(vector_json.into()));
        self.run_mut(
            r#"?[node_id, embedding_type, dimension, vector_json] <- [[$node_id, $etype, $dim, $vec]]
               :put embeddings {node_id, embedding_type => dimension, vector_json}"#,
            params,
        )?;
        Ok(())
    }

    fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), DataValue::Str(id.into()));
        let rows = self.run_query(
            r#"?[id, kind, name, qualified_name, file_path, line_start, line_end, complexity, properties_json] :=
                *nodes{id, kind, name, qualified_name, file_path, line_start, line_end, complexity, properties_json},
                id = $id"#,
            params,
        )?;
        rows.rows.first().map(|r| Self::row_to_node(r)).transpose()
    }

    fn get_edge(&self, id: &str) -> Result<Option<Edge>> {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), DataValue::Str(id.into()));
        let rows = self.run_query(
            r#"?[id, source_id, target_id, kind, properties_json] :=
                *edges{id, source_id, target_id, kind, properties_json},
                id = $id"#,
            params,
        )?;
        rows.rows.first().map(|r| Self::row_to_edge(r)).transpose()
    }

    fn find_by_name(&self, pattern: &str, limit: usize) -> Result<Vec<Node>> {
        // Cozo's query surface doesn't give us `%`-glob matching directly;
        // scan and filter in Rust, same approach the memory store uses
        // (acceptable per SPEC_FULL.md §4.1 "linear scan is acceptable").
        let mut matches: Vec<Node> = self
            .all_nodes()?
            .into_iter()
            .filter(|n| super::memory::glob_match(pattern, &n.name) || super::memory::glob_match(pattern, &n.qualified_name))
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
        let mut params = BTreeMap::new();
        params.insert("src".to_string(), DataValue::Str(id.into()));
        let rows = self.run_query(
            r#"?[target_id] := *edges{source_id, target_id, kind}, source_id = $src, kind = "contains""#,
            params,
        )?;
        rows.rows
            .iter()
            .filter_map(|r| row_str(&r[0]).ok().map(|s| s.to_string()))
            .map(|id| self.get_node(&id))
            .filter_map(|r| r.transpose())
            .collect()
    }

    fn get_dependents(&self, id: &str, depth: usize, edge_kinds: Option<&[EdgeKind]>) -> Result<Vec<Node>> {
        let graph = self.snapshot_graph()?;
        if !graph.contains(id) {
            return Err(MuError::NotFound(id.to_string()));
        }
        let engine = crate::engine::GraphEngine::load(&graph);
        let ids = engine.impact_depth(id, edge_kinds, Some(depth))?;
        Ok(ids.into_iter().filter_map(|i| graph.node(&i).cloned()).collect())
    }

    fn vector_search(&self, query: &[f32], embedding_type: EmbeddingType, limit: usize) -> Result<Vec<(Node, f32)>> {
        let mut params = BTreeMap::new();
        params.insert("etype".to_string(), DataValue::Str(embedding_type.as_str().into()));
        let rows = self.run_query(
            r#"?[node_id, vector_json] := *embeddings{node_id, embedding_type, vector_json}, embedding_type = $etype"#,
            params,
        )?;

        let mut scored = Vec::new();
        for row in &rows.rows {
            let node_id = row_str(&row[0])?;
            let vector: Vec<f32> =
                serde_json::from_str(row_str(&row[1])?).map_err(|e| MuError::Corruption(e.to_string()))?;
            if let Some(node) = self.get_node(node_id)? {
                scored.push((node, super::memory::cosine_similarity(query, &vector)));
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    fn execute(&self, statement: &str) -> Result<serde_json::Value> {
        let rows = self.run_query(statement, BTreeMap::new())?;
        let headers = rows.headers.clone();
        let out: Vec<serde_json::Value> = rows
            .rows
            .iter()
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (h, v) in headers.iter().zip(row.iter()) {
                    obj.insert(h.clone(), datavalue_to_json(v));
                }
                serde_json::Value::Object(obj)
            })
            .collect();
        Ok(serde_json::Value::Array(out))
    }

    fn stats(&self) -> Result<StoreStats> {
        let nodes = self.all_nodes()?;
        let edges = self.all_edges()?;
        let mut node_counts = std::collections::BTreeMap::new();
        for n in &nodes {
            *node_counts.entry(n.kind.as_str().to_string()).or_insert(0) += 1;
        }
        let mut edge_counts = std::collections::BTreeMap::new();
        for e in &edges {
            *edge_counts.entry(e.kind.as_str().to_string()).or_insert(0) += 1;
        }
        let dim_rows = self.run_query(
            "?[value] := *meta{key, value}, key = \"embedding_dimension\"",
            BTreeMap::new(),
        )?;
        let embedding_dimension = dim_rows
            .rows
            .first()
            .and_then(|r| row_str(&r[0]).ok())
            .and_then(|s| s.parse().ok());
        let emb_count = self.run_query("?[node_id] := *embeddings{node_id}", BTreeMap::new())?;

        Ok(StoreStats {
            total_nodes: nodes.len(),
            node_counts,
            edge_counts,
            embedding_dimension,
            nodes_with_embeddings: emb_count.rows.len(),
            root_path: self.root_path_unlocked(),
            epoch: self.epoch_unlocked(),
        })
    }

    fn build(&mut self, nodes: Vec<Node>, edges: Vec<Edge>, root: &Path) -> Result<()> {
        // Clear the current working set (SPEC_FULL.md §4.1 "delete the
        // current working set, insert all nodes and edges ... atomic"), each
        // as a single bulk Datalog delete rather than one execution per row
        // (teacher idiom, `examples/umitkavala-revet/.../cozo.rs::delete_snapshot`).
        self.run_mut(
            r#"?[id, source_id, target_id, kind, properties_json] :=
                *edges{id, source_id, target_id, kind, properties_json}
            :delete edges {id => source_id, target_id, kind, properties_json}"#,
            BTreeMap::new(),
        )?;
        self.run_mut(
            r#"?[id, kind, name, qualified_name, file_path, line_start, line_end, complexity, properties_json] :=
                *nodes{id, kind, name, qualified_name, file_path, line_start, line_end, complexity, properties_json}
            :delete nodes {id => kind, name, qualified_name, file_path, line_start, line_end, complexity, properties_json}"#,
            BTreeMap::new(),
        )?;

        if !nodes.is_empty() {
            let node_rows: Vec<Vec<DataValue>> = nodes
                .iter()
                .map(Self::node_to_row)
                .collect::<Result<_>>()?;
            let mut data = BTreeMap::new();
            data.insert(
                "nodes".to_string(),
                NamedRows {
                    headers: vec![
                        "id".into(),
                        "kind".into(),
                        "name".into(),
                        "qualified_name".into(),
                        "file_path".into(),
                        "line_start".into(),
                        "line_end".into(),
                        "complexity".into(),
                        "properties_json".into(),
                    ],
                    rows: node_rows,
                    next: None,
                },
            );
            self.db
                .import_relations(data)
                .map_err(|e| MuError::Corruption(format!("importing nodes: {e}")))?;
        }

        if !edges.is_empty() {
            let edge_rows: Vec<Vec<DataValue>> = edges
                .iter()
                .map(Self::edge_to_row)
                .collect::<Result<_>>()?;
            let mut data = BTreeMap::new();
            data.insert(
                "edges".to_string(),
                NamedRows {
                    headers: vec![
                        "id".into(),
                        "source_id".into(),
                        "target_id".into(),
                        "kind".into(),
                        "properties_json".into(),
                    ],
                    rows: edge_rows,
                    next: None,
                },
            );
            self.db
                .import_relations(data)
                .map_err(|e| MuError::Corruption(format!("importing edges: {e}")))?;
        }

        let mut params = BTreeMap::new();
        params.insert(
            "v".to_string(),
            DataValue::Str(root.to_string_lossy().replace('\\', "/").into()),
        );
        self.run_mut(
            r#"?[key, value] <- [["root_path", $v]] :put meta {key => value}"#,
            params,
        )?;
        self.bump_epoch()?;
        Ok(())
    }

    fn epoch(&self) -> u64 {
        self.epoch_unlocked()
    }

    fn snapshot_graph(&self) -> Result<CodeGraph> {
        let root = self.root_path_unlocked();
        let mut graph = CodeGraph::new(root);
        for node in self.all_nodes()? {
            graph.add_node(node);
        }
        for edge in self.all_edges()? {
            let _ = graph.add_edge(edge);
        }
        Ok(graph)
    }

    fn write_snapshot(
        &mut self,
        snapshot: Snapshot,
        node_changes: Vec<NodeChange>,
        edge_changes: Vec<EdgeChange>,
    ) -> Result<()> {
        self.ensure_temporal_schema()?;

        let mut params = BTreeMap::new();
        params.insert("id".to_string(), DataValue::Str(snapshot.id.clone().into()));
        params.insert("commit_hash".to_string(), DataValue::Str(snapshot.commit_hash.clone().into()));
        params.insert("commit_message".to_string(), DataValue::Str(snapshot.commit_message.clone().into()));
        params.insert("commit_author".to_string(), DataValue::Str(snapshot.commit_author.clone().into()));
        params.insert("commit_date".to_string(), DataValue::Str(snapshot.commit_date.clone().into()));
        params.insert(
            "parent_id".to_string(),
            DataValue::Str(snapshot.parent_id.clone().unwrap_or_default().into()),
        );
        params.insert("total_nodes".to_string(), DataValue::from(snapshot.total_nodes as i64));
        params.insert("total_edges".to_string(), DataValue::from(snapshot.total_edges as i64));
        params.insert("nodes_added".to_string(), DataValue::from(snapshot.nodes_added as i64));
        params.insert("nodes_removed".to_string(), DataValue::from(snapshot.nodes_removed as i64));
        params.insert("nodes_modified".to_string(), DataValue::from(snapshot.nodes_modified as i64));
        params.insert("edges_added".to_string(), DataValue::from(snapshot.edges_added as i64));
        params.insert("edges_removed".to_string(), DataValue::from(snapshot.edges_removed as i64));
        params.insert("edges_modified".to_string(), DataValue::from(snapshot.edges_modified as i64));

        self.run_mut(
            r#"?[id, commit_hash, commit_message, commit_author, commit_date, parent_id,
                 total_nodes, total_edges, nodes_added, nodes_removed, nodes_modified,
                 edges_added, edges_removed, edges_modified] <- [[
                   $id, $commit_hash, $commit_message, $commit_author, $commit_date, $parent_id,
                   $total_nodes, $total_edges, $nodes_added, $nodes_removed, $nodes_modified,
                   $edges_added, $edges_removed, $edges_modified
                 ]]
               :put snapshots {id => commit_hash, commit_message, commit_author, commit_date, parent_id,
                 total_nodes, total_edges, nodes_added, nodes_removed, nodes_modified,
                 edges_added, edges_removed, edges_modified}"#,
            params,
        )?;

        if !node_changes.is_empty() {
            let rows: Vec<Vec<DataValue>> = node_changes
                .iter()
                .map(|c| {
                    vec![
                        DataValue::Str(c.snapshot_id.clone().into()),
                        DataValue::Str(c.node_id.clone().into()),
                        DataValue::Str(c.change_type.as_str().into()),
                        DataValue::Str(c.content_hash.clone().into()),
                    ]
                })
                .collect();
            let mut data = BTreeMap::new();
            data.insert(
                "node_changes".to_string(),
                NamedRows {
                    headers: vec!["snapshot_id".into(), "node_id".into(), "change_type".into(), "content_hash".into()],
                    rows,
                    next: None,
                },
            );
            self.db
                .import_relations(data)
                .map_err(|e| MuError::Corruption(format!("importing node_changes: {e}")))?;
        }

        if !edge_changes.is_empty() {
            let rows: Vec<Vec<DataValue>> = edge_changes
                .iter()
                .map(|c| {
                    vec![
                        DataValue::Str(c.snapshot_id.clone().into()),
                        DataValue::Str(c.edge_id.clone().into()),
                        DataValue::Str(c.change_type.as_str().into()),
                        DataValue::Str(c.content_hash.clone().into()),
                    ]
                })
                .collect();
            let mut data = BTreeMap::new();
            data.insert(
                "edge_changes".to_string(),
                NamedRows {
                    headers: vec!["snapshot_id".into(), "edge_id".into(), "change_type".into(), "content_hash".into()],
                    rows,
                    next: None,
                },
            );
            self.db
                .import_relations(data)
                .map_err(|e| MuError::Corruption(format!("importing edge_changes: {e}")))?;
        }

        Ok(())
    }

    fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        self.ensure_temporal_schema()?;
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), DataValue::Str(id.into()));
        let rows = self.run_query(
            r#"?[id, commit_hash, commit_message, commit_author, commit_date, parent_id,
                 total_nodes, total_edges, nodes_added, nodes_removed, nodes_modified,
                 edges_added, edges_removed, edges_modified] :=
                *snapshots{id, commit_hash, commit_message, commit_author, commit_date, parent_id,
                 total_nodes, total_edges, nodes_added, nodes_removed, nodes_modified,
                 edges_added, edges_removed, edges_modified}, id = $id"#,
            params,
        )?;
        rows.rows.first().map(|r| row_to_snapshot(r)).transpose()
    }

    fn snapshot_by_commit(&self, commit_hash: &str) -> Result<Option<Snapshot>> {
        self.ensure_temporal_schema()?;
        let mut params = BTreeMap::new();
        params.insert("c".to_string(), DataValue::Str(commit_hash.into()));
        let rows = self.run_query(
            r#"?[id, commit_hash, commit_message, commit_author, commit_date, parent_id,
                 total_nodes, total_edges, nodes_added, nodes_removed, nodes_modified,
                 edges_added, edges_removed, edges_modified] :=
                *snapshots{id, commit_hash, commit_message, commit_author, commit_date, parent_id,
                 total_nodes, total_edges, nodes_added, nodes_removed, nodes_modified,
                 edges_added, edges_removed, edges_modified}, commit_hash = $c"#,
            params,
        )?;
        rows.rows.first().map(|r| row_to_snapshot(r)).transpose()
    }

    fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.ensure_temporal_schema()?;
        let rows = self.run_query(
            r#"?[id, commit_hash, commit_message, commit_author, commit_date, parent_id,
                 total_nodes, total_edges, nodes_added, nodes_removed, nodes_modified,
                 edges_added, edges_removed, edges_modified] :=
                *snapshots{id, commit_hash, commit_message, commit_author, commit_date, parent_id,
                 total_nodes, total_edges, nodes_added, nodes_removed, nodes_modified,
                 edges_added, edges_removed, edges_modified}"#,
            BTreeMap::new(),
        )?;
        let mut out: Vec<Snapshot> = rows.rows.iter().map(|r| row_to_snapshot(r)).collect::<Result<_>>()?;
        out.sort_by(|a, b| a.commit_date.cmp(&b.commit_date));
        Ok(out)
    }

    fn node_changes_at(&self, snapshot_id: &str) -> Result<Vec<NodeChange>> {
        self.ensure_temporal_schema()?;
        let mut params = BTreeMap::new();
        params.insert("sid".to_string(), DataValue::Str(snapshot_id.into()));
        let rows = self.run_query(
            r#"?[snapshot_id, node_id, change_type, content_hash] :=
                *node_changes{snapshot_id, node_id, change_type, content_hash}, snapshot_id = $sid"#,
            params,
        )?;
        rows.rows
            .iter()
            .map(|r| {
                Ok(NodeChange {
                    snapshot_id: row_str(&r[0])?.to_string(),
                    node_id: row_str(&r[1])?.to_string(),
                    change_type: parse_change_type(row_str(&r[2])?)?,
                    content_hash: row_str(&r[3])?.to_string(),
                })
            })
            .collect()
    }

    fn edge_changes_at(&self, snapshot_id: &str) -> Result<Vec<EdgeChange>> {
        self.ensure_temporal_schema()?;
        let mut params = BTreeMap::new();
        params.insert("sid".to_string(), DataValue::Str(snapshot_id.into()));
        let rows = self.run_query(
            r#"?[snapshot_id, edge_id, change_type, content_hash] :=
                *edge_changes{snapshot_id, edge_id, change_type, content_hash}, snapshot_id = $sid"#,
            params,
        )?;
        rows.rows
            .iter()
            .map(|r| {
                Ok(EdgeChange {
                    snapshot_id: row_str(&r[0])?.to_string(),
                    edge_id: row_str(&r[1])?.to_string(),
                    change_type: parse_change_type(row_str(&r[2])?)?,
                    content_hash: row_str(&r[3])?.to_string(),
                })
            })
            .collect()
    }

    fn delete_snapshot(&mut self, id: &str) -> Result<()> {
        self.ensure_temporal_schema()?;
        for change in self.node_changes_at(id)? {
            let mut params = BTreeMap::new();
            params.insert("sid".to_string(), DataValue::Str(change.snapshot_id.into()));
            params.insert("nid".to_string(), DataValue::Str(change.node_id.into()));
            self.run_mut("?[snapshot_id, node_id] <- [[$sid, $nid]] :rm node_changes {snapshot_id, node_id}", params)?;
        }
        for change in self.edge_changes_at(id)? {
            let mut params = BTreeMap::new();
            params.insert("sid".to_string(), DataValue::Str(change.snapshot_id.into()));
            params.insert("eid".to_string(), DataValue::Str(change.edge_id.into()));
            self.run_mut("?[snapshot_id, edge_id] <- [[$sid, $eid]] :rm edge_changes {snapshot_id, edge_id}", params)?;
        }
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), DataValue::Str(id.into()));
        self.run_mut("?[id] <- [[$id]] :rm snapshots {id}", params)?;
        Ok(())
    }
}

fn row_to_snapshot(row: &[DataValue]) -> Result<Snapshot> {
    let parent_raw = row_str(&row[5])?;
    Ok(Snapshot {
        id: row_str(&row[0])?.to_string(),
        commit_hash: row_str(&row[1])?.to_string(),
        commit_message: row_str(&row[2])?.to_string(),
        commit_author: row_str(&row[3])?.to_string(),
        commit_date: row_str(&row[4])?.to_string(),
        parent_id: if parent_raw.is_empty() { None } else { Some(parent_raw.to_string()) },
        total_nodes: row_int(&row[6])? as usize,
        total_edges: row_int(&row[7])? as usize,
        nodes_added: row_int(&row[8])? as usize,
        nodes_removed: row_int(&row[9])? as usize,
        nodes_modified: row_int(&row[10])? as usize,
        edges_added: row_int(&row[11])? as usize,
        edges_removed: row_int(&row[12])? as usize,
        edges_modified: row_int(&row[13])? as usize,
    })
}

fn parse_change_type(s: &str) -> Result<ChangeType> {
    match s {
        "added" => Ok(ChangeType::Added),
        "removed" => Ok(ChangeType::Removed),
        "modified" => Ok(ChangeType::Modified),
        "unchanged" => Ok(ChangeType::Unchanged),
        other => Err(MuError::Corruption(format!("unknown change_type {other:?}"))),
    }
}

fn datavalue_to_json(v: &DataValue) -> serde_json::Value {
    match v {
        DataValue::Null => serde_json::Value::Null,
        DataValue::Bool(b) => serde_json::Value::Bool(*b),
        DataValue::Num(Num::Int(i)) => serde_json::Value::from(*i),
        DataValue::Num(Num::Float(f)) => serde_json::Value::from(*f),
        DataValue::Str(s) => serde_json::Value::String(s.to_string()),
        DataValue::List(items) => serde_json::Value::Array(items.iter().map(datavalue_to_json).collect()),
        other => serde_json::Value::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    fn node(name: &str, path: &str) -> Node {
        Node::new(NodeKind::Module, name, name, path, 1, 10)
    }

    #[test]
    fn build_then_get_round_trips() {
        let mut store = CozoStore::open_memory().unwrap();
        let n = node("a", "a.py");
        store.build(vec![n.clone()], vec![], Path::new("/repo")).unwrap();
        let fetched = store.get_node(&n.id).unwrap().unwrap();
        assert_eq!(fetched.name, "a");
        assert_eq!(store.stats().unwrap().total_nodes, 1);
    }

    #[test]
    fn add_edge_fails_on_missing_endpoint() {
        let mut store = CozoStore::open_memory().unwrap();
        let n = node("a", "a.py");
        store.build(vec![n.clone()], vec![], Path::new("/repo")).unwrap();
        let err = store.add_edge(Edge::new(n.id, "module:missing.py", EdgeKind::Imports));
        assert!(err.is_err());
    }
}
