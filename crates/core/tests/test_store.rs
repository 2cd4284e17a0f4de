//! Integration tests for the `Store` trait against `MemoryStore`
//! (SPEC_FULL.md §4.1).

use mu_core::store::memory::MemoryStore;
use mu_core::{Edge, EdgeKind, Embedding, EmbeddingType, Node, NodeKind, Store};
use std::path::PathBuf;

fn module(path: &str) -> Node {
    Node::new(NodeKind::Module, path, path, path, 1, 1)
}

fn function(path: &str, name: &str) -> Node {
    Node::new(NodeKind::Function, name, format!("{path}::{name}"), path, 1, 5)
}

#[test]
fn add_and_fetch_round_trips() {
    let mut store = MemoryStore::new();
    let node = function("a.py", "foo");
    store.add_node(node.clone()).unwrap();
    let fetched = store.get_node(&node.id).unwrap().unwrap();
    assert_eq!(fetched, node);
}

#[test]
fn find_by_name_wildcard_matches_substring() {
    let mut store = MemoryStore::new();
    store.add_node(function("a.py", "foo_bar")).unwrap();
    store.add_node(function("b.py", "baz")).unwrap();

    let results = store.find_by_name("%foo%", 10).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "foo_bar");
}

#[test]
fn get_children_follows_contains_edges() {
    let mut store = MemoryStore::new();
    let m = module("a.py");
    let f = function("a.py", "foo");
    store.add_node(m.clone()).unwrap();
    store.add_node(f.clone()).unwrap();
    store.add_edge(Edge::new(m.id.clone(), f.id.clone(), EdgeKind::Contains)).unwrap();

    let children = store.get_children(&m.id).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, f.id);
}

#[test]
fn get_dependents_respects_depth_and_edge_kind_filter() {
    let mut store = MemoryStore::new();
    let a = module("a.py");
    let b = module("b.py");
    let c = module("c.py");
    store.add_node(a.clone()).unwrap();
    store.add_node(b.clone()).unwrap();
    store.add_node(c.clone()).unwrap();
    // a -> b -> c (imports)
    store.add_edge(Edge::new(a.id.clone(), b.id.clone(), EdgeKind::Imports)).unwrap();
    store.add_edge(Edge::new(b.id.clone(), c.id.clone(), EdgeKind::Imports)).unwrap();

    let one_hop = store.get_dependents(&c.id, 1, Some(&[EdgeKind::Imports])).unwrap();
    assert_eq!(one_hop.iter().map(|n| &n.id).collect::<Vec<_>>(), vec![&b.id]);

    let two_hop = store.get_dependents(&c.id, 2, Some(&[EdgeKind::Imports])).unwrap();
    let mut ids: Vec<&String> = two_hop.iter().map(|n| &n.id).collect();
    ids.sort();
    let mut expected = vec![&a.id, &b.id];
    expected.sort();
    assert_eq!(ids, expected);

    let no_calls = store.get_dependents(&c.id, 2, Some(&[EdgeKind::Calls])).unwrap();
    assert!(no_calls.is_empty());
}

#[test]
fn vector_search_ranks_by_cosine_similarity() {
    let mut store = MemoryStore::new();
    let near = function("a.py", "near");
    let far = function("b.py", "far");
    store.add_node(near.clone()).unwrap();
    store.add_node(far.clone()).unwrap();

    store
        .add_embedding(Embedding {
            node_id: near.id.clone(),
            embedding_type: EmbeddingType::Code,
            dimension: 3,
            vector: vec![1.0, 0.0, 0.0],
        })
        .unwrap();
    store
        .add_embedding(Embedding {
            node_id: far.id.clone(),
            embedding_type: EmbeddingType::Code,
            dimension: 3,
            vector: vec![0.0, 1.0, 0.0],
        })
        .unwrap();

    let results = store.vector_search(&[1.0, 0.0, 0.0], EmbeddingType::Code, 10).unwrap();
    assert_eq!(results[0].0.id, near.id);
}

#[test]
fn build_replaces_the_working_set_and_bumps_epoch() {
    let mut store = MemoryStore::new();
    let epoch0 = store.epoch();
    store.add_node(function("a.py", "foo")).unwrap();

    let new_node = function("b.py", "bar");
    store.build(vec![new_node.clone()], vec![], &PathBuf::from("/repo")).unwrap();

    assert!(store.epoch() > epoch0);
    assert!(store.get_node(&new_node.id).unwrap().is_some());
    // the previous working set is gone after a rebuild
    let stats = store.stats().unwrap();
    assert_eq!(stats.total_nodes, 1);
}

#[test]
fn snapshot_graph_materialises_an_independent_codegraph() {
    let mut store = MemoryStore::new();
    let node = function("a.py", "foo");
    store.add_node(node.clone()).unwrap();

    let graph = store.snapshot_graph().unwrap();
    assert!(graph.contains(&node.id));
}

#[test]
fn snapshot_lifecycle_write_read_delete() {
    use mu_core::store::{ChangeType, EdgeChange, NodeChange, Snapshot};

    let mut store = MemoryStore::new();
    let snapshot = Snapshot {
        id: "snap-1".to_string(),
        commit_hash: "deadbeef".to_string(),
        commit_message: "initial".to_string(),
        commit_author: "tester".to_string(),
        commit_date: "2026-01-01T00:00:00Z".to_string(),
        parent_id: None,
        total_nodes: 1,
        total_edges: 0,
        nodes_added: 1,
        nodes_removed: 0,
        nodes_modified: 0,
        edges_added: 0,
        edges_removed: 0,
        edges_modified: 0,
    };
    let node_change = NodeChange {
        snapshot_id: "snap-1".to_string(),
        node_id: "module:a.py".to_string(),
        change_type: ChangeType::Added,
        content_hash: "abc123".to_string(),
    };
    let edge_change: Vec<EdgeChange> = vec![];

    store.write_snapshot(snapshot.clone(), vec![node_change], edge_change).unwrap();

    let fetched = store.get_snapshot("snap-1").unwrap().unwrap();
    assert_eq!(fetched.commit_hash, "deadbeef");
    assert_eq!(store.snapshot_by_commit("deadbeef").unwrap().unwrap().id, "snap-1");
    assert_eq!(store.list_snapshots().unwrap().len(), 1);
    assert_eq!(store.node_changes_at("snap-1").unwrap().len(), 1);

    store.delete_snapshot("snap-1").unwrap();
    assert!(store.get_snapshot("snap-1").unwrap().is_none());
    assert!(store.node_changes_at("snap-1").unwrap().is_empty());
}
