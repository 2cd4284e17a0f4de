//! Integration tests for name resolution (SPEC_FULL.md §4.4).

use mu_core::{CodeGraph, MuError, Node, NodeKind, ResolveStrategy, Resolver};

fn graph_with(nodes: Vec<Node>) -> CodeGraph {
    let mut g = CodeGraph::new("/repo".into());
    for n in nodes {
        g.add_node(n);
    }
    g
}

#[test]
fn exact_id_short_circuits_every_other_tier() {
    let target = Node::new(NodeKind::Function, "parse", "mod::parse", "src/mod.py", 10, 20);
    let id = target.id.clone();
    let g = graph_with(vec![target]);

    let resolved = Resolver::new(&g).resolve(&id, ResolveStrategy::PreferSource).unwrap();
    assert_eq!(resolved.resolution_method, "exact_id");
    assert!(!resolved.was_ambiguous);
}

#[test]
fn prefer_source_skips_test_location_candidates() {
    let source_fn = Node::new(NodeKind::Function, "validate", "validate", "src/lib.py", 1, 5);
    let test_fn = Node::new(NodeKind::Function, "validate", "validate", "tests/test_lib.py", 1, 5);
    let g = graph_with(vec![source_fn.clone(), test_fn]);

    let resolved = Resolver::new(&g).resolve("validate", ResolveStrategy::PreferSource).unwrap();
    assert_eq!(resolved.node.id, source_fn.id);
}

#[test]
fn strict_rejects_any_ambiguity() {
    let a = Node::new(NodeKind::Function, "run", "run", "a.py", 1, 5);
    let b = Node::new(NodeKind::Function, "run", "run", "b.py", 1, 5);
    let g = graph_with(vec![a, b]);

    let err = Resolver::new(&g).resolve("run", ResolveStrategy::Strict).unwrap_err();
    assert!(matches!(err, MuError::Ambiguous { .. }));
}

#[test]
fn suffix_qualified_name_matches_a_dotted_path_fragment() {
    let node = Node::new(NodeKind::Method, "save", "models.User.save", "src/models.py", 30, 40);
    let g = graph_with(vec![node.clone()]);

    let resolved = Resolver::new(&g).resolve("User.save", ResolveStrategy::PreferSource).unwrap();
    assert_eq!(resolved.node.id, node.id);
    assert_eq!(resolved.resolution_method, "suffix_qualified_name");
}

#[test]
fn unknown_reference_is_not_found() {
    let g = graph_with(vec![]);
    let err = Resolver::new(&g).resolve("nothing_here", ResolveStrategy::PreferSource).unwrap_err();
    assert!(matches!(err, MuError::NotFound(_)));
}

#[test]
fn first_match_takes_the_top_scored_candidate_without_filtering_tests() {
    let test_fn = Node::new(NodeKind::Function, "run", "run", "tests/test_run.py", 1, 5);
    let g = graph_with(vec![test_fn.clone()]);

    let resolved = Resolver::new(&g).resolve("run", ResolveStrategy::FirstMatch).unwrap();
    assert_eq!(resolved.node.id, test_fn.id);
}
