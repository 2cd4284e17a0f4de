//! `mu impact NODE_REF [--depth N] [--type EDGE_KIND...]` (SPEC_FULL.md §6, §4.3).

use std::path::Path;

use mu_core::{EdgeKind, GraphEngine, MuError, OpenMode, ResolveStrategy, Resolver};

use crate::output::{node_line, print_json};

fn parse_edge_kind(s: &str) -> anyhow::Result<EdgeKind> {
    match s.trim().to_lowercase().as_str() {
        "contains" => Ok(EdgeKind::Contains),
        "imports" => Ok(EdgeKind::Imports),
        "calls" => Ok(EdgeKind::Calls),
        "inherits" => Ok(EdgeKind::Inherits),
        "implements" => Ok(EdgeKind::Implements),
        "uses" => Ok(EdgeKind::Uses),
        other => Err(MuError::Config(format!("unknown edge kind {other:?}")).into()),
    }
}

pub fn run(
    node_ref: &str,
    path: Option<&Path>,
    depth: Option<usize>,
    edge_kinds: Option<Vec<String>>,
    json: bool,
) -> anyhow::Result<()> {
    let root = super::repo_root(path)?;
    let store = super::open_store(&root, OpenMode::ReadOnly)?;
    let graph = store.snapshot_graph()?;

    let resolved = Resolver::new(&graph).resolve(node_ref, ResolveStrategy::PreferSource)?;
    let kinds = edge_kinds
        .map(|kinds| kinds.iter().map(|s| parse_edge_kind(s)).collect::<anyhow::Result<Vec<_>>>())
        .transpose()?;

    let engine = GraphEngine::load(&graph);
    let impacted_ids = engine.impact_depth(&resolved.node.id, kinds.as_deref(), depth)?;
    let impacted: Vec<_> = impacted_ids.iter().filter_map(|id| graph.node(id)).collect();

    if json {
        print_json(&serde_json::json!({
            "node": resolved.node.id,
            "depth": depth,
            "impacted": impacted,
        }));
        return Ok(());
    }

    if impacted.is_empty() {
        println!("(no dependents)");
        return Ok(());
    }
    for node in &impacted {
        println!("{}", node_line(node));
    }
    println!("({} impacted)", impacted.len());

    Ok(())
}
