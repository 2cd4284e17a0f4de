//! `mu read NODE_REF [--context N] [--json]` (SPEC_FULL.md §6).

use std::path::Path;

use colored::Colorize;
use mu_core::{OpenMode, ResolveStrategy, Resolver};

use crate::output::{node_line, print_json};

pub fn run(node_ref: &str, path: Option<&Path>, context: u32, json: bool) -> anyhow::Result<()> {
    let root = super::repo_root(path)?;
    let store = super::open_store(&root, OpenMode::ReadOnly)?;
    let graph = store.snapshot_graph()?;

    let resolved = Resolver::new(&graph).resolve(node_ref, ResolveStrategy::PreferSource)?;
    let node = &resolved.node;

    let abs_path = root.join(&node.file_path);
    let source = std::fs::read_to_string(&abs_path)
        .map_err(|e| mu_core::MuError::NotFound(format!("{}: {e}", abs_path.display())))?;
    let lines: Vec<&str> = source.lines().collect();
    let start = node.line_start.saturating_sub(1 + context) as usize;
    let end = ((node.line_end + context) as usize).min(lines.len());
    let excerpt = lines
        .get(start..end)
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>5}  {}", start + i + 1, line))
        .collect::<Vec<_>>()
        .join("\n");

    if json {
        print_json(&serde_json::json!({
            "node": node,
            "was_ambiguous": resolved.was_ambiguous,
            "resolution_method": resolved.resolution_method,
            "alternatives": resolved.alternatives.iter().map(|n| &n.id).collect::<Vec<_>>(),
            "excerpt": excerpt,
        }));
        return Ok(());
    }

    println!("{}", node_line(node));
    if resolved.was_ambiguous {
        println!(
            "{} resolved via {} out of {} candidates",
            "note:".yellow(),
            resolved.resolution_method,
            resolved.alternatives.len() + 1
        );
    }
    println!();
    println!("{excerpt}");

    Ok(())
}
