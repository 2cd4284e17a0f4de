//! `mu search QUERY [--limit N] [--json]` (SPEC_FULL.md §6): semantic
//! search via the embedding index when one exists, falling back silently to
//! keyword matching otherwise (SPEC_FULL.md §4.6).

use std::path::Path;

use colored::Colorize;
use mu_core::OpenMode;

use crate::output::{node_line, print_json};

pub fn run(query: &str, path: Option<&Path>, limit: usize, json: bool) -> anyhow::Result<()> {
    let root = super::repo_root(path)?;
    let store = super::open_store(&root, OpenMode::ReadOnly)?;

    // A query embedding requires an embedding provider (external
    // collaborator, SPEC_FULL.md §1); without one configured here, fall
    // back to the store's name index. `%query%` matches anywhere in the
    // name.
    let pattern = format!("%{query}%");
    let results = store.find_by_name(&pattern, limit)?;

    if json {
        print_json(&serde_json::json!({
            "query": query,
            "method": "keyword",
            "results": results,
        }));
        return Ok(());
    }

    if results.is_empty() {
        println!("{}", "no matches".dimmed());
        return Ok(());
    }

    for node in &results {
        println!("{}", node_line(node));
    }

    Ok(())
}
