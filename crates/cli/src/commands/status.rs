//! `mu status [--json]` (SPEC_FULL.md §6).

use std::path::Path;

use colored::Colorize;
use mu_core::OpenMode;

use crate::output::print_json;

pub fn run(path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let root = super::repo_root(path)?;
    let config_path = root.join(".murc.toml");
    let config_exists = config_path.exists();
    let config = super::load_config(&root)?;

    let store = super::open_store(&root, OpenMode::ReadOnly)?;
    let stats = store.stats()?;
    let has_graph = stats.total_nodes > 0;

    let next_action = if !config_exists {
        "run `mu bootstrap` to create .murc.toml and build the graph"
    } else if !has_graph {
        "run `mu bootstrap` to build the graph"
    } else {
        "graph is up to date — try `mu context \"...\"` or `mu query \"SELECT ...\"`"
    };

    if json {
        print_json(&serde_json::json!({
            "config": { "path": config_path, "exists": config_exists },
            "store": stats,
            "embeddings": {
                "provider": config.embeddings.provider,
                "dimension": stats.embedding_dimension,
                "nodes_with_embeddings": stats.nodes_with_embeddings,
            },
            "next_action": next_action,
        }));
        return Ok(());
    }

    println!("{}", "mu status".bold());
    println!("  config       {}", if config_exists { config_path.display().to_string() } else { "(using defaults)".to_string() });
    println!("  root         {}", stats.root_path.display());
    println!("  epoch        {}", stats.epoch);
    println!("  nodes        {}", stats.total_nodes);
    for (kind, count) in &stats.node_counts {
        println!("    {:<10} {}", kind, count);
    }
    println!("  edges        {}", stats.edge_counts.values().sum::<usize>());
    for (kind, count) in &stats.edge_counts {
        println!("    {:<10} {}", kind, count);
    }
    match config.embeddings.provider {
        Some(ref provider) => println!(
            "  embeddings   {} ({}/{} nodes, dim {:?})",
            provider, stats.nodes_with_embeddings, stats.total_nodes, stats.embedding_dimension
        ),
        None => println!("  embeddings   none configured"),
    }
    println!();
    println!("{} {}", "next:".cyan().bold(), next_action);

    Ok(())
}
