//! `mu bootstrap [PATH] [--force] [--embed]` (SPEC_FULL.md §6).

use std::path::Path;

use colored::Colorize;
use mu_core::{MuConfig, OpenMode};

use crate::progress::Step;

pub fn run(path: Option<&Path>, force: bool, embed: bool) -> anyhow::Result<()> {
    let root = super::repo_root(path)?;
    let config_path = root.join(".murc.toml");

    let config = if config_path.exists() && !force {
        MuConfig::from_file(&config_path)?
    } else {
        let step = Step::new("writing .murc.toml");
        let config = MuConfig::default();
        config.save(&config_path)?;
        step.finish(&config_path.display().to_string());
        config
    };

    let step = Step::new("scanning and parsing");
    let mut store = super::open_store(&root, OpenMode::ReadWrite)?;
    let parse_errors = mu_core::ingest(&mut *store, &root, &config)?;
    let stats = store.stats()?;
    step.finish(&format!("{} nodes, {} parse errors", stats.total_nodes, parse_errors.len()));

    for err in &parse_errors {
        eprintln!("  {} {}: {}", "warn".yellow(), err.path.display(), err.message);
    }

    if embed {
        let step = Step::new("building embeddings");
        match &config.embeddings.provider {
            Some(provider) => step.skip(&format!(
                "provider {provider} is an external collaborator (SPEC_FULL.md §1) — no batch-embed client wired up, skipped"
            )),
            None => step.skip("no embeddings.provider configured in .murc.toml — skipped"),
        }
    }

    println!(
        "{} {} nodes, {} edges across {} modules",
        "bootstrap complete:".green().bold(),
        stats.total_nodes,
        stats.edge_counts.values().sum::<usize>(),
        stats.node_counts.get("module").copied().unwrap_or(0),
    );
    if !parse_errors.is_empty() {
        println!("{} {} files failed to parse (see warnings above)", "note:".dimmed(), parse_errors.len());
    }

    Ok(())
}
