//! `mu diff BASE_REF TARGET_REF [--format terminal|json|markdown]` (SPEC_FULL.md §6, §4.9).

use std::path::Path;

use mu_core::model::CodeGraph;
use mu_core::snapshot::diff::diff_graphs;
use mu_core::snapshot::git::graph_at_ref;
use mu_core::MuError;

use crate::output::print_json;
use crate::DiffFormat;

fn graph_at(repo: &git2::Repository, root: &Path, config: &mu_core::MuConfig, ref_spec: &str) -> anyhow::Result<CodeGraph> {
    let (nodes, edges) = graph_at_ref(repo, root, ref_spec, config)?;
    let mut graph = CodeGraph::new(root.to_path_buf());
    for node in nodes {
        graph.add_node(node);
    }
    for edge in edges {
        graph.add_edge(edge)?;
    }
    Ok(graph)
}

pub fn run(base_ref: &str, target_ref: &str, path: Option<&Path>, format: DiffFormat) -> anyhow::Result<()> {
    let root = super::repo_root(path)?;
    let config = super::load_config(&root)?;

    let repo = git2::Repository::discover(&root).map_err(|e| MuError::External {
        provider: "git".to_string(),
        message: e.to_string(),
    })?;

    let base = graph_at(&repo, &root, &config, base_ref)?;
    let target = graph_at(&repo, &root, &config, target_ref)?;

    let semantic_diff = diff_graphs(base_ref, target_ref, &base, &target);

    match format {
        DiffFormat::Json => print_json(&serde_json::to_value(&semantic_diff)?),
        DiffFormat::Markdown => println!("{}", semantic_diff.to_markdown()),
        DiffFormat::Terminal => print!("{}", semantic_diff.to_terminal()),
    }

    Ok(())
}
