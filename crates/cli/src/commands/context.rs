//! `mu context QUESTION [--max-tokens N] [--bundle] [--json]` (SPEC_FULL.md §6, §4.6).

use std::path::Path;

use colored::Colorize;
use mu_core::{ContextExtractor, OpenMode};

use crate::output::print_json;

pub fn run(question: &str, path: Option<&Path>, max_tokens: Option<u32>, bundle: bool, json: bool) -> anyhow::Result<()> {
    let root = super::repo_root(path)?;
    let config = super::load_config(&root)?;
    let store = super::open_store(&root, OpenMode::ReadOnly)?;
    let graph = store.snapshot_graph()?;

    let codebase = super::codebase_name(&root);
    let commit = super::current_commit(&root);
    let extractor = ContextExtractor::new(&graph, &config.context);

    if bundle {
        let git_info = |relpath: &str| super::git_file_info(&root, relpath);
        let co_changed = |relpath: &str| super::co_changed_files(&root, relpath, 3);
        let result = extractor.extract_bundle(
            question,
            Some(store.as_ref()),
            None,
            &codebase,
            commit.as_deref(),
            max_tokens,
            &config.warnings,
            git_info,
            co_changed,
        );

        if json {
            print_json(&serde_json::json!({
                "analysis": {
                    "task_type": result.context.analysis.task_type.as_str(),
                    "entity_types": result.context.analysis.entity_types.iter().map(|e| e.as_str()).collect::<Vec<_>>(),
                    "domain_hints": result.context.analysis.domain_hints,
                    "confidence": result.context.analysis.confidence,
                },
                "omega": result.context.omega.full_output(),
                "tokens_used": result.context.omega.tokens_used,
                "compression_ratio": result.context.omega.compression_ratio(),
                "patterns": result.patterns,
                "dependencies": result.dependencies.iter().map(|n| &n.qualified_name).collect::<Vec<_>>(),
                "warnings": result.warnings,
                "entry_points": result.entry_points.iter().map(|e| &e.node_id).collect::<Vec<_>>(),
                "related_changes": result.related_changes,
            }));
            return Ok(());
        }

        println!("{}", result.context.omega.full_output());
        println!();
        println!("{} confidence {:.2}, {} tokens ({:.0}% smaller than a naive dump)",
            "analysis:".dimmed(), result.context.analysis.confidence, result.context.omega.tokens_used, result.context.omega.savings_percent());
        if !result.patterns.is_empty() {
            println!();
            println!("{}", "patterns:".bold());
            for p in &result.patterns {
                println!("  {} ({:.0}% confidence, seen {}x)", p.name, p.confidence * 100.0, p.frequency);
            }
        }
        if !result.warnings.is_empty() {
            println!();
            println!("{}", "warnings:".bold());
            for (file, warnings, risk) in &result.warnings {
                println!("  {file} (risk {risk:.2})");
                for w in warnings {
                    println!("    {} {}", crate::output::colored_warning_icon(w.level), w.message);
                }
            }
        }
        if !result.dependencies.is_empty() {
            println!();
            println!("{}", "dependencies:".bold());
            for d in &result.dependencies {
                println!("  {}", d.qualified_name);
            }
        }
        if !result.entry_points.is_empty() {
            println!();
            println!("{}", "entry points:".bold());
            for e in &result.entry_points {
                println!("  {} — {}", e.node_id, e.reason);
            }
        }
        if !result.related_changes.is_empty() {
            println!();
            println!("{}", "related changes:".bold());
            for c in &result.related_changes {
                println!("  {} ({:?})", c.file_path, c.kind);
            }
        }
        return Ok(());
    }

    let result = extractor.extract(question, Some(store.as_ref()), None, &codebase, commit.as_deref(), max_tokens);

    if json {
        print_json(&serde_json::json!({
            "confidence": result.analysis.confidence,
            "omega": result.omega.full_output(),
            "tokens_used": result.omega.tokens_used,
            "tokens_saved": result.omega.tokens_saved(),
            "compression_ratio": result.omega.compression_ratio(),
        }));
        return Ok(());
    }

    println!("{}", result.omega.full_output());

    Ok(())
}
