//! CLI commands and the helpers shared across them.

pub mod bootstrap;
pub mod context;
pub mod diff;
pub mod impact;
pub mod query;
pub mod read;
pub mod search;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use mu_core::{MuConfig, MuError, OpenMode, Store};

/// Maps an `anyhow::Error` wrapping a `MuError` to the exit code in
/// SPEC_FULL.md §6/§7. Anything else (I/O errors, clap errors that slip
/// through, etc.) is a generic failure.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<MuError>().map(MuError::exit_code).unwrap_or(1)
}

/// `{"error": {"kind", "message", "details"}}` (SPEC_FULL.md §6, §7).
pub fn error_json(err: &anyhow::Error) -> serde_json::Value {
    match err.downcast_ref::<MuError>() {
        Some(mu_err) => serde_json::json!({
            "error": {
                "kind": mu_err.kind(),
                "message": mu_err.to_string(),
                "details": serde_json::Value::Null,
            }
        }),
        None => serde_json::json!({
            "error": {
                "kind": "Unknown",
                "message": err.to_string(),
                "details": serde_json::Value::Null,
            }
        }),
    }
}

/// Resolves the repository root: the explicit path if given, else the
/// current working directory.
pub fn repo_root(path: Option<&Path>) -> anyhow::Result<PathBuf> {
    let root = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().context("reading current directory")?,
    };
    root.canonicalize().with_context(|| format!("resolving {}", root.display()))
}

pub fn load_config(root: &Path) -> anyhow::Result<MuConfig> {
    Ok(MuConfig::find_and_load(root)?)
}

pub fn open_store(root: &Path, mode: OpenMode) -> anyhow::Result<Box<dyn Store>> {
    Ok(mu_core::open(root, mode)?)
}

/// Short codebase label for the OMEGA manifest: the root directory's name.
pub fn codebase_name(root: &Path) -> String {
    root.file_name().and_then(|n| n.to_str()).unwrap_or("repo").to_string()
}

/// Best-effort current commit hash, if `root` is a git repository. Never
/// errors: the commit is advisory context for OMEGA's manifest line, not
/// something a caller should have to handle (SPEC_FULL.md §1 treats git as
/// an external collaborator the core degrades gracefully without).
pub fn current_commit(root: &Path) -> Option<String> {
    let repo = git2::Repository::discover(root).ok()?;
    let head = repo.head().ok()?;
    let commit = head.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

/// Best-effort `GitFileInfo` for the `stale`/`different_owner` warnings
/// (SPEC_FULL.md §4.8): last commit that touched `relpath`, and whether its
/// author differs from the caller's configured identity. Absent a git repo,
/// an unborn HEAD, or a file with no history, returns `None` rather than
/// erroring — git is advisory context here, not something a warning-less
/// caller should have to handle.
pub fn git_file_info(root: &Path, relpath: &str) -> Option<mu_core::GitFileInfo> {
    let repo = git2::Repository::discover(root).ok()?;
    let mut walk = repo.revwalk().ok()?;
    walk.push_head().ok()?;
    walk.set_sorting(git2::Sort::TIME).ok()?;

    let path = std::path::Path::new(relpath);
    for oid in walk {
        let oid = oid.ok()?;
        let commit = repo.find_commit(oid).ok()?;
        let touches = match commit.parent_count() {
            0 => true,
            _ => commit.parents().any(|parent| {
                let diff = repo
                    .diff_tree_to_tree(parent.tree().ok().as_ref(), commit.tree().ok().as_ref(), None)
                    .ok();
                diff.is_some_and(|d| d.deltas().any(|delta| delta.new_file().path() == Some(path)))
            }),
        };
        if !touches {
            continue;
        }
        let days_since_modified = {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            let then = commit.time().seconds();
            ((now - then).max(0) / 86_400) as u64
        };
        let primary_author = commit.author().name().unwrap_or("unknown").to_string();
        let caller_identity = repo.config().ok().and_then(|cfg| cfg.get_string("user.name").ok());
        return Some(mu_core::GitFileInfo { days_since_modified, primary_author, caller_identity });
    }
    None
}

/// Best-effort co-change history for `relpath`: other files committed
/// alongside it most often, most-frequent first, over at most the last 500
/// commits reachable from HEAD. Advisory context for the context
/// extractor's "related changes" (SPEC_FULL.md §4.6) — an absent/unborn git
/// repo yields an empty list rather than an error, same degrade-gracefully
/// posture as `git_file_info`.
pub fn co_changed_files(root: &Path, relpath: &str, limit: usize) -> Vec<String> {
    (|| -> Option<Vec<String>> {
        let repo = git2::Repository::discover(root).ok()?;
        let mut walk = repo.revwalk().ok()?;
        walk.push_head().ok()?;
        walk.set_sorting(git2::Sort::TIME).ok()?;

        let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for oid in walk.take(500) {
            let commit = repo.find_commit(oid.ok()?).ok()?;
            let Some(parent) = commit.parents().next() else { continue };
            let Ok(diff) = repo.diff_tree_to_tree(parent.tree().ok().as_ref(), commit.tree().ok().as_ref(), None) else {
                continue;
            };
            let touched: Vec<String> = diff
                .deltas()
                .filter_map(|d| d.new_file().path().and_then(|p| p.to_str()).map(str::to_string))
                .collect();
            if !touched.iter().any(|p| p == relpath) {
                continue;
            }
            for path in touched {
                if path != relpath {
                    *counts.entry(path).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Some(ranked.into_iter().take(limit).map(|(path, _)| path).collect())
    })()
    .unwrap_or_default()
}
