//! Reads file contents directly from git blobs so a historical commit can be
//! parsed into `(nodes, edges)` without a checkout (SPEC_FULL.md §4.9
//! `build_with_history`). Adapted from the teacher's blob-reading approach
//! (`diff/blob.rs`'s `GitTreeReader`), generalised to the new ingest
//! pipeline's `ParserDispatcher`/`ModuleDef` types.

use std::path::{Path, PathBuf};

use git2::{ObjectType, Oid, Repository};

use crate::config::MuConfig;
use crate::error::{MuError, Result};
use crate::ingest::{assemble, reduce, ModuleDef, ParserDispatcher, ReductionRules};
use crate::model::{Edge, Node};

/// One commit in a `build_with_history` replay.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub date: String,
}

/// Lists commits reachable from `ref_spec`, oldest first, for use with
/// `build_with_history`.
pub fn commits_on(repo: &Repository, ref_spec: &str) -> Result<Vec<CommitInfo>> {
    let mut walk = repo
        .revwalk()
        .map_err(|e| MuError::External { provider: "git".to_string(), message: e.to_string() })?;
    let obj = repo
        .revparse_single(ref_spec)
        .map_err(|e| MuError::External { provider: "git".to_string(), message: e.to_string() })?;
    walk.push(obj.id())
        .map_err(|e| MuError::External { provider: "git".to_string(), message: e.to_string() })?;
    walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)
        .map_err(|e| MuError::External { provider: "git".to_string(), message: e.to_string() })?;

    let mut commits = Vec::new();
    for oid in walk {
        let oid = oid.map_err(|e| MuError::External { provider: "git".to_string(), message: e.to_string() })?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| MuError::External { provider: "git".to_string(), message: e.to_string() })?;
        commits.push(CommitInfo {
            hash: commit.id().to_string(),
            message: commit.summary().unwrap_or_default().to_string(),
            author: commit.author().name().unwrap_or_default().to_string(),
            date: commit.time().seconds().to_string(),
        });
    }
    Ok(commits)
}

struct GitFile {
    path: PathBuf,
    content: String,
}

fn read_files_at_ref(repo: &Repository, ref_spec: &str, extensions: &[String]) -> Result<Vec<GitFile>> {
    let obj = repo
        .revparse_single(ref_spec)
        .map_err(|e| MuError::External { provider: "git".to_string(), message: format!("resolving {ref_spec}: {e}") })?;
    let commit = obj
        .peel_to_commit()
        .map_err(|e| MuError::External { provider: "git".to_string(), message: e.to_string() })?;
    let tree = commit
        .tree()
        .map_err(|e| MuError::External { provider: "git".to_string(), message: e.to_string() })?;

    let mut entries: Vec<(PathBuf, Oid)> = Vec::new();
    tree.walk(git2::TreeWalkMode::PreOrder, |dir, entry| {
        if entry.kind() != Some(ObjectType::Blob) {
            return git2::TreeWalkResult::Ok;
        }
        let Some(name) = entry.name() else {
            return git2::TreeWalkResult::Ok;
        };
        let rel_path = if dir.is_empty() { PathBuf::from(name) } else { PathBuf::from(dir).join(name) };
        let has_ext = rel_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|want| want.trim_start_matches('.') == e))
            .unwrap_or(false);
        if has_ext {
            entries.push((rel_path, entry.id()));
        }
        git2::TreeWalkResult::Ok
    })
    .map_err(|e| MuError::External { provider: "git".to_string(), message: e.to_string() })?;

    let mut files = Vec::with_capacity(entries.len());
    for (rel_path, oid) in entries {
        if let Ok(blob) = repo.find_blob(oid) {
            if blob.is_binary() {
                continue;
            }
            if let Ok(content) = std::str::from_utf8(blob.content()) {
                files.push(GitFile { path: rel_path, content: content.to_string() });
            }
        }
    }
    Ok(files)
}

/// Parses every recognised file at `ref_spec` straight from git blobs and
/// runs it through reduce+assemble, producing the same `(nodes, edges)`
/// shape `ingest::build` expects — without writing anything to disk or
/// touching the working tree.
pub fn graph_at_ref(
    repo: &Repository,
    root: &Path,
    ref_spec: &str,
    config: &MuConfig,
) -> Result<(Vec<Node>, Vec<Edge>)> {
    let dispatcher = ParserDispatcher::new();
    // The three bundled parsers' registered extensions.
    let candidate_exts = [".py", ".rs", ".ts", ".tsx"].map(String::from);

    let files = read_files_at_ref(repo, ref_spec, &candidate_exts)?;

    let mut modules: Vec<ModuleDef> = Vec::new();
    for file in &files {
        let abs_path = root.join(&file.path);
        if let Some(parser) = dispatcher.find(&abs_path) {
            if let Ok(mut module) = parser.parse(&abs_path, &file.content) {
                module.path = file.path.to_string_lossy().replace('\\', "/");
                module.language = parser.language_name().to_string();
                module.line_count = file.content.lines().count() as u32;
                modules.push(module);
            }
        }
    }

    let rules = ReductionRules::from_config(config);
    let reduced = reduce(modules, &rules);
    Ok(assemble(&reduced))
}
