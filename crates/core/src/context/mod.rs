//! Context Extractor (SPEC_FULL.md §4.6): given a natural-language task
//! description, return the subset of the graph most likely to answer it,
//! compressed under a token budget and rendered as OMEGA. Ties together
//! [`task_analysis`], [`retrieval`], [`budget`] and [`omega`], mirroring
//! the pipeline `original_source/src/mu/intelligence/task_context.py::TaskContextExtractor::extract`
//! runs end to end.

pub mod budget;
pub mod omega;
pub mod retrieval;
pub mod task_analysis;

use crate::config::{ContextConfig, WarningsConfig};
use crate::engine::GraphEngine;
use crate::model::{CodeGraph, EdgeKind, Node, NodeKind};
use crate::patterns::{Pattern, PatternDetector};
use crate::warnings::{GitFileInfo, Warning, WarningGenerator};
use crate::Store;

pub use omega::OmegaResult;
pub use retrieval::ScoredNode;
pub use task_analysis::TaskAnalysis;

/// A suggested place to start reading, from §4.6's task bundle extension
/// ("suggested entry points: top-ranked modules plus conventional
/// directories implied by entity type").
#[derive(Debug, Clone)]
pub struct EntryPoint {
    pub node_id: String,
    pub reason: String,
}

/// Why a file is surfaced in `TaskBundle::related_changes` (§4.6 "related
/// changes (co-changed files from git, test files, barrel re-exports)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedChangeKind {
    /// Historically committed alongside a selected file (git co-change).
    CoChanged,
    /// A test file that exercises a selected file.
    TestFile,
    /// A barrel/re-export module (e.g. `index.ts`) sitting alongside a
    /// selected file.
    Barrel,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RelatedChange {
    pub file_path: String,
    pub kind: RelatedChangeKind,
}

/// The base result of `ContextExtractor::extract`: task analysis, the
/// scored candidates considered, and the OMEGA rendering of what was
/// ultimately selected under budget.
#[derive(Debug, Clone)]
pub struct ContextResult {
    pub analysis: TaskAnalysis,
    pub candidates: Vec<ScoredNode>,
    pub omega: OmegaResult,
}

/// The task bundle extension (§4.6 "Task bundle extension"): everything in
/// `ContextResult` plus pattern suggestions, proactive warnings, suggested
/// entry points, a dependency neighbourhood, and related changes. Patterns,
/// dependencies and warnings are each capped to their own slice of
/// `max_tokens` per the 60/20/10/10 split in SPEC_FULL.md §11 / `.murc.toml`
/// `[context.budget]`; `entry_points` and `related_changes` are unbudgeted
/// metadata (ids and paths, not rendered prose).
#[derive(Debug, Clone)]
pub struct TaskBundle {
    pub context: ContextResult,
    pub patterns: Vec<Pattern>,
    pub dependencies: Vec<Node>,
    pub warnings: Vec<(String, Vec<Warning>, f64)>,
    pub entry_points: Vec<EntryPoint>,
    pub related_changes: Vec<RelatedChange>,
}

/// `total * fraction`, per-bucket token allotment for the task bundle split.
fn bucket_tokens(total: usize, fraction: f64) -> usize {
    ((total as f64) * fraction).round() as usize
}

pub struct ContextExtractor<'a> {
    graph: &'a CodeGraph,
    config: &'a ContextConfig,
}

impl<'a> ContextExtractor<'a> {
    pub fn new(graph: &'a CodeGraph, config: &'a ContextConfig) -> Self {
        Self { graph, config }
    }

    /// Run the base pipeline: analyse, retrieve, fit to budget, emit.
    pub fn extract(
        &self,
        task: &str,
        store: Option<&dyn Store>,
        query_embedding: Option<&[f32]>,
        codebase: &str,
        commit: Option<&str>,
        max_tokens: Option<u32>,
    ) -> ContextResult {
        let analysis = task_analysis::analyze(task);
        let candidates = retrieval::retrieve(self.graph, store, query_embedding, &analysis);
        let budget_tokens = max_tokens.unwrap_or(self.config.max_tokens) as usize;
        let selected = budget::fit_to_budget(self.graph, &candidates, budget_tokens);
        let omega = omega::emit(self.graph, &selected, codebase, commit);

        ContextResult { analysis, candidates, omega }
    }

    /// Run the full task bundle: base pipeline plus pattern suggestions,
    /// a dependency neighbourhood, proactive warnings on every selected
    /// file, suggested entry points, and related changes (§4.6 "Task bundle
    /// extension"). `git_info` and `co_changed` are caller-supplied facts —
    /// §1 treats git as an external collaborator the core never shells out
    /// to itself.
    pub fn extract_bundle(
        &self,
        task: &str,
        store: Option<&dyn Store>,
        query_embedding: Option<&[f32]>,
        codebase: &str,
        commit: Option<&str>,
        max_tokens: Option<u32>,
        warnings_config: &WarningsConfig,
        git_info: impl Fn(&str) -> Option<GitFileInfo>,
        co_changed: impl Fn(&str) -> Vec<String>,
    ) -> TaskBundle {
        let budget_tokens = max_tokens.unwrap_or(self.config.max_tokens) as usize;
        let b = &self.config.budget;
        let core_budget = bucket_tokens(budget_tokens, b.core_files);
        let pattern_budget = bucket_tokens(budget_tokens, b.patterns);
        let dependency_budget = bucket_tokens(budget_tokens, b.dependencies);
        let warning_budget = bucket_tokens(budget_tokens, b.warnings);

        let context = self.extract(task, store, query_embedding, codebase, commit, Some(core_budget as u32));

        let detector = PatternDetector::new(self.graph);
        let patterns = take_within_budget(detector.detect(None), pattern_budget, |p| {
            format!("{} {}", p.name, p.description)
        });

        let dependencies = self.dependency_neighbourhood(&context.candidates, dependency_budget);

        let generator = WarningGenerator::new(self.graph, warnings_config);
        let mut seen_files = std::collections::HashSet::new();
        let mut warnings = Vec::new();
        let mut warning_tokens_spent = 0usize;
        for scored in context.candidates.iter().take(20) {
            if !seen_files.insert(scored.node.file_path.clone()) {
                continue;
            }
            let info = git_info(&scored.node.file_path);
            let (node_warnings, risk) = generator.analyze(&scored.node, info.as_ref());
            if node_warnings.is_empty() {
                continue;
            }
            let cost: usize = node_warnings.iter().map(|w| budget::count_tokens(&w.message)).sum();
            if warning_tokens_spent > 0 && warning_tokens_spent + cost > warning_budget {
                continue;
            }
            warning_tokens_spent += cost;
            warnings.push((scored.node.file_path.clone(), node_warnings, risk));
        }

        let entry_points = self.entry_points(&context.analysis, &context.candidates);
        let related_changes = self.related_changes(&context.candidates, &co_changed);

        TaskBundle { context, patterns, dependencies, warnings, entry_points, related_changes }
    }

    /// Forward `imports`/`calls`/`uses` neighbours one hop out from the
    /// top-scored candidates, capped at `budget` tokens (the "dependencies"
    /// bucket of §11's 60/20/10/10 split).
    fn dependency_neighbourhood(&self, candidates: &[ScoredNode], budget: usize) -> Vec<Node> {
        if budget == 0 || candidates.is_empty() {
            return Vec::new();
        }
        let engine = GraphEngine::load(self.graph);
        let kinds = [EdgeKind::Imports, EdgeKind::Calls, EdgeKind::Uses];
        let core_ids: std::collections::HashSet<&str> = candidates.iter().map(|c| c.node.id.as_str()).collect();

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut spent = 0usize;
        'outer: for scored in candidates.iter().take(10) {
            let Ok(neighbours) = engine.dependencies(&scored.node.id, Some(&kinds), Some(1)) else {
                continue;
            };
            for id in neighbours {
                if core_ids.contains(id.as_str()) || !seen.insert(id.clone()) {
                    continue;
                }
                let Some(node) = self.graph.node(&id) else { continue };
                let cost = budget::count_tokens(&node.qualified_name) + 2;
                if spent > 0 && spent + cost > budget {
                    break 'outer;
                }
                spent += cost;
                out.push(node.clone());
            }
        }
        out
    }

    /// Co-changed files, test files and barrel re-exports for the
    /// top-scored candidates' files (§4.6 "related changes").
    fn related_changes(
        &self,
        candidates: &[ScoredNode],
        co_changed: &impl Fn(&str) -> Vec<String>,
    ) -> Vec<RelatedChange> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut files = std::collections::HashSet::new();

        for scored in candidates.iter().take(10) {
            if !files.insert(scored.node.file_path.clone()) {
                continue;
            }
            let file_path = &scored.node.file_path;

            for co in co_changed(file_path).into_iter().take(3) {
                if co != *file_path && seen.insert(co.clone()) {
                    out.push(RelatedChange { file_path: co, kind: RelatedChangeKind::CoChanged });
                }
            }

            let stem = file_path
                .rsplit('/')
                .next()
                .unwrap_or(file_path)
                .trim_end_matches(".py")
                .trim_end_matches(".rs")
                .trim_end_matches(".tsx")
                .trim_end_matches(".ts");
            for test_node in self
                .graph
                .nodes()
                .filter(|n| n.is_test_location() && n.file_path.contains(stem) && n.file_path != *file_path)
            {
                if seen.insert(test_node.file_path.clone()) {
                    out.push(RelatedChange { file_path: test_node.file_path.clone(), kind: RelatedChangeKind::TestFile });
                }
            }

            let dir = file_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
            for barrel in self.graph.nodes().filter(|n| {
                n.kind == NodeKind::Module
                    && n.file_path != *file_path
                    && n.file_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("") == dir
                    && is_barrel_file(&n.file_path)
            }) {
                if seen.insert(barrel.file_path.clone()) {
                    out.push(RelatedChange { file_path: barrel.file_path.clone(), kind: RelatedChangeKind::Barrel });
                }
            }
        }

        out
    }

    fn entry_points(&self, analysis: &TaskAnalysis, candidates: &[ScoredNode]) -> Vec<EntryPoint> {
        let mut points = Vec::new();

        for scored in candidates.iter().filter(|s| s.node.kind == NodeKind::Module).take(3) {
            points.push(EntryPoint {
                node_id: scored.node.id.clone(),
                reason: "top-ranked module for this task".to_string(),
            });
        }

        for entity_type in &analysis.entity_types {
            let dir_hint = match entity_type {
                task_analysis::EntityType::ApiEndpoint => Some("routes/ or api/"),
                task_analysis::EntityType::Hook => Some("hooks/"),
                task_analysis::EntityType::Component => Some("components/"),
                task_analysis::EntityType::Service => Some("services/"),
                task_analysis::EntityType::Repository => Some("repositories/"),
                task_analysis::EntityType::Model => Some("models/"),
                task_analysis::EntityType::Middleware => Some("middleware/"),
                task_analysis::EntityType::Config => Some("config/"),
                task_analysis::EntityType::Test => Some("tests/"),
            };
            if let Some(dir) = dir_hint {
                if let Some(node) = self.graph.nodes().find(|n| n.kind == NodeKind::Module && n.file_path.contains(dir.trim_end_matches('/'))) {
                    points.push(EntryPoint { node_id: node.id.clone(), reason: format!("conventional directory for {:?}", entity_type) });
                }
            }
        }

        points
    }
}

/// Greedily keep items (already sorted best-first) whose rendered text,
/// measured with the same tokeniser OMEGA uses, fits cumulatively within
/// `budget`. Always keeps at least the first item if `budget` is nonzero.
fn take_within_budget<T>(items: Vec<T>, budget: usize, render: impl Fn(&T) -> String) -> Vec<T> {
    if budget == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut spent = 0usize;
    for item in items {
        let cost = budget::count_tokens(&render(&item));
        if spent > 0 && spent + cost > budget {
            continue;
        }
        spent += cost;
        out.push(item);
    }
    out
}

/// A module that looks like a re-export aggregator rather than a source
/// file of its own (§4.6 "related changes ... barrel re-exports").
fn is_barrel_file(file_path: &str) -> bool {
    let name = file_path.rsplit('/').next().unwrap_or(file_path);
    matches!(name, "index.ts" | "index.tsx" | "index.js" | "mod.rs" | "__init__.py")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodeGraph, Edge, EdgeKind, Node};
    use std::path::PathBuf;

    #[test]
    fn extract_runs_end_to_end_with_no_store() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let module = Node::new(NodeKind::Module, "auth", "auth", "auth.py", 1, 50);
        let class = Node::new(NodeKind::Class, "AuthService", "AuthService", "auth.py", 2, 40);
        graph.add_node(module.clone());
        graph.add_node(class.clone());
        graph.add_edge(Edge::new(module.id.clone(), class.id.clone(), EdgeKind::Contains)).unwrap();

        let config = ContextConfig::default();
        let extractor = ContextExtractor::new(&graph, &config);
        let result = extractor.extract("modify the AuthService login flow", None, None, "demo", None, Some(2000));

        assert!(result.omega.full_output().contains("AuthService"));
        assert!(result.analysis.confidence > 0.0);
    }

    #[test]
    fn bundle_attaches_patterns_and_entry_points() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let module = Node::new(NodeKind::Module, "auth", "auth", "auth.py", 1, 50);
        let class = Node::new(NodeKind::Class, "AuthService", "AuthService", "auth.py", 2, 40);
        graph.add_node(module.clone());
        graph.add_node(class.clone());
        graph.add_edge(Edge::new(module.id.clone(), class.id.clone(), EdgeKind::Contains)).unwrap();

        let config = ContextConfig::default();
        let warnings_config = WarningsConfig::default();
        let extractor = ContextExtractor::new(&graph, &config);
        let bundle = extractor.extract_bundle(
            "create a new AuthService",
            None,
            None,
            "demo",
            None,
            Some(2000),
            &warnings_config,
            |_path| None,
            |_path| Vec::new(),
        );

        assert!(!bundle.entry_points.is_empty());
        assert!(bundle.context.omega.tokens_used > 0);
    }

    #[test]
    fn bundle_splits_budget_across_buckets() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let module = Node::new(NodeKind::Module, "auth", "auth", "auth.py", 1, 50);
        let class = Node::new(NodeKind::Class, "AuthService", "AuthService", "auth.py", 2, 40);
        let dep = Node::new(NodeKind::Module, "db", "db", "db.py", 1, 20);
        graph.add_node(module.clone());
        graph.add_node(class.clone());
        graph.add_node(dep.clone());
        graph.add_edge(Edge::new(module.id.clone(), class.id.clone(), EdgeKind::Contains)).unwrap();
        graph.add_edge(Edge::new(class.id.clone(), dep.id.clone(), EdgeKind::Imports)).unwrap();

        let config = ContextConfig::default();
        let warnings_config = WarningsConfig::default();
        let extractor = ContextExtractor::new(&graph, &config);
        let bundle = extractor.extract_bundle(
            "modify the AuthService login flow",
            None,
            None,
            "demo",
            None,
            Some(2000),
            &warnings_config,
            |_path| None,
            |path| if path == "auth.py" { vec!["auth_config.py".to_string()] } else { Vec::new() },
        );

        assert!(bundle
            .related_changes
            .iter()
            .any(|c| c.file_path == "auth_config.py" && c.kind == RelatedChangeKind::CoChanged));
    }
}
