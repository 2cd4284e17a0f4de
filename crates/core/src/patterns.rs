//! Pattern Detector (SPEC_FULL.md §4.7) — mines recurring conventions from
//! the stored graph to inform generation and validation. Net-new (no
//! teacher equivalent); categories and fields modeled on §4.7 and on the
//! `PatternCategory` enum `original_source/src/mu/intelligence/task_context.py`
//! imports from `mu.intelligence`. Deterministic and pure over a
//! `CodeGraph` snapshot — no I/O, no randomness.

use serde::{Deserialize, Serialize};

use crate::model::{CodeGraph, EdgeKind, Node, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Naming,
    ErrorHandling,
    Imports,
    Testing,
    Architecture,
    Api,
    Async,
    Logging,
    StateManagement,
    Components,
}

impl PatternCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::Naming => "naming",
            PatternCategory::ErrorHandling => "error_handling",
            PatternCategory::Imports => "imports",
            PatternCategory::Testing => "testing",
            PatternCategory::Architecture => "architecture",
            PatternCategory::Api => "api",
            PatternCategory::Async => "async",
            PatternCategory::Logging => "logging",
            PatternCategory::StateManagement => "state_management",
            PatternCategory::Components => "components",
        }
    }
}

/// A detected convention. `examples` holds at most 5 node ids (§4.7: "0-5
/// example nodes").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    pub category: PatternCategory,
    pub description: String,
    pub frequency: usize,
    pub confidence: f64,
    pub examples: Vec<String>,
    pub anti_pattern: Option<String>,
}

fn push_example(examples: &mut Vec<String>, id: &str) {
    if examples.len() < 5 {
        examples.push(id.to_string());
    }
}

/// Detects conventions over a materialised `CodeGraph`.
pub struct PatternDetector<'a> {
    graph: &'a CodeGraph,
}

impl<'a> PatternDetector<'a> {
    pub fn new(graph: &'a CodeGraph) -> Self {
        Self { graph }
    }

    /// Run detection, optionally scoped to one category.
    pub fn detect(&self, category: Option<PatternCategory>) -> Vec<Pattern> {
        let mut patterns = Vec::new();
        for cat in [
            PatternCategory::Naming,
            PatternCategory::ErrorHandling,
            PatternCategory::Imports,
            PatternCategory::Testing,
            PatternCategory::Architecture,
            PatternCategory::Api,
            PatternCategory::Async,
            PatternCategory::Logging,
            PatternCategory::StateManagement,
            PatternCategory::Components,
        ] {
            if category.is_some() && category != Some(cat) {
                continue;
            }
            patterns.extend(self.detect_category(cat));
        }
        patterns.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(b.name.cmp(&a.name).reverse()));
        patterns
    }

    fn detect_category(&self, category: PatternCategory) -> Vec<Pattern> {
        match category {
            PatternCategory::Naming => self.naming(),
            PatternCategory::ErrorHandling => self.error_handling(),
            PatternCategory::Imports => self.imports(),
            PatternCategory::Testing => self.testing(),
            PatternCategory::Architecture => self.architecture(),
            PatternCategory::Api => self.api(),
            PatternCategory::Async => self.r#async(),
            PatternCategory::Logging => self.logging(),
            PatternCategory::StateManagement => self.state_management(),
            PatternCategory::Components => self.components(),
        }
    }

    fn callables(&self) -> Vec<&Node> {
        self.graph
            .nodes()
            .filter(|n| matches!(n.kind, NodeKind::Function | NodeKind::Method))
            .collect()
    }

    fn naming(&self) -> Vec<Pattern> {
        let callables = self.callables();
        if callables.is_empty() {
            return Vec::new();
        }
        let is_snake = |s: &str| s.chars().all(|c| c.is_lowercase() || c.is_numeric() || c == '_');
        let is_camel = |s: &str| {
            s.chars().next().map(|c| c.is_lowercase()).unwrap_or(false) && s.chars().any(|c| c.is_uppercase())
        };

        let mut snake_examples = Vec::new();
        let mut camel_examples = Vec::new();
        let mut snake_count = 0usize;
        let mut camel_count = 0usize;
        for node in &callables {
            if is_snake(&node.name) {
                snake_count += 1;
                push_example(&mut snake_examples, &node.id);
            } else if is_camel(&node.name) {
                camel_count += 1;
                push_example(&mut camel_examples, &node.id);
            }
        }

        let total = callables.len();
        let (winner_name, winner_count, winner_examples, loser_count) = if snake_count >= camel_count {
            ("Functions use snake_case", snake_count, snake_examples, camel_count)
        } else {
            ("Functions use camelCase", camel_count, camel_examples, snake_count)
        };

        if winner_count == 0 {
            return Vec::new();
        }

        let confidence = winner_count as f64 / total as f64;
        let anti_pattern = if loser_count > 0 {
            Some(format!("{loser_count} function(s) break from the dominant naming convention"))
        } else {
            None
        };

        vec![Pattern {
            name: winner_name.to_string(),
            category: PatternCategory::Naming,
            description: format!("{winner_count}/{total} functions follow this naming convention"),
            frequency: winner_count,
            confidence,
            examples: winner_examples,
            anti_pattern,
        }]
    }

    fn error_handling(&self) -> Vec<Pattern> {
        let callables = self.callables();
        if callables.is_empty() {
            return Vec::new();
        }
        let mut examples = Vec::new();
        let mut count = 0usize;
        for node in &callables {
            if node.properties.return_type.as_deref().map(|t| t.contains("Result") || t.contains("Option")).unwrap_or(false) {
                count += 1;
                push_example(&mut examples, &node.id);
            }
        }
        if count == 0 {
            return Vec::new();
        }
        vec![Pattern {
            name: "Functions signal failure via Result/Option return types".to_string(),
            category: PatternCategory::ErrorHandling,
            description: format!("{count}/{} functions return Result or Option", callables.len()),
            frequency: count,
            confidence: count as f64 / callables.len() as f64,
            examples,
            anti_pattern: None,
        }]
    }

    fn imports(&self) -> Vec<Pattern> {
        let import_edges: Vec<_> = self.graph.edges().filter(|e| e.kind == EdgeKind::Imports).collect();
        if import_edges.is_empty() {
            return Vec::new();
        }
        let dynamic = import_edges.iter().filter(|e| e.properties.dynamic).count();
        let total = import_edges.len();
        let static_count = total - dynamic;

        vec![Pattern {
            name: "Imports are statically resolved".to_string(),
            category: PatternCategory::Imports,
            description: format!("{static_count}/{total} import edges resolved statically"),
            frequency: static_count,
            confidence: static_count as f64 / total as f64,
            examples: Vec::new(),
            anti_pattern: if dynamic > 0 {
                Some(format!("{dynamic} dynamic/runtime-resolved import(s) found"))
            } else {
                None
            },
        }]
    }

    fn testing(&self) -> Vec<Pattern> {
        let modules: Vec<&Node> = self.graph.nodes().filter(|n| n.kind == NodeKind::Module).collect();
        if modules.is_empty() {
            return Vec::new();
        }
        let non_test: Vec<&&Node> = modules.iter().filter(|m| !m.is_test_location()).collect();
        if non_test.is_empty() {
            return Vec::new();
        }
        let test_paths: std::collections::HashSet<&str> =
            modules.iter().filter(|m| m.is_test_location()).map(|m| m.file_path.as_str()).collect();

        let mut examples = Vec::new();
        let mut with_test = 0usize;
        for module in &non_test {
            let stem = module.file_path.rsplit('/').next().unwrap_or(&module.file_path);
            let has_test = test_paths.iter().any(|t| t.contains(stem));
            if has_test {
                with_test += 1;
                push_example(&mut examples, &module.id);
            }
        }

        vec![Pattern {
            name: "Modules have a matching test file".to_string(),
            category: PatternCategory::Testing,
            description: format!("{with_test}/{} source modules have an apparent matching test file", non_test.len()),
            frequency: with_test,
            confidence: with_test as f64 / non_test.len() as f64,
            examples,
            anti_pattern: if with_test < non_test.len() {
                Some(format!("{} module(s) have no matching test file", non_test.len() - with_test))
            } else {
                None
            },
        }]
    }

    fn architecture(&self) -> Vec<Pattern> {
        let classes: Vec<&Node> = self.graph.nodes().filter(|n| n.kind == NodeKind::Class).collect();
        if classes.is_empty() {
            return Vec::new();
        }
        let mut patterns = Vec::new();
        for (suffix, label) in [("service", "Service"), ("repository", "Repository"), ("controller", "Controller"), ("model", "Model")] {
            let mut examples = Vec::new();
            let matches: Vec<&&Node> = classes
                .iter()
                .filter(|c| {
                    let matched = c.name.to_lowercase().ends_with(suffix);
                    if matched {
                        push_example(&mut examples, &c.id);
                    }
                    matched
                })
                .collect();
            if matches.is_empty() {
                continue;
            }
            patterns.push(Pattern {
                name: format!("{label} suffix convention"),
                category: PatternCategory::Architecture,
                description: format!("{} class(es) named with the `{label}` suffix", matches.len()),
                frequency: matches.len(),
                confidence: matches.len() as f64 / classes.len() as f64,
                examples,
                anti_pattern: None,
            });
        }
        patterns
    }

    fn api(&self) -> Vec<Pattern> {
        let handlers: Vec<&Node> = self
            .graph
            .nodes()
            .filter(|n| matches!(n.kind, NodeKind::Function | NodeKind::Method) && n.properties.http_method.is_some())
            .collect();
        if handlers.is_empty() {
            return Vec::new();
        }
        let mut examples = Vec::new();
        for h in handlers.iter().take(5) {
            examples.push(h.id.clone());
        }
        vec![Pattern {
            name: "HTTP handlers are decorator-annotated functions".to_string(),
            category: PatternCategory::Api,
            description: format!("{} handler(s) carry an HTTP method/path", handlers.len()),
            frequency: handlers.len(),
            confidence: 1.0,
            examples,
            anti_pattern: None,
        }]
    }

    fn r#async(&self) -> Vec<Pattern> {
        let callables = self.callables();
        if callables.is_empty() {
            return Vec::new();
        }
        let mut examples = Vec::new();
        let async_count = callables.iter().filter(|n| {
            let is_async = n.properties.is_async;
            if is_async {
                push_example(&mut examples, &n.id);
            }
            is_async
        }).count();
        if async_count == 0 {
            return Vec::new();
        }
        vec![Pattern {
            name: "Async/await is used for I/O-bound functions".to_string(),
            category: PatternCategory::Async,
            description: format!("{async_count}/{} callables are async", callables.len()),
            frequency: async_count,
            confidence: async_count as f64 / callables.len() as f64,
            examples,
            anti_pattern: None,
        }]
    }

    fn logging(&self) -> Vec<Pattern> {
        let callables = self.callables();
        let mut examples = Vec::new();
        let count = callables
            .iter()
            .filter(|n| {
                let hit = n.properties.decorators.iter().any(|d| {
                    let l = d.to_lowercase();
                    l.contains("log") || l.contains("trace")
                });
                if hit {
                    push_example(&mut examples, &n.id);
                }
                hit
            })
            .count();
        if count == 0 {
            return Vec::new();
        }
        vec![Pattern {
            name: "Logging/tracing decorators present".to_string(),
            category: PatternCategory::Logging,
            description: format!("{count} callable(s) carry a logging/tracing decorator"),
            frequency: count,
            confidence: count as f64 / callables.len().max(1) as f64,
            examples,
            anti_pattern: None,
        }]
    }

    fn state_management(&self) -> Vec<Pattern> {
        let hooks: Vec<&Node> = self
            .graph
            .nodes()
            .filter(|n| matches!(n.kind, NodeKind::Function | NodeKind::Method) && n.name.starts_with("use") && n.name.chars().nth(3).map(|c| c.is_uppercase()).unwrap_or(false))
            .collect();
        if hooks.is_empty() {
            return Vec::new();
        }
        let examples = hooks.iter().take(5).map(|n| n.id.clone()).collect();
        vec![Pattern {
            name: "State exposed via `use*` hooks".to_string(),
            category: PatternCategory::StateManagement,
            description: format!("{} hook-style function(s) found", hooks.len()),
            frequency: hooks.len(),
            confidence: 1.0,
            examples,
            anti_pattern: None,
        }]
    }

    fn components(&self) -> Vec<Pattern> {
        let components: Vec<&Node> = self
            .graph
            .nodes()
            .filter(|n| n.kind == NodeKind::Class && ["component", "view", "page"].iter().any(|kw| n.name.to_lowercase().contains(kw)))
            .collect();
        if components.is_empty() {
            return Vec::new();
        }
        let examples = components.iter().take(5).map(|n| n.id.clone()).collect();
        vec![Pattern {
            name: "UI components follow a Component/View/Page naming convention".to_string(),
            category: PatternCategory::Components,
            description: format!("{} component-like class(es) found", components.len()),
            frequency: components.len(),
            confidence: 1.0,
            examples,
            anti_pattern: None,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodeGraph, Properties};
    use std::path::PathBuf;

    #[test]
    fn detects_dominant_snake_case_naming() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        graph.add_node(Node::new(NodeKind::Function, "hash_password", "hash_password", "auth.py", 1, 5));
        graph.add_node(Node::new(NodeKind::Function, "verify_token", "verify_token", "auth.py", 6, 10));
        graph.add_node(Node::new(NodeKind::Function, "hashPassword", "hashPassword", "legacy.py", 1, 5));

        let detector = PatternDetector::new(&graph);
        let patterns = detector.detect(Some(PatternCategory::Naming));
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].name, "Functions use snake_case");
        assert_eq!(patterns[0].frequency, 2);
        assert!(patterns[0].anti_pattern.is_some());
    }

    #[test]
    fn detects_service_suffix_architecture_pattern() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        graph.add_node(Node::new(NodeKind::Class, "AuthService", "AuthService", "auth.py", 1, 40));
        graph.add_node(Node::new(NodeKind::Class, "UserRepository", "UserRepository", "user.py", 1, 40));

        let detector = PatternDetector::new(&graph);
        let patterns = detector.detect(Some(PatternCategory::Architecture));
        assert!(patterns.iter().any(|p| p.name.contains("Service")));
        assert!(patterns.iter().any(|p| p.name.contains("Repository")));
    }

    #[test]
    fn detects_async_usage() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let mut f = Node::new(NodeKind::Function, "fetch_user", "fetch_user", "api.py", 1, 5);
        f.properties = Properties { is_async: true, ..Default::default() };
        graph.add_node(f);
        graph.add_node(Node::new(NodeKind::Function, "sync_fn", "sync_fn", "api.py", 6, 10));

        let detector = PatternDetector::new(&graph);
        let patterns = detector.detect(Some(PatternCategory::Async));
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].frequency, 1);
    }

    #[test]
    fn empty_graph_yields_no_patterns() {
        let graph = CodeGraph::new(PathBuf::from("/repo"));
        let detector = PatternDetector::new(&graph);
        assert!(detector.detect(None).is_empty());
    }
}
