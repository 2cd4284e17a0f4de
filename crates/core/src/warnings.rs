//! Proactive Warning Generator (SPEC_FULL.md §4.8) — analyses a target node
//! or file and produces advisory warnings before modification. Grounded on
//! the teacher's `diff/impact.rs` (`ChangeClassification`/`ImpactAnalysis`,
//! generalised from a diff-time-only check into an always-available
//! advisory pass) and on `snapshot::git` for the git-derived `stale` and
//! `different_owner` signals.

use serde::{Deserialize, Serialize};

use crate::config::WarningsConfig;
use crate::model::{CodeGraph, EdgeKind, Node, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    HighImpact,
    Stale,
    Security,
    NoTests,
    Complexity,
    Deprecated,
    DifferentOwner,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::HighImpact => "high_impact",
            WarningKind::Stale => "stale",
            WarningKind::Security => "security",
            WarningKind::NoTests => "no_tests",
            WarningKind::Complexity => "complexity",
            WarningKind::Deprecated => "deprecated",
            WarningKind::DifferentOwner => "different_owner",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub level: WarningLevel,
    pub message: String,
    pub node_id: String,
}

/// Git-derived facts about a file, supplied by the caller (§1: git
/// integration is an external collaborator, the core never shells out to
/// it itself). Absent, the `stale`/`different_owner` signals are skipped.
#[derive(Debug, Clone)]
pub struct GitFileInfo {
    pub days_since_modified: u64,
    pub primary_author: String,
    pub caller_identity: Option<String>,
}

const SECURITY_KEYWORDS: &[&str] = &[
    "auth", "password", "secret", "token", "crypto", "cipher", "credential", "session", "permission", "acl",
];

const SECURITY_IMPORTS: &[&str] = &["jwt", "bcrypt", "crypto", "ssl", "oauth"];

const DEPRECATION_MARKERS: &[&str] = &["deprecated", "DEPRECATED"];

pub struct WarningGenerator<'a> {
    graph: &'a CodeGraph,
    config: &'a WarningsConfig,
}

impl<'a> WarningGenerator<'a> {
    pub fn new(graph: &'a CodeGraph, config: &'a WarningsConfig) -> Self {
        Self { graph, config }
    }

    /// Generate every applicable warning for `node`, plus a composite
    /// `risk_score` in `[0, 1]` (weighted sum of triggered warnings).
    pub fn analyze(&self, node: &Node, git_info: Option<&GitFileInfo>) -> (Vec<Warning>, f64) {
        let mut warnings = Vec::new();

        if let Some(w) = self.high_impact(node) {
            warnings.push(w);
        }
        if let Some(w) = self.security(node) {
            warnings.push(w);
        }
        if let Some(w) = self.complexity(node) {
            warnings.push(w);
        }
        if let Some(info) = git_info {
            if let Some(w) = self.stale(node, info) {
                warnings.push(w);
            }
            if let Some(w) = self.different_owner(node, info) {
                warnings.push(w);
            }
        }
        if let Some(w) = self.no_tests(node) {
            warnings.push(w);
        }
        if let Some(w) = self.deprecated(node) {
            warnings.push(w);
        }

        warnings.sort_by(|a, b| self.weight_of(b.kind).partial_cmp(&self.weight_of(a.kind)).unwrap());
        let risk_score = self.risk_score(&warnings);
        (warnings, risk_score)
    }

    fn weight_of(&self, kind: WarningKind) -> f64 {
        let w = &self.config.weights;
        match kind {
            WarningKind::Security => w.security,
            WarningKind::HighImpact => w.high_impact,
            WarningKind::Complexity => w.complexity,
            WarningKind::Stale => w.stale,
            WarningKind::NoTests => w.no_tests,
            WarningKind::Deprecated => w.deprecated,
            WarningKind::DifferentOwner => w.different_owner,
        }
    }

    fn risk_score(&self, warnings: &[Warning]) -> f64 {
        warnings.iter().map(|w| self.weight_of(w.kind)).sum::<f64>().clamp(0.0, 1.0)
    }

    fn dependent_count(&self, node: &Node) -> usize {
        self.graph
            .edges_to(&node.id)
            .into_iter()
            .filter(|(_, edge)| matches!(edge.kind, EdgeKind::Calls | EdgeKind::Imports | EdgeKind::Inherits))
            .count()
    }

    fn high_impact(&self, node: &Node) -> Option<Warning> {
        let count = self.dependent_count(node);
        if count < self.config.high_impact_threshold {
            return None;
        }
        let level = if count >= self.config.high_impact_threshold * 3 { WarningLevel::Error } else { WarningLevel::Warn };
        Some(Warning {
            kind: WarningKind::HighImpact,
            level,
            message: format!("{count} dependent(s) reference this; changes ripple widely"),
            node_id: node.id.clone(),
        })
    }

    fn security(&self, node: &Node) -> Option<Warning> {
        let name_lower = node.name.to_lowercase();
        let path_lower = node.file_path.to_lowercase();
        let name_hit = SECURITY_KEYWORDS.iter().any(|kw| name_lower.contains(kw) || path_lower.contains(kw));

        let import_hit = self.graph.edges_from(&node.id).into_iter().any(|(target, edge)| {
            edge.kind == EdgeKind::Imports
                && SECURITY_IMPORTS.iter().any(|lib| target.to_lowercase().contains(lib))
        });

        if !name_hit && !import_hit {
            return None;
        }
        Some(Warning {
            kind: WarningKind::Security,
            level: WarningLevel::Warn,
            message: "name, path or imports touch security-sensitive territory".to_string(),
            node_id: node.id.clone(),
        })
    }

    fn complexity(&self, node: &Node) -> Option<Warning> {
        if node.complexity <= self.config.complexity_threshold {
            return None;
        }
        Some(Warning {
            kind: WarningKind::Complexity,
            level: if node.complexity > self.config.complexity_threshold * 2 { WarningLevel::Error } else { WarningLevel::Warn },
            message: format!("cyclomatic complexity {} exceeds the configured threshold of {}", node.complexity, self.config.complexity_threshold),
            node_id: node.id.clone(),
        })
    }

    fn stale(&self, node: &Node, info: &GitFileInfo) -> Option<Warning> {
        if info.days_since_modified < self.config.stale_warn_days {
            return None;
        }
        let level = if info.days_since_modified >= self.config.stale_error_days { WarningLevel::Error } else { WarningLevel::Warn };
        Some(Warning {
            kind: WarningKind::Stale,
            level,
            message: format!("last modified {} days ago", info.days_since_modified),
            node_id: node.id.clone(),
        })
    }

    fn different_owner(&self, node: &Node, info: &GitFileInfo) -> Option<Warning> {
        let caller = info.caller_identity.as_ref()?;
        if caller == &info.primary_author {
            return None;
        }
        Some(Warning {
            kind: WarningKind::DifferentOwner,
            level: WarningLevel::Info,
            message: format!("primary author is {}, not you", info.primary_author),
            node_id: node.id.clone(),
        })
    }

    fn no_tests(&self, node: &Node) -> Option<Warning> {
        if !matches!(node.kind, NodeKind::Class | NodeKind::Function | NodeKind::Module) || node.is_test_location() {
            return None;
        }
        let stem = node.file_path.rsplit('/').next().unwrap_or(&node.file_path);
        let has_test = self.graph.nodes().any(|n| n.is_test_location() && n.file_path.contains(stem.trim_end_matches(".py").trim_end_matches(".rs").trim_end_matches(".ts")));
        if has_test {
            return None;
        }
        Some(Warning {
            kind: WarningKind::NoTests,
            level: WarningLevel::Warn,
            message: "no matching test file found under any recognised convention".to_string(),
            node_id: node.id.clone(),
        })
    }

    fn deprecated(&self, node: &Node) -> Option<Warning> {
        let hit = node.properties.decorators.iter().any(|d| DEPRECATION_MARKERS.iter().any(|m| d.contains(m)))
            || node.properties.attributes.iter().any(|a| DEPRECATION_MARKERS.iter().any(|m| a.contains(m)));
        if !hit {
            return None;
        }
        Some(Warning {
            kind: WarningKind::Deprecated,
            level: WarningLevel::Warn,
            message: "carries a deprecation marker".to_string(),
            node_id: node.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodeGraph, Edge, Node, NodeKind, Properties};
    use std::path::PathBuf;

    fn config() -> WarningsConfig {
        WarningsConfig { high_impact_threshold: 2, complexity_threshold: 10, stale_warn_days: 100, stale_error_days: 300, ..Default::default() }
    }

    #[test]
    fn flags_high_impact_above_threshold() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let target = Node::new(NodeKind::Function, "core_fn", "core_fn", "core.py", 1, 10);
        graph.add_node(target.clone());
        for i in 0..3 {
            let caller = Node::new(NodeKind::Function, format!("caller{i}"), format!("caller{i}"), "callers.py", 1, 5);
            graph.add_node(caller.clone());
            graph.add_edge(Edge::new(caller.id, target.id.clone(), EdgeKind::Calls)).unwrap();
        }

        let cfg = config();
        let gen = WarningGenerator::new(&graph, &cfg);
        let (warnings, risk) = gen.analyze(&target, None);
        assert!(warnings.iter().any(|w| w.kind == WarningKind::HighImpact));
        assert!(risk > 0.0);
    }

    #[test]
    fn flags_security_sensitive_name() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let node = Node::new(NodeKind::Class, "AuthService", "AuthService", "auth.py", 1, 10);
        graph.add_node(node.clone());

        let cfg = config();
        let gen = WarningGenerator::new(&graph, &cfg);
        let (warnings, _) = gen.analyze(&node, None);
        assert!(warnings.iter().any(|w| w.kind == WarningKind::Security));
    }

    #[test]
    fn flags_deprecated_marker() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let mut node = Node::new(NodeKind::Function, "old_fn", "old_fn", "legacy.py", 1, 10);
        node.properties = Properties { decorators: vec!["deprecated".to_string()], ..Default::default() };
        graph.add_node(node.clone());

        let cfg = config();
        let gen = WarningGenerator::new(&graph, &cfg);
        let (warnings, _) = gen.analyze(&node, None);
        assert!(warnings.iter().any(|w| w.kind == WarningKind::Deprecated));
    }

    #[test]
    fn stale_and_different_owner_need_git_info() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let node = Node::new(NodeKind::Function, "f", "f", "f.py", 1, 10);
        graph.add_node(node.clone());

        let cfg = config();
        let gen = WarningGenerator::new(&graph, &cfg);
        let (warnings_no_git, _) = gen.analyze(&node, None);
        assert!(!warnings_no_git.iter().any(|w| w.kind == WarningKind::Stale));

        let info = GitFileInfo { days_since_modified: 400, primary_author: "alice".to_string(), caller_identity: Some("bob".to_string()) };
        let (warnings_git, _) = gen.analyze(&node, Some(&info));
        assert!(warnings_git.iter().any(|w| w.kind == WarningKind::Stale && w.level == WarningLevel::Error));
        assert!(warnings_git.iter().any(|w| w.kind == WarningKind::DifferentOwner));
    }

    #[test]
    fn clean_node_has_no_warnings_and_zero_risk() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let test_node = Node::new(NodeKind::Function, "test_f", "test_f", "tests/f_test.py", 1, 10);
        graph.add_node(test_node);
        let node = Node::new(NodeKind::Function, "f", "f", "f.py", 1, 10);
        graph.add_node(node.clone());

        let cfg = config();
        let gen = WarningGenerator::new(&graph, &cfg);
        let (warnings, risk) = gen.analyze(&node, None);
        assert!(warnings.is_empty());
        assert_eq!(risk, 0.0);
    }
}
