//! Name resolution — turning a user-supplied reference into a concrete node
//! (SPEC_FULL.md §4.4). No teacher equivalent; grounded on the strategy
//! names and scoring rules the spec gives directly.

use crate::error::{MuError, Result};
use crate::model::{CodeGraph, Node};

/// How ambiguity is broken when more than one candidate matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    /// Delegate the final pick to a caller-supplied callback.
    Interactive,
    /// Default: highest-scored non-test candidate, or highest overall if
    /// every candidate is a test.
    PreferSource,
    FirstMatch,
    /// Fail on any ambiguity, even a single test/non-test pair.
    Strict,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub node: Node,
    pub score: f64,
    pub method: &'static str,
}

#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub node: Node,
    pub alternatives: Vec<Node>,
    pub resolution_method: &'static str,
    pub was_ambiguous: bool,
}

pub struct Resolver<'a> {
    graph: &'a CodeGraph,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a CodeGraph) -> Self {
        Self { graph }
    }

    /// Collect every candidate across the four match tiers, scored.
    fn candidates(&self, reference: &str) -> Vec<Candidate> {
        // Tier 1: exact id match short-circuits everything else.
        if let Some(node) = self.graph.node(reference) {
            return vec![Candidate {
                node: node.clone(),
                score: self.score(node, 100.0),
                method: "exact_id",
            }];
        }

        let mut out = Vec::new();
        let ref_lower = reference.to_ascii_lowercase();

        for node in self.graph.nodes() {
            if node.name == reference {
                out.push(Candidate {
                    node: node.clone(),
                    score: self.score(node, 90.0),
                    method: "exact_name",
                });
            } else if node.qualified_name.ends_with(reference) {
                out.push(Candidate {
                    node: node.clone(),
                    score: self.score(node, 60.0),
                    method: "suffix_qualified_name",
                });
            } else if node.name.to_ascii_lowercase().contains(&ref_lower)
                || node.qualified_name.to_ascii_lowercase().contains(&ref_lower)
            {
                out.push(Candidate {
                    node: node.clone(),
                    score: self.score(node, 30.0),
                    method: "fuzzy_substring",
                });
            }
        }

        out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        out
    }

    /// Base score plus a test-location penalty and a shorter-path bonus.
    fn score(&self, node: &Node, base: f64) -> f64 {
        let mut score = base;
        if node.is_test_location() {
            score -= 20.0;
        }
        let depth = node.file_path.matches('/').count() as f64;
        score += (10.0 - depth).max(0.0) * 0.5;
        score
    }

    pub fn resolve(&self, reference: &str, strategy: ResolveStrategy) -> Result<ResolvedNode> {
        self.resolve_with(reference, strategy, None)
    }

    /// `interactive` strategy uses `pick` to choose among candidates.
    pub fn resolve_with(
        &self,
        reference: &str,
        strategy: ResolveStrategy,
        pick: Option<&dyn Fn(&[Candidate]) -> usize>,
    ) -> Result<ResolvedNode> {
        let candidates = self.candidates(reference);
        if candidates.is_empty() {
            return Err(MuError::NotFound(reference.to_string()));
        }

        let was_ambiguous = candidates.len() > 1
            && (candidates[0].score - candidates[1].score).abs() < f64::EPSILON;

        if strategy == ResolveStrategy::Strict && candidates.len() > 1 {
            return Err(MuError::Ambiguous {
                reference: reference.to_string(),
                candidates: candidates.iter().map(|c| c.node.id.clone()).collect(),
            });
        }

        let chosen_idx = match strategy {
            ResolveStrategy::FirstMatch => 0,
            ResolveStrategy::Interactive => pick
                .map(|f| f(&candidates))
                .unwrap_or(0)
                .min(candidates.len() - 1),
            ResolveStrategy::PreferSource | ResolveStrategy::Strict => candidates
                .iter()
                .position(|c| !c.node.is_test_location())
                .unwrap_or(0),
        };

        let chosen = candidates[chosen_idx].clone();
        let alternatives = candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != chosen_idx)
            .map(|(_, c)| c.node.clone())
            .collect();

        Ok(ResolvedNode {
            node: chosen.node,
            alternatives,
            resolution_method: chosen.method,
            was_ambiguous: was_ambiguous || candidates.len() > 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    fn graph_with_two_foos() -> CodeGraph {
        let mut graph = CodeGraph::new("/".into());
        graph.add_node(Node::new(
            NodeKind::Class,
            "Foo",
            "Foo",
            "src/foo.py",
            1,
            10,
        ));
        graph.add_node(Node::new(
            NodeKind::Class,
            "Foo",
            "Foo",
            "tests/test_foo.py",
            1,
            10,
        ));
        graph
    }

    #[test]
    fn prefer_source_picks_non_test_and_flags_ambiguous() {
        let graph = graph_with_two_foos();
        let resolver = Resolver::new(&graph);
        let resolved = resolver
            .resolve("Foo", ResolveStrategy::PreferSource)
            .unwrap();
        assert_eq!(resolved.node.file_path, "src/foo.py");
        assert!(resolved.was_ambiguous);
        assert_eq!(resolved.alternatives.len(), 1);
    }

    #[test]
    fn strict_fails_on_ambiguity() {
        let graph = graph_with_two_foos();
        let resolver = Resolver::new(&graph);
        assert!(matches!(
            resolver.resolve("Foo", ResolveStrategy::Strict),
            Err(MuError::Ambiguous { .. })
        ));
    }

    #[test]
    fn exact_id_short_circuits() {
        let graph = graph_with_two_foos();
        let resolver = Resolver::new(&graph);
        let id = graph.nodes().next().unwrap().id.clone();
        let resolved = resolver.resolve(&id, ResolveStrategy::Strict).unwrap();
        assert_eq!(resolved.node.id, id);
        assert!(!resolved.was_ambiguous);
    }
}
