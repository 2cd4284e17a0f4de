//! Token-budget fitting (SPEC_FULL.md §4.6 step 3, §9 "Tokenisation
//! coupling"). Greedy fitter: sorted candidates are pulled in until the
//! estimated cost reaches the budget, always widening to each selected
//! node's immediate container so output is self-contained. Grounded on
//! `original_source/src/mu/intelligence/task_context.py::_build_mu_text`'s
//! budget-fitting call site, using `tiktoken-rs`'s `cl100k_base` per
//! SPEC_FULL.md §9's tokeniser coupling requirement instead of Python's
//! `tiktoken`.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

use crate::model::{CodeGraph, Node, NodeKind};

use super::retrieval::ScoredNode;

fn tokenizer() -> &'static CoreBPE {
    static BPE: OnceLock<CoreBPE> = OnceLock::new();
    BPE.get_or_init(|| tiktoken_rs::cl100k_base().expect("cl100k_base vocabulary is bundled"))
}

/// Count tokens the same way OMEGA output will eventually be measured.
pub fn count_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    tokenizer().encode_with_special_tokens(text).len()
}

/// Rough per-node token cost estimate used while fitting, before the real
/// S-expression is rendered (the OMEGA emitter re-measures the final text).
fn estimate_node_tokens(node: &Node) -> usize {
    // A line of code is ~8-12 cl100k tokens; count_tokens on the qualified
    // name plus a flat per-line estimate keeps this cheap (no source read).
    let line_span = (node.line_end.saturating_sub(node.line_start) + 1) as usize;
    count_tokens(&node.qualified_name) + line_span.clamp(1, 200) * 3
}

/// Given the immediate container of `node` (module for a class/function,
/// class for a method), if one exists in the graph.
fn container_of<'a>(graph: &'a CodeGraph, node: &Node) -> Option<&'a Node> {
    match node.kind {
        NodeKind::Method => {
            // Contains edges point container -> member; walk reverse edges
            // looking for a Class that contains this node.
            graph
                .edges_to(&node.id)
                .into_iter()
                .find(|(_, edge)| edge.kind == crate::model::EdgeKind::Contains)
                .and_then(|(from_id, _)| graph.node(from_id))
        }
        NodeKind::Class | NodeKind::Function => graph
            .edges_to(&node.id)
            .into_iter()
            .find(|(_, edge)| edge.kind == crate::model::EdgeKind::Contains)
            .and_then(|(from_id, _)| graph.node(from_id))
            .filter(|n| n.kind == NodeKind::Module),
        NodeKind::Module | NodeKind::External => None,
    }
}

/// Greedily select nodes (plus their immediate containers) until `budget`
/// tokens are spent. Candidates must already be sorted best-first.
pub fn fit_to_budget(graph: &CodeGraph, candidates: &[ScoredNode], budget: usize) -> Vec<Node> {
    let mut selected: Vec<Node> = Vec::new();
    let mut selected_ids = std::collections::HashSet::new();
    let mut spent = 0usize;

    for candidate in candidates {
        let node = &candidate.node;
        if selected_ids.contains(&node.id) {
            continue;
        }

        let container = container_of(graph, node).filter(|c| !selected_ids.contains(&c.id));
        let container_cost = container.map(estimate_node_tokens).unwrap_or(0);
        let node_cost = estimate_node_tokens(node);
        let total_cost = node_cost + container_cost;

        if spent + total_cost > budget && !selected.is_empty() {
            continue;
        }

        if let Some(container) = container {
            selected_ids.insert(container.id.clone());
            selected.push(container.clone());
            spent += container_cost;
        }
        selected_ids.insert(node.id.clone());
        selected.push(node.clone());
        spent += node_cost;

        if spent >= budget {
            break;
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodeGraph, Edge, EdgeKind};
    use std::path::PathBuf;

    #[test]
    fn pulls_in_container_for_a_method() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let module = Node::new(NodeKind::Module, "auth", "auth", "auth.py", 1, 50);
        let class = Node::new(NodeKind::Class, "AuthService", "AuthService", "auth.py", 2, 40);
        let method = Node::new(NodeKind::Method, "login", "AuthService.login", "auth.py", 10, 20);
        graph.add_node(module.clone());
        graph.add_node(class.clone());
        graph.add_node(method.clone());
        graph.add_edge(Edge::new(module.id.clone(), class.id.clone(), EdgeKind::Contains)).unwrap();
        graph.add_edge(Edge::new(class.id.clone(), method.id.clone(), EdgeKind::Contains)).unwrap();

        let candidates = vec![ScoredNode {
            node: method.clone(),
            score: 1.0,
            lexical_score: 1.0,
            vector_score: 0.0,
            proximity_score: 0.0,
            type_score: 0.0,
        }];

        let selected = fit_to_budget(&graph, &candidates, 10_000);
        assert!(selected.iter().any(|n| n.id == method.id));
        assert!(selected.iter().any(|n| n.id == class.id));
    }

    #[test]
    fn stops_once_budget_exhausted() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let mut candidates = Vec::new();
        for i in 0..50 {
            let node = Node::new(NodeKind::Function, format!("f{i}"), format!("f{i}"), "big.py", 1, 500);
            graph.add_node(node.clone());
            candidates.push(ScoredNode {
                node,
                score: 1.0,
                lexical_score: 1.0,
                vector_score: 0.0,
                proximity_score: 0.0,
                type_score: 0.0,
            });
        }

        let selected = fit_to_budget(&graph, &candidates, 200);
        assert!(selected.len() < 50);
    }
}
