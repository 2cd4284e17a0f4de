//! Multi-signal retrieval (SPEC_FULL.md §4.6 step 2). Scores candidate nodes
//! from keyword matches, an optional vector-similarity signal and
//! entity-type/domain boosts, then widens the result with a proximity pass
//! over the graph. Grounded on
//! `original_source/src/mu/intelligence/task_context.py::TaskContextExtractor::_retrieve_nodes`
//! and `_filter_by_entity_types`, and on the per-signal weights spelled out
//! in SPEC_FULL.md §4.6 ("Per-signal scoring details").

use std::collections::{HashMap, HashSet};

use crate::model::{CodeGraph, Node};
use crate::store::EmbeddingType;
use crate::Store;

use super::task_analysis::{EntityType, TaskAnalysis};

/// A node plus its composite relevance score and the signals that produced
/// it, kept separate for observability (`extraction_stats`-style reporting).
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node: Node,
    pub score: f64,
    pub lexical_score: f64,
    pub vector_score: f64,
    pub proximity_score: f64,
    pub type_score: f64,
}

/// Retrieve and score candidate nodes for `analysis`.
///
/// `query_embedding` is an already-computed embedding for the task text —
/// the core never calls an embedding provider itself (§1 treats that as an
/// external collaborator); callers that have one wire it through `store`'s
/// `vector_search`. Absent an embedding, or a `store` with no vectors
/// indexed, the vector signal is silently dropped, not an error.
pub fn retrieve(
    graph: &CodeGraph,
    store: Option<&dyn Store>,
    query_embedding: Option<&[f32]>,
    analysis: &TaskAnalysis,
) -> Vec<ScoredNode> {
    let mut scores: HashMap<String, ScoredNode> = HashMap::new();

    lexical_pass(graph, analysis, &mut scores);
    vector_pass(store, query_embedding, &mut scores);
    type_pass(analysis, &mut scores);
    proximity_pass(graph, &mut scores);

    let mut out: Vec<ScoredNode> = scores.into_values().collect();
    out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    out
}

fn entry<'a>(scores: &'a mut HashMap<String, ScoredNode>, node: &Node) -> &'a mut ScoredNode {
    scores.entry(node.id.clone()).or_insert_with(|| ScoredNode {
        node: node.clone(),
        score: 0.0,
        lexical_score: 0.0,
        vector_score: 0.0,
        proximity_score: 0.0,
        type_score: 0.0,
    })
}

fn lexical_pass(graph: &CodeGraph, analysis: &TaskAnalysis, scores: &mut HashMap<String, ScoredNode>) {
    let keywords = &analysis.keywords;
    if keywords.is_empty() {
        return;
    }
    // "decayed by number of keywords matched" (§4.6): more keywords spreads
    // weight thinner per keyword so one long keyword list can't dominate.
    let decay = 1.0 / (1.0 + 0.05 * (keywords.len().saturating_sub(1) as f64));

    for node in graph.nodes() {
        let name_lower = node.name.to_lowercase();
        let qualified_lower = node.qualified_name.to_lowercase();
        let mut hit = 0.0;
        for kw in keywords {
            let kw_lower = kw.to_lowercase();
            if name_lower == kw_lower || qualified_lower == kw_lower {
                hit += 1.0;
            } else if name_lower.contains(&kw_lower) || qualified_lower.contains(&kw_lower) {
                hit += 0.5;
            }
        }
        if hit > 0.0 {
            let e = entry(scores, node);
            let contribution = hit * decay;
            e.lexical_score += contribution;
            e.score += contribution;
        }
    }
}

fn vector_pass(store: Option<&dyn Store>, query_embedding: Option<&[f32]>, scores: &mut HashMap<String, ScoredNode>) {
    let (Some(store), Some(embedding)) = (store, query_embedding) else { return };
    let results = match store.vector_search(embedding, EmbeddingType::Code, 20) {
        Ok(results) => results,
        Err(e) => {
            // §1/§9 open question: the embedding service's failures are
            // swallowed here by design — the vector signal just drops out,
            // lexical/type/proximity scoring still produce a result.
            tracing::debug!(error = %e, "vector search unavailable, falling back to lexical-only retrieval");
            return;
        }
    };
    for (node, similarity) in results {
        let scaled = similarity.clamp(0.0, 1.0) as f64;
        let e = entry(scores, &node);
        e.vector_score += scaled;
        e.score += scaled;
    }
}

fn type_pass(analysis: &TaskAnalysis, scores: &mut HashMap<String, ScoredNode>) {
    for scored in scores.values_mut() {
        let name_lower = scored.node.name.to_lowercase();
        let path_lower = scored.node.file_path.to_lowercase();
        let mut boost = 0.0;

        for entity_type in &analysis.entity_types {
            if entity_type_matches(entity_type, &name_lower, &path_lower) {
                boost += 0.3;
            }
        }
        for domain in &analysis.domain_hints {
            if name_lower.contains(domain.as_str()) || path_lower.contains(domain.as_str()) {
                boost += 0.2;
            }
        }

        scored.type_score += boost;
        scored.score += boost;
    }
}

fn entity_type_matches(entity_type: &EntityType, name_lower: &str, path_lower: &str) -> bool {
    match entity_type {
        EntityType::Service => name_lower.ends_with("service"),
        EntityType::Repository => ["repository", "repo", "store"].iter().any(|kw| name_lower.contains(kw)),
        EntityType::Hook => name_lower.starts_with("use"),
        EntityType::Component => ["component", "view", "page"].iter().any(|kw| name_lower.contains(kw)),
        EntityType::ApiEndpoint => ["route", "api", "endpoint"].iter().any(|kw| path_lower.contains(kw)),
        EntityType::Middleware => path_lower.contains("middleware"),
        EntityType::Model => ["model", "entity", "schema"].iter().any(|kw| name_lower.contains(kw)),
        EntityType::Test => path_lower.contains("test"),
        EntityType::Config => ["config", "settings"].iter().any(|kw| name_lower.contains(kw) || path_lower.contains(kw)),
    }
}

/// "+0.1 per edge hop within a depth-2 neighbourhood of an already-selected
/// high-score node" (§4.6). Seeds from the current top candidates, walks
/// both directions up to depth 2, and boosts (or introduces) neighbours.
fn proximity_pass(graph: &CodeGraph, scores: &mut HashMap<String, ScoredNode>) {
    const SEED_COUNT: usize = 10;
    const MAX_DEPTH: usize = 2;

    let mut seeds: Vec<String> = scores.keys().cloned().collect();
    seeds.sort_by(|a, b| {
        let sa = scores.get(a).map(|s| s.score).unwrap_or(0.0);
        let sb = scores.get(b).map(|s| s.score).unwrap_or(0.0);
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });
    seeds.truncate(SEED_COUNT);

    let mut boosted: HashSet<String> = HashSet::new();

    for seed in &seeds {
        let mut frontier: Vec<String> = vec![seed.clone()];
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(seed.clone());

        for _ in 0..MAX_DEPTH {
            let mut next_frontier = Vec::new();
            for id in &frontier {
                let mut neighbours: Vec<String> = graph.edges_from(id).into_iter().map(|(to, _)| to.to_string()).collect();
                neighbours.extend(graph.edges_to(id).into_iter().map(|(from, _)| from.to_string()));
                for n in neighbours {
                    if visited.insert(n.clone()) {
                        next_frontier.push(n);
                    }
                }
            }
            for n in &next_frontier {
                if boosted.insert(format!("{seed}->{n}")) {
                    if let Some(node) = graph.node(n) {
                        let e = entry(scores, node);
                        e.proximity_score += 0.1;
                        e.score += 0.1;
                    }
                }
            }
            frontier = next_frontier;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeKind, NodeKind};
    use std::path::PathBuf;

    fn analysis_with_keywords(keywords: &[&str]) -> TaskAnalysis {
        TaskAnalysis {
            original_task: "test".to_string(),
            task_type: super::super::task_analysis::TaskType::Modify,
            entity_types: vec![],
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            domain_hints: vec![],
            confidence: 0.5,
        }
    }

    #[test]
    fn keyword_match_scores_exact_over_substring() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let auth = Node::new(NodeKind::Class, "AuthService", "AuthService", "auth.py", 1, 10);
        let other = Node::new(NodeKind::Class, "OtherAuthServiceHelper", "OtherAuthServiceHelper", "other.py", 1, 10);
        graph.add_node(auth.clone());
        graph.add_node(other.clone());

        let analysis = analysis_with_keywords(&["AuthService"]);
        let results = retrieve(&graph, None, None, &analysis);

        assert_eq!(results[0].node.id, auth.id);
        assert!(results[0].lexical_score > results[1].lexical_score);
    }

    #[test]
    fn proximity_pulls_in_neighbours_of_top_candidate() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let svc = Node::new(NodeKind::Class, "AuthService", "AuthService", "auth.py", 1, 10);
        let helper = Node::new(NodeKind::Function, "hash_password", "AuthService.hash_password", "auth.py", 20, 30);
        graph.add_node(svc.clone());
        graph.add_node(helper.clone());
        graph.add_edge(Edge::new(svc.id.clone(), helper.id.clone(), EdgeKind::Calls)).unwrap();

        let analysis = analysis_with_keywords(&["AuthService"]);
        let results = retrieve(&graph, None, None, &analysis);

        assert!(results.iter().any(|r| r.node.id == helper.id && r.proximity_score > 0.0));
    }
}
