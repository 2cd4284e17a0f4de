//! Planner/executor: compiles a parsed [`super::ast::Query`] into store and
//! graph-engine operations (SPEC_FULL.md §4.5 "Planner/executor"). `select`
//! is executed directly against the materialised [`CodeGraph`] (field
//! projection/filter/sort/limit, no SQL translation needed once the graph is
//! in memory); `show`/`find`/`path` are planned as [`GraphEngine`] calls,
//! combined with a [`Resolver`] step for `OF ref`; `analyze` has the fixed
//! implementations the spec names.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde_json::Value as Json;

use super::ast::*;
use crate::engine::GraphEngine;
use crate::error::{MuError, Result};
use crate::model::{CodeGraph, EdgeKind, Node, NodeKind};
use crate::resolver::{ResolveStrategy, Resolver};

#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    Rows(Vec<serde_json::Map<String, Json>>),
    Nodes(Vec<Node>),
    Path(Vec<String>),
    Analysis(Json),
}

pub fn execute(query: &Query, graph: &CodeGraph) -> Result<QueryResult> {
    match query {
        Query::Select(q) => exec_select(q, graph),
        Query::Show(q) => exec_show(q, graph),
        Query::Find(q) => exec_find(q, graph),
        Query::Path(q) => exec_path(q, graph),
        Query::Analyze(q) => exec_analyze(q, graph),
    }
}

fn resolve_ref(graph: &CodeGraph, reference: &str) -> Result<Node> {
    let resolver = Resolver::new(graph);
    Ok(resolver.resolve(reference, ResolveStrategy::PreferSource)?.node)
}

// ---- field access for SELECT / ORDER BY / WHERE -------------------------

fn field_value(node: &Node, field: &str) -> Json {
    match field {
        "id" => Json::String(node.id.clone()),
        "kind" => Json::String(node.kind.as_str().to_string()),
        "name" => Json::String(node.name.clone()),
        "qualified_name" => Json::String(node.qualified_name.clone()),
        "file_path" => Json::String(node.file_path.clone()),
        "line_start" => Json::from(node.line_start),
        "line_end" => Json::from(node.line_end),
        "complexity" => Json::from(node.complexity),
        "is_async" => Json::Bool(node.properties.is_async),
        "is_method" => Json::Bool(node.properties.is_method),
        "return_type" => node.properties.return_type.clone().map(Json::String).unwrap_or(Json::Null),
        "decorators" => Json::Array(node.properties.decorators.iter().cloned().map(Json::String).collect()),
        "bases" => Json::Array(node.properties.bases.iter().cloned().map(Json::String).collect()),
        "attributes" => Json::Array(node.properties.attributes.iter().cloned().map(Json::String).collect()),
        "parameter_count" => Json::from(node.properties.parameters.len()),
        other => node.properties.extra.get(other).cloned().unwrap_or(Json::Null),
    }
}

fn value_as_f64(v: &Json) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

fn value_as_str(v: &Json) -> Option<String> {
    match v {
        Json::String(s) => Some(s.clone()),
        Json::Bool(b) => Some(b.to_string()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn ast_value_to_json(v: &Value) -> Json {
    match v {
        Value::Str(s) => Json::String(s.clone()),
        Value::Num(n) => Json::from(*n),
        Value::Bool(b) => Json::Bool(*b),
        Value::Null => Json::Null,
        Value::List(items) => Json::Array(items.iter().map(ast_value_to_json).collect()),
    }
}

fn glob_to_regex(pattern: &str) -> Regex {
    let escaped = regex::escape(pattern).replace("%", ".*");
    Regex::new(&format!("(?i)^{escaped}$")).unwrap_or_else(|_| Regex::new("$^").unwrap())
}

fn eval_condition(node: &Node, cond: &Condition) -> bool {
    let field = field_value(node, &cond.field);
    match cond.op {
        CompareOp::Eq => field == ast_value_to_json(&cond.value),
        CompareOp::Ne => field != ast_value_to_json(&cond.value),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let (Some(a), Value::Num(b)) = (value_as_f64(&field), &cond.value) else { return false };
            match cond.op {
                CompareOp::Lt => a < *b,
                CompareOp::Le => a <= *b,
                CompareOp::Gt => a > *b,
                CompareOp::Ge => a >= *b,
                _ => unreachable!(),
            }
        }
        CompareOp::Like => {
            let Value::Str(pattern) = &cond.value else { return false };
            let Some(s) = value_as_str(&field) else { return false };
            glob_to_regex(pattern).is_match(&s)
        }
        CompareOp::In => {
            let Value::List(items) = &cond.value else { return false };
            items.iter().any(|v| ast_value_to_json(v) == field)
        }
        CompareOp::NotIn => {
            let Value::List(items) = &cond.value else { return true };
            !items.iter().any(|v| ast_value_to_json(v) == field)
        }
        CompareOp::Contains => {
            let Value::Str(needle) = &cond.value else { return false };
            match &field {
                Json::Array(items) => items.iter().filter_map(|v| v.as_str()).any(|s| s == needle),
                Json::String(s) => s.contains(needle.as_str()),
                _ => false,
            }
        }
    }
}

fn eval_expr(node: &Node, expr: &Expr) -> bool {
    match expr {
        Expr::Cmp(c) => eval_condition(node, c),
        Expr::And(a, b) => eval_expr(node, a) && eval_expr(node, b),
        Expr::Or(a, b) => eval_expr(node, a) || eval_expr(node, b),
    }
}

fn exec_select(q: &SelectQuery, graph: &CodeGraph) -> Result<QueryResult> {
    let mut nodes: Vec<&Node> = graph
        .nodes()
        .filter(|n| q.from.to_kind().map(|k| n.kind == k).unwrap_or(true))
        .filter(|n| q.where_.as_ref().map(|e| eval_expr(n, e)).unwrap_or(true))
        .collect();

    for (field, dir) in q.order_by.iter().rev() {
        nodes.sort_by(|a, b| {
            let (va, vb) = (field_value(a, field), field_value(b, field));
            let ord = match (value_as_f64(&va), value_as_f64(&vb)) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                _ => value_as_str(&va).unwrap_or_default().cmp(&value_as_str(&vb).unwrap_or_default()),
            };
            if *dir == SortDir::Desc {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    // `COUNT/AVG/MIN/MAX/SUM` aggregates over the (already filtered) set,
    // collapsing to a single row (SPEC_FULL.md §4.5).
    if q.fields.iter().any(|f| matches!(f, Field::Aggregate(..))) {
        let mut row = serde_json::Map::new();
        for field in &q.fields {
            if let Field::Aggregate(func, agg_field) = field {
                let label = match agg_field {
                    AggField::Star => format!("{func:?}(*)").to_lowercase(),
                    AggField::Name(n) => format!("{func:?}({n})").to_lowercase(),
                };
                let nums: Vec<f64> = match agg_field {
                    AggField::Star => nodes.iter().map(|_| 1.0).collect(),
                    AggField::Name(n) => nodes.iter().filter_map(|node| value_as_f64(&field_value(node, n))).collect(),
                };
                let value = match func {
                    AggFunc::Count => nums.len() as f64,
                    AggFunc::Sum => nums.iter().sum(),
                    AggFunc::Avg => {
                        if nums.is_empty() {
                            0.0
                        } else {
                            nums.iter().sum::<f64>() / nums.len() as f64
                        }
                    }
                    AggFunc::Min => nums.iter().cloned().fold(f64::INFINITY, f64::min),
                    AggFunc::Max => nums.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                };
                row.insert(label, Json::from(value));
            }
        }
        return Ok(QueryResult::Rows(vec![row]));
    }

    if let Some(limit) = q.limit {
        nodes.truncate(limit);
    }

    let rows = nodes
        .into_iter()
        .map(|n| {
            let mut row = serde_json::Map::new();
            if q.fields.iter().any(|f| matches!(f, Field::Star)) {
                row.insert("id".to_string(), field_value(n, "id"));
                row.insert("kind".to_string(), field_value(n, "kind"));
                row.insert("name".to_string(), field_value(n, "name"));
                row.insert("qualified_name".to_string(), field_value(n, "qualified_name"));
                row.insert("file_path".to_string(), field_value(n, "file_path"));
                row.insert("line_start".to_string(), field_value(n, "line_start"));
                row.insert("line_end".to_string(), field_value(n, "line_end"));
                row.insert("complexity".to_string(), field_value(n, "complexity"));
            } else {
                for field in &q.fields {
                    if let Field::Name(name) = field {
                        row.insert(name.clone(), field_value(n, name));
                    }
                }
            }
            row
        })
        .collect();

    Ok(QueryResult::Rows(rows))
}

fn exec_show(q: &ShowQuery, graph: &CodeGraph) -> Result<QueryResult> {
    let node = resolve_ref(graph, &q.reference)?;
    let engine = GraphEngine::load(graph);
    let depth = q.depth;

    let ids: Vec<String> = match q.kind {
        ShowKind::Dependencies => engine.dependencies(&node.id, None, depth)?,
        ShowKind::Dependents => engine.impact_depth(&node.id, None, depth)?,
        ShowKind::Callers => engine.impact_depth(&node.id, Some(&[EdgeKind::Calls]), depth)?,
        ShowKind::Callees => engine.dependencies(&node.id, Some(&[EdgeKind::Calls]), depth)?,
        ShowKind::Inheritance => {
            let mut up = engine.dependencies(&node.id, Some(&[EdgeKind::Inherits]), depth)?;
            let mut down = engine.impact_depth(&node.id, Some(&[EdgeKind::Inherits]), depth)?;
            up.append(&mut down);
            up
        }
        ShowKind::Implementations => engine.impact_depth(&node.id, Some(&[EdgeKind::Implements]), depth)?,
        ShowKind::Children => graph.edges_from(&node.id).iter().filter(|(_, e)| e.kind == EdgeKind::Contains).map(|(t, _)| t.to_string()).collect(),
        ShowKind::Parents => graph.edges_to(&node.id).iter().filter(|(_, e)| e.kind == EdgeKind::Contains).map(|(s, _)| s.to_string()).collect(),
    };

    let nodes: Vec<Node> = ids.iter().filter_map(|id| graph.node(id).cloned()).collect();
    Ok(QueryResult::Nodes(nodes))
}

fn exec_find(q: &FindQuery, graph: &CodeGraph) -> Result<QueryResult> {
    let kind_filter = q.kind.to_kind();
    let matches_kind = |n: &Node| kind_filter.map(|k| n.kind == k).unwrap_or(true);

    let nodes: Vec<Node> = match &q.predicate {
        FindPredicate::Calling(r) => {
            let target = resolve_ref(graph, r)?;
            graph.edges_to(&target.id).iter().filter(|(_, e)| e.kind == EdgeKind::Calls)
                .filter_map(|(s, _)| graph.node(s).cloned()).filter(matches_kind).collect()
        }
        FindPredicate::CalledBy(r) => {
            let source = resolve_ref(graph, r)?;
            graph.edges_from(&source.id).iter().filter(|(_, e)| e.kind == EdgeKind::Calls)
                .filter_map(|(t, _)| graph.node(t).cloned()).filter(matches_kind).collect()
        }
        FindPredicate::Importing(r) => {
            let target = resolve_ref(graph, r)?;
            graph.edges_to(&target.id).iter().filter(|(_, e)| e.kind == EdgeKind::Imports)
                .filter_map(|(s, _)| graph.node(s).cloned()).filter(matches_kind).collect()
        }
        FindPredicate::ImportedBy(r) => {
            let source = resolve_ref(graph, r)?;
            graph.edges_from(&source.id).iter().filter(|(_, e)| e.kind == EdgeKind::Imports)
                .filter_map(|(t, _)| graph.node(t).cloned()).filter(matches_kind).collect()
        }
        FindPredicate::Inheriting(r) => {
            let target = resolve_ref(graph, r)?;
            graph.edges_to(&target.id).iter().filter(|(_, e)| e.kind == EdgeKind::Inherits)
                .filter_map(|(s, _)| graph.node(s).cloned()).filter(matches_kind).collect()
        }
        FindPredicate::Implementing(r) => {
            let target = resolve_ref(graph, r)?;
            graph.edges_to(&target.id).iter().filter(|(_, e)| e.kind == EdgeKind::Implements)
                .filter_map(|(s, _)| graph.node(s).cloned()).filter(matches_kind).collect()
        }
        FindPredicate::Mutating(r) => {
            let target = resolve_ref(graph, r)?;
            graph.edges_to(&target.id).iter().filter(|(_, e)| e.kind == EdgeKind::Uses)
                .filter_map(|(s, _)| graph.node(s).cloned()).filter(matches_kind).collect()
        }
        FindPredicate::WithDecorator(pattern) => {
            let re = glob_to_regex(pattern);
            graph.nodes().filter(|n| matches_kind(n) && n.properties.decorators.iter().any(|d| re.is_match(d))).cloned().collect()
        }
        FindPredicate::WithAnnotation(pattern) => {
            let re = glob_to_regex(pattern);
            graph.nodes().filter(|n| matches_kind(n) && n.properties.attributes.iter().any(|a| re.is_match(a))).cloned().collect()
        }
        FindPredicate::Matching(pattern) => {
            let re = glob_to_regex(pattern);
            graph.nodes().filter(|n| matches_kind(n) && (re.is_match(&n.name) || re.is_match(&n.qualified_name))).cloned().collect()
        }
        FindPredicate::SimilarTo(r) => {
            let target = resolve_ref(graph, r)?;
            let needle = target.name.to_ascii_lowercase();
            let mut scored: Vec<(Node, usize)> = graph
                .nodes()
                .filter(|n| matches_kind(n) && n.id != target.id)
                .map(|n| (n.clone(), common_prefix_len(&needle, &n.name.to_ascii_lowercase())))
                .filter(|(_, score)| *score > 0)
                .collect();
            scored.sort_by(|a, b| b.1.cmp(&a.1));
            scored.into_iter().map(|(n, _)| n).collect()
        }
    };

    Ok(QueryResult::Nodes(nodes))
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

fn exec_path(q: &PathQuery, graph: &CodeGraph) -> Result<QueryResult> {
    let from = resolve_ref(graph, &q.from)?;
    let to = resolve_ref(graph, &q.to)?;
    let engine = GraphEngine::load(graph);
    let path = engine.path(&from.id, &to.id, q.max_depth, q.via)?;
    Ok(QueryResult::Path(path))
}

fn exec_analyze(q: &AnalyzeQuery, graph: &CodeGraph) -> Result<QueryResult> {
    match q.kind {
        AnalysisKind::Coupling => {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for node in graph.nodes().filter(|n| n.kind == NodeKind::Module) {
                let c = graph.edges_from(&node.id).iter().filter(|(_, e)| e.kind == EdgeKind::Imports).count();
                counts.insert(&node.qualified_name, c);
            }
            Ok(QueryResult::Analysis(serde_json::to_value(&counts).unwrap_or(Json::Null)))
        }
        AnalysisKind::Cohesion => {
            let mut out = serde_json::Map::new();
            for node in graph.nodes().filter(|n| n.kind == NodeKind::Module) {
                let module_prefix = node.file_path.as_str();
                let touching: Vec<_> = graph
                    .edges()
                    .filter(|e| {
                        let touches_src = graph.node(&e.source_id).map(|n| n.file_path == module_prefix).unwrap_or(false);
                        let touches_tgt = graph.node(&e.target_id).map(|n| n.file_path == module_prefix).unwrap_or(false);
                        touches_src || touches_tgt
                    })
                    .collect();
                let intra = touching
                    .iter()
                    .filter(|e| {
                        graph.node(&e.source_id).map(|n| n.file_path == module_prefix).unwrap_or(false)
                            && graph.node(&e.target_id).map(|n| n.file_path == module_prefix).unwrap_or(false)
                    })
                    .count();
                let ratio = if touching.is_empty() { 0.0 } else { intra as f64 / touching.len() as f64 };
                out.insert(node.qualified_name.clone(), Json::from(ratio));
            }
            Ok(QueryResult::Analysis(Json::Object(out)))
        }
        AnalysisKind::Complexity => {
            let mut nodes: Vec<&Node> = graph.nodes().collect();
            nodes.sort_by(|a, b| b.complexity.cmp(&a.complexity));
            let rows: Vec<Json> = nodes
                .into_iter()
                .map(|n| serde_json::json!({"id": n.id, "name": n.name, "complexity": n.complexity}))
                .collect();
            Ok(QueryResult::Analysis(Json::Array(rows)))
        }
        AnalysisKind::Hotspots => {
            let engine = GraphEngine::load(graph);
            let mut rows: Vec<(String, usize)> = graph
                .nodes()
                .map(|n| (n.id.clone(), engine.impact(&n.id, None).map(|v| v.len()).unwrap_or(0)))
                .collect();
            rows.sort_by(|a, b| b.1.cmp(&a.1));
            let json_rows: Vec<Json> = rows.into_iter().map(|(id, count)| serde_json::json!({"id": id, "impact_size": count})).collect();
            Ok(QueryResult::Analysis(Json::Array(json_rows)))
        }
        AnalysisKind::Circular => {
            let engine = GraphEngine::load(graph);
            Ok(QueryResult::Analysis(serde_json::to_value(engine.cycles()).unwrap_or(Json::Null)))
        }
        AnalysisKind::Unused => {
            let mut incoming: HashSet<&str> = HashSet::new();
            for e in graph.edges() {
                if e.kind != EdgeKind::Contains {
                    incoming.insert(e.target_id.as_str());
                }
            }
            const ENTRY_POINTS: &[&str] = &["main", "__main__", "handler", "index"];
            let unused: Vec<&Node> = graph
                .nodes()
                .filter(|n| !incoming.contains(n.id.as_str()))
                .filter(|n| !ENTRY_POINTS.contains(&n.name.as_str()))
                .collect();
            Ok(QueryResult::Nodes(unused.into_iter().cloned().collect()))
        }
        AnalysisKind::Impact => {
            let reference = q.for_ref.as_deref().ok_or_else(|| MuError::Config("ANALYZE impact requires FOR <ref>".to_string()))?;
            let node = resolve_ref(graph, reference)?;
            let engine = GraphEngine::load(graph);
            let ids = engine.impact(&node.id, None)?;
            Ok(QueryResult::Analysis(serde_json::to_value(ids).unwrap_or(Json::Null)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeKind, Node, NodeKind, Parameter};
    use crate::muql::parser::parse;

    fn sample_graph() -> CodeGraph {
        let mut g = CodeGraph::new("/repo".into());
        let mut f1 = Node::new(NodeKind::Function, "a", "a", "a.py", 1, 10);
        f1.complexity = 40;
        let mut f2 = Node::new(NodeKind::Function, "b", "b", "b.py", 1, 10);
        f2.complexity = 30;
        let mut f3 = Node::new(NodeKind::Function, "c", "c", "c.py", 1, 10);
        f3.complexity = 15;
        let mut f4 = Node::new(NodeKind::Function, "d", "d", "d.py", 1, 10);
        f4.complexity = 25;
        g.add_node(f1);
        g.add_node(f2);
        g.add_node(f3);
        g.add_node(f4);
        let _ = Parameter { name: "x".to_string(), param_type: None, default_value: None };
        g
    }

    #[test]
    fn select_where_order_limit_matches_spec_scenario() {
        let graph = sample_graph();
        let query = parse("SELECT name FROM functions WHERE complexity > 20 ORDER BY complexity DESC LIMIT 3").unwrap();
        let QueryResult::Rows(rows) = execute(&query, &graph).unwrap() else { panic!("expected rows") };
        assert_eq!(rows.len(), 3);
        let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "d"]);
    }

    #[test]
    fn impact_two_module_scenario() {
        let mut g = CodeGraph::new("/repo".into());
        let a = g.add_node(Node::new(NodeKind::Module, "mod_a", "mod_a", "src/mod_a.py", 1, 1));
        let b = g.add_node(Node::new(NodeKind::Module, "mod_b", "mod_b", "src/mod_b.py", 1, 1));
        g.add_edge(Edge::new(a.clone(), b.clone(), EdgeKind::Imports)).unwrap();

        let query = parse(&format!("ANALYZE impact FOR '{b}'")).unwrap();
        let QueryResult::Analysis(val) = execute(&query, &g).unwrap() else { panic!("expected analysis") };
        assert_eq!(val, serde_json::json!([a]));
    }
}
