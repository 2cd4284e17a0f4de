//! Semantic diff between two graphs (SPEC_FULL.md §4.9, §6 "Semantic diff
//! JSON shape"). Adapted from the teacher's `diff::impact::ChangeClassification`
//! (binary breaking/potentially-breaking/safe) into the richer per-entity
//! change record the spec calls for.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{CodeGraph, EdgeKind, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Module,
    Class,
    Function,
    Method,
    Dependency,
}

/// One classified change (SPEC_FULL.md §6 `changes[]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityChange {
    pub entity_type: EntityKind,
    pub entity_name: String,
    pub parent_name: Option<String>,
    pub change_type: ChangeKind,
    pub is_breaking: bool,
    pub details: String,
}

/// Why a change was (or wasn't) flagged breaking — kept on the record
/// mainly so tests and the markdown renderer can explain themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakingRule {
    SymbolRemoved,
    ParameterRemoved,
    ReturnTypeTightened,
    NotBreaking,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffSummary {
    pub modules_added: usize,
    pub modules_removed: usize,
    pub modules_modified: usize,
    pub classes_added: usize,
    pub classes_removed: usize,
    pub classes_modified: usize,
    pub functions_added: usize,
    pub functions_removed: usize,
    pub functions_modified: usize,
    pub methods_added: usize,
    pub methods_removed: usize,
    pub methods_modified: usize,
    pub dependencies_added: usize,
    pub dependencies_removed: usize,
    pub parameters_added: usize,
    pub parameters_removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticDiff {
    pub base_ref: String,
    pub target_ref: String,
    pub has_changes: bool,
    pub has_breaking_changes: bool,
    pub summary: DiffSummary,
    pub changes: Vec<EntityChange>,
}

fn parent_name(graph: &CodeGraph, node_id: &str) -> Option<String> {
    graph
        .edges_to(node_id)
        .into_iter()
        .find(|(_, e)| e.kind == EdgeKind::Contains)
        .and_then(|(src, _)| graph.node(src))
        .map(|n| n.qualified_name.clone())
}

fn entity_kind(kind: NodeKind) -> Option<EntityKind> {
    match kind {
        NodeKind::Module => Some(EntityKind::Module),
        NodeKind::Class => Some(EntityKind::Class),
        NodeKind::Function => Some(EntityKind::Function),
        NodeKind::Method => Some(EntityKind::Method),
        NodeKind::External => None,
    }
}

/// Computes the structured diff between two independently materialised
/// graphs — e.g. from [`super::git::graph_at_ref`] at two refs, or the live
/// working set against a historical one. Classification is keyed on node
/// id, so a node that keeps its id across both graphs but changes fields is
/// `modified`; one present in only one graph is `added`/`removed`.
pub fn diff_graphs(base_ref: &str, target_ref: &str, base: &CodeGraph, target: &CodeGraph) -> SemanticDiff {
    let mut summary = DiffSummary::default();
    let mut changes = Vec::new();
    let mut has_breaking = false;

    let base_ids: HashMap<&str, _> = base.nodes().map(|n| (n.id.as_str(), n)).collect();
    let target_ids: HashMap<&str, _> = target.nodes().map(|n| (n.id.as_str(), n)).collect();

    for (id, node) in &target_ids {
        let Some(kind) = entity_kind(node.kind) else { continue };
        match base_ids.get(id) {
            None => {
                record_added(kind, node, target, &mut summary, &mut changes);
            }
            Some(old) => {
                if super::content_hash_node(old) != super::content_hash_node(node) {
                    let (is_breaking, details) = classify_modification(kind, old, node);
                    has_breaking |= is_breaking;
                    bump_modified(kind, &mut summary);
                    changes.push(EntityChange {
                        entity_type: kind,
                        entity_name: node.name.clone(),
                        parent_name: parent_name(target, id),
                        change_type: ChangeKind::Modified,
                        is_breaking,
                        details,
                    });
                }
            }
        }
    }

    for (id, node) in &base_ids {
        let Some(kind) = entity_kind(node.kind) else { continue };
        if !target_ids.contains_key(id) {
            bump_removed(kind, &mut summary);
            has_breaking = true;
            changes.push(EntityChange {
                entity_type: kind,
                entity_name: node.name.clone(),
                parent_name: parent_name(base, id),
                change_type: ChangeKind::Removed,
                is_breaking: true,
                details: format!("{} removed", node.qualified_name),
            });
        }
    }

    // Dependency (imports) changes, by ordered (source, target) pair.
    let base_deps: std::collections::HashSet<(&str, &str)> = base
        .edges()
        .filter(|e| e.kind == EdgeKind::Imports)
        .map(|e| (e.source_id.as_str(), e.target_id.as_str()))
        .collect();
    let target_deps: std::collections::HashSet<(&str, &str)> = target
        .edges()
        .filter(|e| e.kind == EdgeKind::Imports)
        .map(|e| (e.source_id.as_str(), e.target_id.as_str()))
        .collect();
    for (src, tgt) in target_deps.difference(&base_deps) {
        summary.dependencies_added += 1;
        changes.push(EntityChange {
            entity_type: EntityKind::Dependency,
            entity_name: format!("{src} -> {tgt}"),
            parent_name: None,
            change_type: ChangeKind::Added,
            is_breaking: false,
            details: "new import".to_string(),
        });
    }
    for (src, tgt) in base_deps.difference(&target_deps) {
        summary.dependencies_removed += 1;
        changes.push(EntityChange {
            entity_type: EntityKind::Dependency,
            entity_name: format!("{src} -> {tgt}"),
            parent_name: None,
            change_type: ChangeKind::Removed,
            is_breaking: false,
            details: "import removed".to_string(),
        });
    }

    SemanticDiff {
        base_ref: base_ref.to_string(),
        target_ref: target_ref.to_string(),
        has_changes: !changes.is_empty(),
        has_breaking_changes: has_breaking,
        summary,
        changes,
    }
}

fn record_added(
    kind: EntityKind,
    node: &crate::model::Node,
    graph: &CodeGraph,
    summary: &mut DiffSummary,
    changes: &mut Vec<EntityChange>,
) {
    match kind {
        EntityKind::Module => summary.modules_added += 1,
        EntityKind::Class => summary.classes_added += 1,
        EntityKind::Function => summary.functions_added += 1,
        EntityKind::Method => summary.methods_added += 1,
        EntityKind::Dependency => {}
    }
    changes.push(EntityChange {
        entity_type: kind,
        entity_name: node.name.clone(),
        parent_name: parent_name(graph, &node.id),
        change_type: ChangeKind::Added,
        is_breaking: false,
        details: format!("{} added", node.qualified_name),
    });
}

fn bump_modified(kind: EntityKind, summary: &mut DiffSummary) {
    match kind {
        EntityKind::Module => summary.modules_modified += 1,
        EntityKind::Class => summary.classes_modified += 1,
        EntityKind::Function => summary.functions_modified += 1,
        EntityKind::Method => summary.methods_modified += 1,
        EntityKind::Dependency => {}
    }
}

fn bump_removed(kind: EntityKind, summary: &mut DiffSummary) {
    match kind {
        EntityKind::Module => summary.modules_removed += 1,
        EntityKind::Class => summary.classes_removed += 1,
        EntityKind::Function => summary.functions_removed += 1,
        EntityKind::Method => summary.methods_removed += 1,
        EntityKind::Dependency => {}
    }
}

/// Classifies a field-level modification as breaking or not (SPEC_FULL.md
/// §4.9: "breaking when it removes a previously-exported symbol, removes a
/// parameter, or tightens a return type").
fn classify_modification(kind: EntityKind, old: &crate::model::Node, new: &crate::model::Node) -> (bool, String) {
    match kind {
        EntityKind::Class => {
            let old_bases: std::collections::HashSet<_> = old.properties.bases.iter().collect();
            let new_bases: std::collections::HashSet<_> = new.properties.bases.iter().collect();
            if old_bases != new_bases {
                return (true, format!("base classes changed: {:?} -> {:?}", old.properties.bases, new.properties.bases));
            }
            (false, "class body changed".to_string())
        }
        EntityKind::Function | EntityKind::Method => {
            let old_params: Vec<&str> = old.properties.parameters.iter().map(|p| p.name.as_str()).collect();
            let new_params: Vec<&str> = new.properties.parameters.iter().map(|p| p.name.as_str()).collect();
            let removed_params: Vec<&&str> = old_params.iter().filter(|p| !new_params.contains(p)).collect();
            let added_params: Vec<&&str> = new_params.iter().filter(|p| !old_params.contains(p)).collect();

            if !removed_params.is_empty() {
                return (true, format!("parameter(s) removed: {removed_params:?}"));
            }

            if let (Some(old_ret), Some(new_ret)) = (&old.properties.return_type, &new.properties.return_type) {
                if old_ret != new_ret && is_tightened(old_ret, new_ret) {
                    return (true, format!("return type tightened: {old_ret} -> {new_ret}"));
                }
            }

            if !added_params.is_empty() {
                return (false, format!("parameter(s) added: {added_params:?}"));
            }
            (false, "implementation changed".to_string())
        }
        EntityKind::Module => (false, "module contents changed".to_string()),
        EntityKind::Dependency => (false, String::new()),
    }
}

/// `Optional[T]` / `T | None` widening to a bare `T` is a tightening; the
/// reverse is a widening. Anything else is treated conservatively as not
/// tightened (unknown type systems shouldn't false-positive as breaking).
fn is_tightened(old: &str, new: &str) -> bool {
    let old_optional = old.contains("Optional") || old.contains("| None") || old.contains("None |") || old.ends_with('?');
    let new_optional = new.contains("Optional") || new.contains("| None") || new.contains("None |") || new.ends_with('?');
    old_optional && !new_optional
}

impl SemanticDiff {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# Diff: {} -> {}\n\n", self.base_ref, self.target_ref));
        if !self.has_changes {
            out.push_str("No changes.\n");
            return out;
        }
        if self.has_breaking_changes {
            out.push_str("**Contains breaking changes.**\n\n");
        }
        for change in &self.changes {
            let marker = if change.is_breaking { "!" } else { "-" };
            out.push_str(&format!(
                "{marker} [{:?}] {} {:?}: {}\n",
                change.entity_type, change.entity_name, change.change_type, change.details
            ));
        }
        out
    }

    pub fn to_terminal(&self) -> String {
        use colored::Colorize;
        let mut out = String::new();
        if !self.has_changes {
            out.push_str(&"No changes.\n".dimmed().to_string());
            return out;
        }
        for change in &self.changes {
            let line = format!("[{:?}] {} {:?}: {}", change.entity_type, change.entity_name, change.change_type, change.details);
            out.push_str(&if change.is_breaking { line.red().bold().to_string() } else { line.normal().to_string() });
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeKind, Node, NodeKind, Parameter};

    fn class_with_method(graph: &mut CodeGraph, method_count: usize) -> (String, String) {
        let class = graph.add_node(Node::new(NodeKind::Class, "Foo", "Foo", "foo.py", 1, 20));
        let mut method_id = String::new();
        for i in 0..method_count {
            let mut m = Node::new(NodeKind::Method, "bar", format!("Foo.bar{i}"), "foo.py", 2, 5);
            m.properties.parameters.push(Parameter { name: "self".to_string(), param_type: None, default_value: None });
            method_id = graph.add_node(m);
            graph.add_edge(Edge::new(class.clone(), method_id.clone(), EdgeKind::Contains)).unwrap();
        }
        (class, method_id)
    }

    #[test]
    fn removed_method_is_breaking() {
        let mut base = CodeGraph::new("/repo".into());
        class_with_method(&mut base, 1);
        let target = CodeGraph::new("/repo".into());

        let diff = diff_graphs("S1", "S2", &base, &target);
        assert!(diff.has_breaking_changes);
        assert_eq!(diff.summary.classes_removed, 1);
        assert_eq!(diff.summary.methods_removed, 1);
        assert!(diff.changes.iter().any(|c| c.entity_type == EntityKind::Method && c.is_breaking));
    }

    #[test]
    fn removed_parameter_is_breaking() {
        let mut base = CodeGraph::new("/repo".into());
        let f = Node::new(NodeKind::Function, "f", "f", "a.py", 1, 3);
        let mut f = f;
        f.properties.parameters.push(Parameter { name: "x".to_string(), param_type: None, default_value: None });
        base.add_node(f.clone());

        let mut target = CodeGraph::new("/repo".into());
        let mut f2 = f.clone();
        f2.properties.parameters.clear();
        target.add_node(f2);

        let diff = diff_graphs("S1", "S2", &base, &target);
        assert!(diff.has_breaking_changes);
        assert_eq!(diff.summary.functions_modified, 1);
    }
}
