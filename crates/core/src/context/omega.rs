//! OMEGA emission — fixed-schema, position-sensitive S-expressions
//! (SPEC_FULL.md §4.6 step 4, §6 "OMEGA output schema (wire-level)").
//! Grounded on `original_source/src/mu/kernel/context/omega.py`'s Schema
//! v2.0 body generator (`_generate_body`/`_class_to_schema_v2`/
//! `_method_to_schema_v2`/`_function_to_schema_v2`), reworked from Python
//! string formatting into deterministic Rust rendering so repeated calls
//! over the same node set are byte-identical (§9 testable property 7).

use std::collections::{BTreeMap, HashSet};

use crate::model::{CodeGraph, Node, NodeKind};

use super::budget::count_tokens;

/// Schema header emitted exactly once, ahead of the body (§6). Kept as a
/// single constant so prompt-cache-sensitive callers can treat it as a
/// stable prefix across calls.
pub const OMEGA_SCHEMA_HEADER: &str = concat!(
    ";; OMEGA schema v2.0 — positional S-expressions, read by arity, not keyword\n",
    ";; (module Name \"path\" ...children)\n",
    ";; (class Name Parent [attr ...] ...methods)\n",
    ";; (method Name [arg:type ...] ReturnType Complexity)\n",
    ";; (function Name [arg:type ...] ReturnType Complexity)\n",
    ";; (service Name [_dep ...] ...methods)\n",
    ";; (model Name [field:type ...])\n",
    ";; (api HTTP_VERB \"/path\" Handler [arg:type ...])\n",
    ";; unknown fields render as nil",
);

/// Manifest line preceding the body when a commit is known (§6, §9).
#[derive(Debug, Clone, Default)]
pub struct OmegaManifest {
    pub version: String,
    pub codebase: String,
    pub commit: String,
}

impl OmegaManifest {
    pub fn new(codebase: impl Into<String>, commit: Option<&str>) -> Self {
        Self {
            version: "1.0".to_string(),
            codebase: codebase.into(),
            commit: commit.map(|c| c.chars().take(7).collect()).unwrap_or_default(),
        }
    }

    pub fn to_sexpr(&self) -> String {
        let mut s = format!("(mu-lisp :version \"{}\"", self.version);
        if !self.codebase.is_empty() {
            s.push_str(&format!(" :codebase \"{}\"", self.codebase));
        }
        if !self.commit.is_empty() {
            s.push_str(&format!(" :commit \"{}\"", self.commit));
        }
        s.push(')');
        s
    }
}

/// Result of OMEGA emission: the rendered text plus the token accounting
/// SPEC_FULL.md §9 says must ride alongside it (`tokens_used`,
/// `tokens_saved`, `compression_ratio`, `savings_percent`).
#[derive(Debug, Clone)]
pub struct OmegaResult {
    pub manifest: Option<OmegaManifest>,
    pub body: String,
    pub nodes_included: usize,
    pub tokens_used: usize,
    /// Token count of a naive textual dump of the same nodes, for
    /// compression-ratio reporting.
    pub naive_tokens: usize,
}

impl OmegaResult {
    /// Complete output ready for LLM consumption: header, optional
    /// manifest, then body.
    pub fn full_output(&self) -> String {
        let mut parts = vec![OMEGA_SCHEMA_HEADER.to_string()];
        if let Some(manifest) = &self.manifest {
            parts.push(manifest.to_sexpr());
        }
        parts.push(self.body.clone());
        parts.join("\n\n")
    }

    pub fn compression_ratio(&self) -> f64 {
        if self.tokens_used == 0 {
            return 1.0;
        }
        self.naive_tokens as f64 / self.tokens_used as f64
    }

    pub fn tokens_saved(&self) -> usize {
        self.naive_tokens.saturating_sub(self.tokens_used)
    }

    pub fn savings_percent(&self) -> f64 {
        if self.naive_tokens == 0 {
            return 0.0;
        }
        (self.tokens_saved() as f64 / self.naive_tokens as f64) * 100.0
    }
}

/// Render `nodes` as an OMEGA body and wrap it with the schema header (and
/// manifest, if `commit` is known). Idempotent: the same `nodes` always
/// renders identically (modules sorted by path, members sorted by name).
pub fn emit(graph: &CodeGraph, nodes: &[Node], codebase: &str, commit: Option<&str>) -> OmegaResult {
    let body = render_body(graph, nodes);
    let naive = naive_dump(nodes);

    OmegaResult {
        manifest: if commit.is_some() || !codebase.is_empty() {
            Some(OmegaManifest::new(codebase, commit))
        } else {
            None
        },
        tokens_used: count_tokens(&body) + count_tokens(OMEGA_SCHEMA_HEADER),
        naive_tokens: count_tokens(&naive),
        nodes_included: nodes.len(),
        body,
    }
}

fn naive_dump(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(|n| format!("{} {} {}:{}-{}", n.kind.as_str(), n.qualified_name, n.file_path, n.line_start, n.line_end))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_body(graph: &CodeGraph, nodes: &[Node]) -> String {
    if nodes.is_empty() {
        return String::new();
    }

    let context_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut output_ids: HashSet<String> = HashSet::new();

    let mut by_module: BTreeMap<String, Vec<&Node>> = BTreeMap::new();
    for node in nodes {
        by_module.entry(node.file_path.clone()).or_default().push(node);
    }

    let mut lines = Vec::new();
    for (file_path, mut module_nodes) in by_module {
        module_nodes.sort_by(|a, b| a.name.cmp(&b.name));
        let module_name = path_to_module_name(&file_path);

        let classes: Vec<&&Node> = module_nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Class && !output_ids.contains(&n.id))
            .collect();
        let functions: Vec<&&Node> = module_nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Function && !n.properties.is_method && !output_ids.contains(&n.id))
            .collect();

        let mut content = Vec::new();
        for class in &classes {
            output_ids.insert(class.id.clone());
            content.push(class_sexpr(graph, class, &context_ids, &mut output_ids));
        }
        for func in &functions {
            if output_ids.insert(func.id.clone()) {
                content.push(format!("  {}", function_sexpr(func)));
            }
        }

        if content.is_empty() {
            lines.push(format!("(module {module_name} \"{file_path}\")"));
        } else {
            lines.push(format!("(module {module_name} \"{file_path}\""));
            lines.extend(content);
            lines.push(")".to_string());
        }
    }

    lines.join("\n")
}

fn class_sexpr(graph: &CodeGraph, node: &Node, context_ids: &HashSet<&str>, output_ids: &mut HashSet<String>) -> String {
    let name = &node.name;
    let name_lower = name.to_lowercase();
    let decorators_lower: Vec<String> = node.properties.decorators.iter().map(|d| d.to_lowercase()).collect();

    let mut methods: Vec<&Node> = graph
        .edges_from(&node.id)
        .into_iter()
        .filter(|(_, e)| e.kind == crate::model::EdgeKind::Contains)
        .filter_map(|(to, _)| graph.node(to))
        .filter(|n| n.kind == NodeKind::Method && context_ids.contains(n.id.as_str()))
        .collect();
    methods.sort_by(|a, b| a.name.cmp(&b.name));
    for m in &methods {
        output_ids.insert(m.id.clone());
    }

    let attrs = format_attrs(&node.properties.attributes);
    let parent = node.properties.bases.first().cloned().unwrap_or_else(|| "nil".to_string());

    if name_lower.ends_with("service") {
        return service_sexpr(name, &attrs, &methods);
    }
    if decorators_lower.iter().any(|d| d.contains("dataclass")) || name_lower.ends_with("model") {
        return model_sexpr(name, &node.properties.attributes);
    }
    if name_lower.ends_with("validator") {
        let rules: Vec<String> = node.properties.attributes.iter().take(5).cloned().collect();
        return format!("  (validator {name} [{}])", rules.join(" "));
    }
    plain_class_sexpr(name, &parent, &attrs, &methods)
}

fn service_sexpr(name: &str, deps: &[String], methods: &[&Node]) -> String {
    let deps_str = deps.join(" ");
    if methods.is_empty() {
        return format!("  (service {name} [{deps_str}])");
    }
    let mut lines = vec![format!("  (service {name} [{deps_str}]")];
    for m in methods {
        lines.push(format!("    {}", method_sexpr(m)));
    }
    lines.push("  )".to_string());
    lines.join("\n")
}

fn model_sexpr(name: &str, attrs: &[String]) -> String {
    format!("  (model {name} [{}])", format_fields(attrs))
}

fn plain_class_sexpr(name: &str, parent: &str, attrs: &[String], methods: &[&Node]) -> String {
    let attrs_str = attrs.join(" ");
    if methods.is_empty() {
        return format!("  (class {name} {parent} [{attrs_str}])");
    }
    let mut lines = vec![format!("  (class {name} {parent} [{attrs_str}]")];
    for m in methods {
        lines.push(format!("    {}", method_sexpr(m)));
    }
    lines.push("  )".to_string());
    lines.join("\n")
}

fn method_sexpr(node: &Node) -> String {
    let return_type = node.properties.return_type.clone().unwrap_or_else(|| "nil".to_string());
    let args = format_params(&node.properties.parameters);
    format!("(method {} [{args}] {return_type} {})", node.name, node.complexity)
}

fn function_sexpr(node: &Node) -> String {
    let return_type = node.properties.return_type.clone().unwrap_or_else(|| "nil".to_string());
    let args = format_params(&node.properties.parameters);

    if let Some(verb) = node.properties.http_method.as_deref() {
        let path = node.properties.http_path.as_deref().unwrap_or("/");
        return format!("(api {} \"{path}\" {} [{args}])", verb.to_uppercase(), node.name);
    }
    format!("(function {} [{args}] {return_type} {})", node.name, node.complexity)
}

fn format_params(params: &[crate::model::Parameter]) -> String {
    params
        .iter()
        .filter(|p| p.name != "self" && p.name != "cls")
        .map(|p| match &p.param_type {
            Some(t) => format!("{}:{}", p.name, t),
            None => p.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_attrs(attrs: &[String]) -> Vec<String> {
    let mut result: Vec<String> = attrs
        .iter()
        .take(10)
        .map(|a| {
            let lower = a.to_lowercase();
            if !a.starts_with('_') && (lower.contains("service") || lower.contains("repo")) {
                format!("_{a}")
            } else {
                a.clone()
            }
        })
        .collect();
    if attrs.len() > 10 {
        result.push(format!("+{}", attrs.len() - 10));
    }
    result
}

fn format_fields(attrs: &[String]) -> String {
    let mut fields: Vec<String> = attrs.iter().take(10).cloned().collect();
    if attrs.len() > 10 {
        fields.push(format!("+{}", attrs.len() - 10));
    }
    fields.join(" ")
}

fn path_to_module_name(path: &str) -> String {
    let mut name = path;
    for prefix in ["src/", "lib/", "app/"] {
        if let Some(stripped) = name.strip_prefix(prefix) {
            name = stripped;
            break;
        }
    }
    let mut name = name.to_string();
    for ext in [".py", ".ts", ".tsx", ".js", ".go", ".java", ".rs", ".cs"] {
        if let Some(stripped) = name.strip_suffix(ext) {
            name = stripped.to_string();
            break;
        }
    }
    let mut name = name.replace(['/', '\\'], ".");
    if let Some(stripped) = name.strip_suffix(".__init__") {
        name = stripped.to_string();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeKind, Properties};
    use std::path::PathBuf;

    fn class_node(name: &str, file: &str) -> Node {
        Node::new(NodeKind::Class, name, name, file, 1, 20)
    }

    #[test]
    fn renders_service_form_for_service_suffixed_class() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let svc = class_node("AuthService", "auth.py");
        graph.add_node(svc.clone());

        let result = emit(&graph, &[svc], "demo", None);
        assert!(result.body.contains("(service AuthService"));
    }

    #[test]
    fn renders_api_form_for_http_decorated_function() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let mut func = Node::new(NodeKind::Function, "get_user", "get_user", "routes.py", 1, 5);
        func.properties = Properties { http_method: Some("get".to_string()), http_path: Some("/users/:id".to_string()), ..Default::default() };
        graph.add_node(func.clone());

        let result = emit(&graph, &[func], "demo", None);
        assert!(result.body.contains("(api GET \"/users/:id\" get_user"));
    }

    #[test]
    fn emission_is_idempotent() {
        let mut graph = CodeGraph::new(PathBuf::from("/repo"));
        let module_node = Node::new(NodeKind::Module, "auth", "auth", "auth.py", 1, 50);
        let svc = class_node("AuthService", "auth.py");
        let method = Node::new(NodeKind::Method, "login", "AuthService.login", "auth.py", 10, 20);
        graph.add_node(module_node.clone());
        graph.add_node(svc.clone());
        graph.add_node(method.clone());
        graph.add_edge(Edge::new(svc.id.clone(), method.id.clone(), EdgeKind::Contains)).unwrap();

        let nodes = vec![svc, method];
        let first = emit(&graph, &nodes, "demo", Some("abcdef1234567890"));
        let second = emit(&graph, &nodes, "demo", Some("abcdef1234567890"));
        assert_eq!(first.full_output(), second.full_output());
        assert!(first.full_output().contains(":commit \"abcdef1\""));
    }

    #[test]
    fn empty_node_set_still_includes_schema_header() {
        let graph = CodeGraph::new(PathBuf::from("/repo"));
        let result = emit(&graph, &[], "demo", None);
        assert!(result.full_output().starts_with(OMEGA_SCHEMA_HEADER));
        assert!(result.body.is_empty());
    }
}
