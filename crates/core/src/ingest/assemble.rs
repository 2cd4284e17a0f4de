//! `assemble(modules)` — turns parsed modules into graph nodes and edges:
//! resolves imports to internal paths or external package roots, and derives
//! `contains`/`imports`/`calls`/`inherits` edges (SPEC_FULL.md §4.2).

use std::collections::HashMap;

use super::{ClassDef, FunctionDef, ModuleDef};
use crate::model::{Edge, EdgeKind, EdgeProperties, Node, NodeKind, Parameter, Properties};

/// Resolve a module specifier to a repo-relative path, given the importing
/// file's own path and the set of module paths present in this build.
/// Returns `None` when the import is external (a package root) or can't be
/// statically resolved.
fn resolve_import_path(
    language: &str,
    importing_file: &str,
    specifier: &str,
    known_paths: &HashMap<String, ()>,
) -> Option<String> {
    match language {
        "python" => {
            if !specifier.starts_with('.') {
                // Absolute import: try treating it as a repo-relative module
                // path (dotted -> slashes) before giving up to "external".
                let candidate = specifier.replace('.', "/") + ".py";
                return known_paths.contains_key(&candidate).then_some(candidate);
            }
            let dir = std::path::Path::new(importing_file)
                .parent()
                .unwrap_or_else(|| std::path::Path::new(""));
            let dots = specifier.chars().take_while(|&c| c == '.').count();
            let mut base = dir.to_path_buf();
            for _ in 1..dots {
                base = base.parent().unwrap_or(&base).to_path_buf();
            }
            let rest = specifier.trim_start_matches('.');
            let candidate = if rest.is_empty() {
                base.join("__init__.py")
            } else {
                base.join(format!("{}.py", rest.replace('.', "/")))
            };
            let candidate = candidate.to_string_lossy().replace('\\', "/");
            known_paths.contains_key(&candidate).then_some(candidate)
        }
        "rust" => {
            if specifier.starts_with("crate::") || specifier.starts_with("self::") || specifier.starts_with("super::") {
                let rest = specifier
                    .trim_start_matches("crate::")
                    .trim_start_matches("self::")
                    .trim_start_matches("super::");
                let candidate = format!("src/{}.rs", rest.replace("::", "/"));
                known_paths.contains_key(&candidate).then_some(candidate)
            } else {
                None
            }
        }
        "typescript" => {
            if specifier.starts_with('.') {
                let dir = std::path::Path::new(importing_file)
                    .parent()
                    .unwrap_or_else(|| std::path::Path::new(""));
                let joined = dir.join(specifier);
                for ext in [".ts", ".tsx", "/index.ts", ".js"] {
                    let candidate = format!("{}{}", joined.to_string_lossy().replace('\\', "/"), ext);
                    if known_paths.contains_key(&candidate) {
                        return Some(candidate);
                    }
                }
                None
            } else {
                None
            }
        }
        _ => None,
    }
}

fn function_properties(f: &FunctionDef) -> Properties {
    Properties {
        parameters: f
            .parameters
            .iter()
            .map(|p| Parameter {
                name: p.name.clone(),
                param_type: p.param_type.clone(),
                default_value: p.default_value.clone(),
            })
            .collect(),
        return_type: f.return_type.clone(),
        decorators: f.decorators.clone(),
        is_async: f.is_async,
        is_method: f.is_method,
        http_method: http_decorator_method(&f.decorators),
        http_path: http_decorator_path(&f.decorators),
        ..Default::default()
    }
}

/// Recognises the common `@app.get("/path")`-style decorator shapes used by
/// the OMEGA `(api ...)` form (SPEC_FULL.md §6).
fn http_decorator_method(decorators: &[String]) -> Option<String> {
    const METHODS: &[&str] = &["get", "post", "put", "delete", "patch"];
    decorators.iter().find_map(|d| {
        let lower = d.to_ascii_lowercase();
        METHODS
            .iter()
            .find(|m| lower.contains(&format!(".{m}(")))
            .map(|m| m.to_ascii_uppercase())
    })
}

fn http_decorator_path(decorators: &[String]) -> Option<String> {
    decorators.iter().find_map(|d| {
        let start = d.find('"')?;
        let rest = &d[start + 1..];
        let end = rest.find('"')?;
        Some(rest[..end].to_string())
    })
}

fn add_function_node(
    nodes: &mut Vec<Node>,
    edges: &mut Vec<Edge>,
    parent_id: &str,
    file_path: &str,
    qualifier_prefix: &str,
    f: &FunctionDef,
) -> String {
    let kind = if f.is_method {
        NodeKind::Method
    } else {
        NodeKind::Function
    };
    let qualified_name = if qualifier_prefix.is_empty() {
        f.name.clone()
    } else {
        format!("{qualifier_prefix}.{}", f.name)
    };
    let mut node = Node::new(kind, &f.name, &qualified_name, file_path, f.line_start, f.line_end);
    node.complexity = f.complexity;
    node.properties = function_properties(f);
    let id = node.id.clone();
    nodes.push(node);
    edges.push(Edge::new(parent_id, &id, EdgeKind::Contains));
    id
}

/// Build `(nodes, edges)` from a fully-reduced set of parsed modules.
///
/// Pass 1 creates every module/class/function/method node (needed before
/// pass 2 can resolve call targets against the full symbol table). Pass 2
/// derives `imports`, `calls`, and `inherits` edges.
pub fn assemble(modules: &[ModuleDef]) -> (Vec<Node>, Vec<Edge>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    let known_paths: HashMap<String, ()> = modules.iter().map(|m| (m.path.clone(), ())).collect();

    // symbol name -> (module path, node id), last-write-wins per name; used
    // for best-effort same-module and same-package call resolution.
    let mut symbols_by_name: HashMap<String, Vec<String>> = HashMap::new();
    // (module path, qualified name) -> node id, for inherits resolution.
    let mut class_by_qname: HashMap<(String, String), String> = HashMap::new();

    for module in modules {
        let module_node = Node::new(
            NodeKind::Module,
            module_name(&module.path),
            &module.path,
            &module.path,
            1,
            module.line_count.max(1),
        );
        let module_id = module_node.id.clone();
        nodes.push(module_node);

        for class in &module.classes {
            let mut class_node = Node::new(
                NodeKind::Class,
                &class.name,
                &class.qualified_name,
                &module.path,
                class.line_start,
                class.line_end,
            );
            class_node.properties.bases = class.bases.clone();
            class_node.properties.decorators = class.decorators.clone();
            class_node.properties.attributes = class.attributes.clone();
            let class_id = class_node.id.clone();
            nodes.push(class_node);
            edges.push(Edge::new(&module_id, &class_id, EdgeKind::Contains));
            class_by_qname.insert((module.path.clone(), class.qualified_name.clone()), class_id.clone());

            for method in &class.methods {
                let id = add_function_node(&mut nodes, &mut edges, &class_id, &module.path, &class.name, method);
                symbols_by_name.entry(method.name.clone()).or_default().push(id);
            }
        }

        for func in &module.functions {
            let id = add_function_node(&mut nodes, &mut edges, &module_id, &module.path, "", func);
            symbols_by_name.entry(func.name.clone()).or_default().push(id);
        }
    }

    for module in modules {
        for import in &module.imports {
            let resolved = if import.is_dynamic {
                None
            } else {
                resolve_import_path(&module.language, &module.path, &import.module, &known_paths)
            };
            let target_id = match &resolved {
                Some(path) => Node::make_id(NodeKind::Module, path, ""),
                None => {
                    let external_id = Node::make_id(NodeKind::External, &import.module, "");
                    if !nodes.iter().any(|n| n.id == external_id) {
                        nodes.push(Node::new(
                            NodeKind::External,
                            &import.module,
                            &import.module,
                            &import.module,
                            0,
                            0,
                        ));
                    }
                    external_id
                }
            };
            let source_id = Node::make_id(NodeKind::Module, &module.path, "");
            let mut edge = Edge::new(&source_id, &target_id, EdgeKind::Imports);
            edge.properties.dynamic = import.is_dynamic;
            edge.properties.alias = import.alias.clone();
            edge.properties.line = Some(import.line);
            if import.is_dynamic {
                edge.properties.source_expression = Some(import.module.clone());
            }
            edges.push(edge);
        }

        for class in &module.classes {
            for base in &class.bases {
                if let Some(target) = class_by_qname
                    .get(&(module.path.clone(), base.clone()))
                    .or_else(|| {
                        class_by_qname
                            .iter()
                            .find(|((_, qn), _)| qn == base)
                            .map(|(_, id)| id)
                    })
                {
                    let source_id = Node::make_id(NodeKind::Class, &module.path, &class.qualified_name);
                    edges.push(Edge::new(&source_id, target, EdgeKind::Inherits));
                }
            }
        }

        for (caller, owner_qualifier) in module
            .functions
            .iter()
            .map(|f| (f, String::new()))
            .chain(module.classes.iter().flat_map(|c| {
                c.methods.iter().map(move |m| (m, c.name.clone()))
            }))
        {
            let caller_qname = if owner_qualifier.is_empty() {
                caller.name.clone()
            } else {
                format!("{owner_qualifier}.{}", caller.name)
            };
            let caller_kind = if caller.is_method { NodeKind::Method } else { NodeKind::Function };
            let caller_id = Node::make_id(caller_kind, &module.path, &caller_qname);

            for callee_name in &caller.calls {
                if let Some(candidates) = symbols_by_name.get(callee_name) {
                    for target_id in candidates {
                        edges.push(Edge::new(&caller_id, target_id, EdgeKind::Calls));
                    }
                }
            }
        }
    }

    (nodes, edges)
}

fn module_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ImportDef;

    #[test]
    fn assembles_contains_and_imports_edges() {
        let mod_a = ModuleDef {
            path: "src/mod_a.py".into(),
            language: "python".into(),
            imports: vec![ImportDef {
                module: ".mod_b".into(),
                ..Default::default()
            }],
            functions: vec![FunctionDef {
                name: "run".into(),
                qualified_name: "run".into(),
                ..Default::default()
            }],
            line_count: 10,
            ..Default::default()
        };
        let mod_b = ModuleDef {
            path: "src/mod_b.py".into(),
            language: "python".into(),
            line_count: 5,
            ..Default::default()
        };

        let (nodes, edges) = assemble(&[mod_a, mod_b]);
        assert_eq!(nodes.len(), 3); // 2 modules + 1 function
        let import_edge = edges.iter().find(|e| e.kind == EdgeKind::Imports).unwrap();
        assert_eq!(import_edge.target_id, Node::make_id(NodeKind::Module, "src/mod_b.py", ""));
    }

    #[test]
    fn unresolvable_import_becomes_external_node() {
        let module = ModuleDef {
            path: "src/a.py".into(),
            language: "python".into(),
            imports: vec![ImportDef {
                module: "numpy".into(),
                ..Default::default()
            }],
            line_count: 1,
            ..Default::default()
        };
        let (nodes, edges) = assemble(&[module]);
        assert!(nodes.iter().any(|n| n.kind == NodeKind::External && n.name == "numpy"));
        assert_eq!(edges.len(), 1);
    }
}
