//! Rust parser adapter (tree-sitter-rust), one of three representative
//! [`LanguageParser`] implementations (SPEC_FULL.md §4.2, §9). Named
//! `rust_lang` to avoid clashing with the `rust` keyword-ish module name.

use tree_sitter::{Node as TsNode, Parser, Tree};

use super::{ClassDef, FunctionDef, ImportDef, LanguageParser, ModuleDef, ParamDef, ParseError};
use std::path::Path;

const DECISION_KINDS: &[&str] = &[
    "if_expression",
    "else_clause",
    "for_expression",
    "while_expression",
    "match_arm",
    "loop_expression",
    "binary_expression",
];

pub struct RustParser {
    language: tree_sitter::Language,
}

impl Default for RustParser {
    fn default() -> Self {
        Self {
            language: tree_sitter_rust::LANGUAGE.into(),
        }
    }
}

impl RustParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn complexity(&self, node: &TsNode) -> u32 {
        let mut count = 1;
        let mut cursor = node.walk();
        let mut stack = vec![*node];
        while let Some(n) = stack.pop() {
            if DECISION_KINDS.contains(&n.kind()) {
                count += 1;
            }
            for child in n.children(&mut cursor) {
                stack.push(child);
            }
        }
        count
    }

    fn extract_params(&self, fn_node: &TsNode, source: &str) -> Vec<ParamDef> {
        let Some(params) = fn_node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut cursor = params.walk();
        for child in params.children(&mut cursor) {
            if child.kind() == "parameter" {
                let name = child
                    .child_by_field_name("pattern")
                    .map(|n| text(&n, source))
                    .unwrap_or_default();
                let param_type = child.child_by_field_name("type").map(|n| text(&n, source));
                out.push(ParamDef {
                    name,
                    param_type,
                    default_value: None,
                });
            } else if child.kind() == "self_parameter" {
                out.push(ParamDef {
                    name: "self".into(),
                    ..Default::default()
                });
            }
        }
        out
    }

    fn extract_calls(&self, body: &TsNode, source: &str) -> Vec<String> {
        let mut calls = Vec::new();
        let mut cursor = body.walk();
        let mut stack = vec![*body];
        while let Some(n) = stack.pop() {
            if n.kind() == "call_expression" {
                if let Some(func) = n.child_by_field_name("function") {
                    let name = match func.kind() {
                        "identifier" => Some(text(&func, source)),
                        "field_expression" => func
                            .child_by_field_name("field")
                            .map(|f| text(&f, source)),
                        "scoped_identifier" => func
                            .child_by_field_name("name")
                            .map(|f| text(&f, source)),
                        _ => None,
                    };
                    if let Some(name) = name {
                        calls.push(name);
                    }
                }
            }
            for child in n.children(&mut cursor) {
                stack.push(child);
            }
        }
        calls
    }

    fn attributes_of(&self, item: &TsNode, source: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut sibling = item.prev_sibling();
        while let Some(s) = sibling {
            if s.kind() == "attribute_item" {
                out.push(text(&s, source));
                sibling = s.prev_sibling();
            } else {
                break;
            }
        }
        out.reverse();
        out
    }

    fn extract_function(&self, node: &TsNode, source: &str, is_method: bool) -> Option<FunctionDef> {
        let name = text(&node.child_by_field_name("name")?, source);
        let mut async_cursor = node.walk();
        let is_async = node.children(&mut async_cursor).any(|c| c.kind() == "async");
        let return_type = node
            .child_by_field_name("return_type")
            .map(|n| text(&n, source));
        let parameters = self.extract_params(node, source);
        let calls = node
            .child_by_field_name("body")
            .map(|b| self.extract_calls(&b, source))
            .unwrap_or_default();
        Some(FunctionDef {
            name,
            qualified_name: String::new(),
            parameters,
            return_type,
            decorators: self.attributes_of(node, source),
            is_async,
            is_method,
            calls,
            line_start: node.start_position().row as u32 + 1,
            line_end: node.end_position().row as u32 + 1,
            complexity: self.complexity(node),
        })
    }

    fn extract_impl(&self, node: &TsNode, source: &str) -> Option<(String, Vec<FunctionDef>, Vec<String>)> {
        let type_node = node.child_by_field_name("type")?;
        let type_name = text(&type_node, source);
        let trait_impl = node.child_by_field_name("trait").map(|t| text(&t, source));

        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                if child.kind() == "function_item" {
                    if let Some(mut f) = self.extract_function(&child, source, true) {
                        f.qualified_name = format!("{type_name}.{}", f.name);
                        methods.push(f);
                    }
                }
            }
        }
        Some((type_name, methods, trait_impl.into_iter().collect()))
    }

    fn extract_struct_fields(&self, node: &TsNode, source: &str) -> Vec<String> {
        let Some(body) = node.child_by_field_name("body") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            if child.kind() == "field_declaration" {
                if let Some(name) = child.child_by_field_name("name") {
                    out.push(text(&name, source));
                }
            }
        }
        out
    }

    fn extract_use(&self, node: &TsNode, source: &str) -> Vec<ImportDef> {
        let line = node.start_position().row as u32 + 1;
        let Some(tree_node) = node.child_by_field_name("argument") else {
            return Vec::new();
        };
        let path = text(&tree_node, source);
        vec![ImportDef {
            module: path.replace(' ', ""),
            names: Vec::new(),
            alias: None,
            is_dynamic: false,
            line,
        }]
    }
}

fn text(node: &TsNode, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or_default().to_string()
}

impl LanguageParser for RustParser {
    fn language_name(&self) -> &'static str {
        "rust"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &[".rs"]
    }

    fn parse(&self, path: &Path, source: &str) -> Result<ModuleDef, ParseError> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).map_err(|e| ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let tree: Tree = parser.parse(source, None).ok_or_else(|| ParseError {
            path: path.to_path_buf(),
            message: "tree-sitter returned no tree".to_string(),
        })?;

        let root = tree.root_node();
        let mut module = ModuleDef::default();
        let mut classes_by_name = std::collections::HashMap::<String, ClassDef>::new();
        let mut cursor = root.walk();

        for child in root.children(&mut cursor) {
            match child.kind() {
                "function_item" => {
                    if let Some(mut f) = self.extract_function(&child, source, false) {
                        f.qualified_name = f.name.clone();
                        module.functions.push(f);
                    }
                }
                "struct_item" | "enum_item" | "trait_item" => {
                    if let Some(name_node) = child.child_by_field_name("name") {
                        let name = text(&name_node, source);
                        let attributes = if child.kind() == "struct_item" {
                            self.extract_struct_fields(&child, source)
                        } else {
                            Vec::new()
                        };
                        classes_by_name.entry(name.clone()).or_insert_with(|| ClassDef {
                            name: name.clone(),
                            qualified_name: name,
                            attributes,
                            decorators: self.attributes_of(&child, source),
                            line_start: child.start_position().row as u32 + 1,
                            line_end: child.end_position().row as u32 + 1,
                            ..Default::default()
                        });
                    }
                }
                "impl_item" => {
                    if let Some((type_name, methods, traits)) = self.extract_impl(&child, source) {
                        let entry = classes_by_name.entry(type_name.clone()).or_insert_with(|| ClassDef {
                            name: type_name.clone(),
                            qualified_name: type_name,
                            line_start: child.start_position().row as u32 + 1,
                            line_end: child.end_position().row as u32 + 1,
                            ..Default::default()
                        });
                        entry.bases.extend(traits);
                        entry.methods.extend(methods);
                    }
                }
                "use_declaration" => {
                    module.imports.extend(self.extract_use(&child, source));
                }
                _ => {}
            }
        }

        module.classes = classes_by_name.into_values().collect();
        module.classes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_struct_and_impl_into_one_class() {
        let source = r#"
use crate::model::Node;

pub struct Widget {
    pub id: String,
}

impl Widget {
    pub fn new(id: String) -> Self {
        Self { id }
    }

    pub fn render(&self) -> String {
        if self.id.is_empty() {
            String::new()
        } else {
            self.id.clone()
        }
    }
}
"#;
        let parser = RustParser::new();
        let module = parser.parse(Path::new("widget.rs"), source).unwrap();
        assert_eq!(module.classes.len(), 1);
        assert_eq!(module.classes[0].methods.len(), 2);
        assert_eq!(module.imports.len(), 1);
        assert_eq!(module.imports[0].module, "crate::model::Node");
    }
}
