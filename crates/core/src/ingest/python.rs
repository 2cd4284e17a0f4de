//! Python parser adapter (tree-sitter-python), one of three representative
//! [`LanguageParser`] implementations (SPEC_FULL.md §4.2, §9).

use tree_sitter::{Node as TsNode, Parser, Tree};

use super::{ClassDef, FunctionDef, ImportDef, LanguageParser, ModuleDef, ParamDef, ParseError};
use std::path::Path;

const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "boolean_operator",
    "conditional_expression",
    "match_statement",
];

pub struct PythonParser {
    language: tree_sitter::Language,
}

impl Default for PythonParser {
    fn default() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }
}

impl PythonParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_tree(&self, source: &str) -> Result<Tree, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| e.to_string())?;
        parser
            .parse(source, None)
            .ok_or_else(|| "tree-sitter returned no tree".to_string())
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

    fn extract_params(&self, func_node: &TsNode, source: &str) -> Vec<ParamDef> {
        let Some(params_node) = func_node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut cursor = params_node.walk();
        for child in params_node.children(&mut cursor) {
            match child.kind() {
                "identifier" => out.push(ParamDef {
                    name: text(&child, source),
                    ..Default::default()
                }),
                "typed_parameter" => {
                    let name = child
                        .child(0)
                        .map(|n| text(&n, source))
                        .unwrap_or_default();
                    let param_type = child
                        .child_by_field_name("type")
                        .map(|n| text(&n, source));
                    out.push(ParamDef {
                        name,
                        param_type,
                        default_value: None,
                    });
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| text(&n, source))
                        .unwrap_or_default();
                    let param_type = child
                        .child_by_field_name("type")
                        .map(|n| text(&n, source));
                    let default_value = child
                        .child_by_field_name("value")
                        .map(|n| text(&n, source));
                    out.push(ParamDef {
                        name,
                        param_type,
                        default_value,
                    });
                }
                _ => {}
            }
        }
        out
    }

    fn extract_calls(&self, body: &TsNode, source: &str) -> Vec<String> {
        let mut calls = Vec::new();
        let mut cursor = body.walk();
        let mut stack = vec![*body];
        while let Some(n) = stack.pop() {
            if n.kind() == "call" {
                if let Some(func) = n.child_by_field_name("function") {
                    let name = match func.kind() {
                        "identifier" => Some(text(&func, source)),
                        "attribute" => func
                            .child_by_field_name("attribute")
                            .map(|a| text(&a, source)),
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

    fn decorators_of(&self, maybe_decorated: &TsNode, source: &str) -> Vec<String> {
        if maybe_decorated.kind() != "decorated_definition" {
            return Vec::new();
        }
        let mut cursor = maybe_decorated.walk();
        maybe_decorated
            .children(&mut cursor)
            .filter(|c| c.kind() == "decorator")
            .map(|c| text(&c, source).trim_start_matches('@').to_string())
            .collect()
    }

    fn extract_function(&self, def: &TsNode, decorators: Vec<String>, source: &str, is_method: bool) -> Option<FunctionDef> {
        let name = text(&def.child_by_field_name("name")?, source);
        let is_async = def
            .child(0)
            .map(|c| c.kind() == "async")
            .unwrap_or(false)
            || source[def.byte_range()].trim_start().starts_with("async");
        let return_type = def.child_by_field_name("return_type").map(|n| text(&n, source));
        let parameters = self.extract_params(def, source);
        let calls = def
            .child_by_field_name("body")
            .map(|b| self.extract_calls(&b, source))
            .unwrap_or_default();
        Some(FunctionDef {
            name,
            qualified_name: String::new(), // filled by caller with owner prefix
            parameters,
            return_type,
            decorators,
            is_async,
            is_method,
            calls,
            line_start: def.start_position().row as u32 + 1,
            line_end: def.end_position().row as u32 + 1,
            complexity: self.complexity(def),
        })
    }

    fn extract_class(&self, def: &TsNode, decorators: Vec<String>, source: &str) -> Option<ClassDef> {
        let name = text(&def.child_by_field_name("name")?, source);
        let mut bases = Vec::new();
        if let Some(superclasses) = def.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for child in superclasses.children(&mut cursor) {
                if matches!(child.kind(), "identifier" | "attribute") {
                    bases.push(text(&child, source));
                }
            }
        }

        let mut methods = Vec::new();
        let mut attributes = Vec::new();
        if let Some(body) = def.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                match child.kind() {
                    "function_definition" => {
                        if let Some(mut f) = self.extract_function(&child, Vec::new(), source, true) {
                            f.qualified_name = format!("{name}.{}", f.name);
                            methods.push(f);
                        }
                    }
                    "decorated_definition" => {
                        if let Some(inner) = child.child_by_field_name("definition") {
                            if inner.kind() == "function_definition" {
                                let decs = self.decorators_of(&child, source);
                                if let Some(mut f) = self.extract_function(&inner, decs, source, true) {
                                    f.qualified_name = format!("{name}.{}", f.name);
                                    methods.push(f);
                                }
                            }
                        }
                    }
                    "expression_statement" => {
                        if let Some(field) = self.extract_self_field(&child, source) {
                            attributes.push(field);
                        }
                    }
                    _ => {}
                }
            }
        }

        Some(ClassDef {
            name: name.clone(),
            qualified_name: name,
            bases,
            decorators,
            attributes,
            methods,
            line_start: def.start_position().row as u32 + 1,
            line_end: def.end_position().row as u32 + 1,
        })
    }

    fn extract_self_field(&self, stmt: &TsNode, source: &str) -> Option<String> {
        let mut cursor = stmt.walk();
        for child in stmt.children(&mut cursor) {
            if child.kind() == "assignment" {
                let left = child.child_by_field_name("left")?;
                if left.kind() == "attribute" {
                    let t = text(&left, source);
                    if let Some(field) = t.strip_prefix("self.") {
                        return Some(field.to_string());
                    }
                }
            }
        }
        None
    }

    fn extract_import(&self, stmt: &TsNode, source: &str) -> Vec<ImportDef> {
        let line = stmt.start_position().row as u32 + 1;
        match stmt.kind() {
            "import_statement" => {
                let mut out = Vec::new();
                let mut cursor = stmt.walk();
                for child in stmt.children(&mut cursor) {
                    if matches!(child.kind(), "dotted_name" | "aliased_import") {
                        let module = text(&child, source);
                        out.push(ImportDef {
                            module,
                            names: Vec::new(),
                            alias: None,
                            is_dynamic: false,
                            line,
                        });
                    }
                }
                out
            }
            "import_from_statement" => {
                let Some(module_node) = stmt.child_by_field_name("module_name") else {
                    return Vec::new();
                };
                let module = text(&module_node, source);
                let mut names = Vec::new();
                let mut cursor = stmt.walk();
                for child in stmt.children(&mut cursor) {
                    if matches!(child.kind(), "dotted_name" | "identifier") && child.byte_range() != module_node.byte_range() {
                        names.push(text(&child, source));
                    } else if child.kind() == "wildcard_import" {
                        names.push("*".to_string());
                    }
                }
                vec![ImportDef {
                    module,
                    names,
                    alias: None,
                    is_dynamic: false,
                    line,
                }]
            }
            _ => Vec::new(),
        }
    }
}

fn text(node: &TsNode, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or_default().to_string()
}

impl LanguageParser for PythonParser {
    fn language_name(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &[".py", ".pyi"]
    }

    fn parse(&self, _path: &Path, source: &str) -> Result<ModuleDef, ParseError> {
        let tree = self.parse_tree(source).map_err(|message| ParseError {
            path: _path.to_path_buf(),
            message,
        })?;
        let root = tree.root_node();
        let mut module = ModuleDef::default();
        let mut cursor = root.walk();

        for child in root.children(&mut cursor) {
            match child.kind() {
                "function_definition" => {
                    if let Some(mut f) = self.extract_function(&child, Vec::new(), source, false) {
                        f.qualified_name = f.name.clone();
                        module.functions.push(f);
                    }
                }
                "class_definition" => {
                    if let Some(c) = self.extract_class(&child, Vec::new(), source) {
                        module.classes.push(c);
                    }
                }
                "decorated_definition" => {
                    let decs = self.decorators_of(&child, source);
                    if let Some(inner) = child.child_by_field_name("definition") {
                        match inner.kind() {
                            "function_definition" => {
                                if let Some(mut f) = self.extract_function(&inner, decs, source, false) {
                                    f.qualified_name = f.name.clone();
                                    module.functions.push(f);
                                }
                            }
                            "class_definition" => {
                                if let Some(c) = self.extract_class(&inner, decs, source) {
                                    module.classes.push(c);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                "import_statement" | "import_from_statement" => {
                    module.imports.extend(self.extract_import(&child, source));
                }
                _ => {}
            }
        }

        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_class_function_and_import() {
        let source = r#"
import os
from .utils import helper

class Greeter:
    def __init__(self, name):
        self.name = name

    def greet(self):
        if self.name:
            return helper(self.name)
        return "hi"

def standalone():
    pass
"#;
        let parser = PythonParser::new();
        let module = parser.parse(Path::new("greeter.py"), source).unwrap();
        assert_eq!(module.imports.len(), 2);
        assert_eq!(module.classes.len(), 1);
        assert_eq!(module.classes[0].methods.len(), 2);
        assert_eq!(module.functions.len(), 1);
        let greet = &module.classes[0].methods[1];
        assert_eq!(greet.name, "greet");
        assert!(greet.complexity >= 2);
        assert_eq!(greet.calls, vec!["helper".to_string()]);
    }
}
