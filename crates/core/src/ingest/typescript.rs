//! TypeScript/JavaScript parser adapter (tree-sitter-typescript), one of
//! three representative [`LanguageParser`] implementations (SPEC_FULL.md
//! §4.2, §9).

use tree_sitter::{Node as TsNode, Parser, Tree};

use super::{ClassDef, FunctionDef, ImportDef, LanguageParser, ModuleDef, ParamDef, ParseError};
use std::path::Path;

const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "catch_clause",
    "ternary_expression",
    "switch_case",
];

pub struct TypeScriptParser {
    language: tree_sitter::Language,
}

impl Default for TypeScriptParser {
    fn default() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

impl TypeScriptParser {
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
            if n.kind() == "binary_expression" {
                if let Some(op) = n.child_by_field_name("operator") {
                    if matches!(op.kind(), "&&" | "||" | "??") {
                        count += 1;
                    }
                }
            }
            for child in n.children(&mut cursor) {
                stack.push(child);
            }
        }
        count
    }

    fn extract_params(&self, params_node: Option<TsNode>, source: &str) -> Vec<ParamDef> {
        let Some(params_node) = params_node else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut cursor = params_node.walk();
        for child in params_node.children(&mut cursor) {
            match child.kind() {
                "required_parameter" | "optional_parameter" => {
                    let name = child
                        .child_by_field_name("pattern")
                        .map(|n| text(&n, source))
                        .unwrap_or_default();
                    let param_type = child.child_by_field_name("type").map(|n| {
                        text(&n, source).trim_start_matches(':').trim().to_string()
                    });
                    let default_value = child.child_by_field_name("value").map(|n| text(&n, source));
                    out.push(ParamDef {
                        name,
                        param_type,
                        default_value,
                    });
                }
                "identifier" => out.push(ParamDef {
                    name: text(&child, source),
                    ..Default::default()
                }),
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
            if n.kind() == "call_expression" {
                if let Some(func) = n.child_by_field_name("function") {
                    let name = match func.kind() {
                        "identifier" => Some(text(&func, source)),
                        "member_expression" => func
                            .child_by_field_name("property")
                            .map(|p| text(&p, source)),
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

    fn decorators_of(&self, node: &TsNode, source: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut sibling = node.prev_sibling();
        while let Some(s) = sibling {
            if s.kind() == "decorator" {
                out.push(text(&s, source).trim_start_matches('@').to_string());
                sibling = s.prev_sibling();
            } else {
                break;
            }
        }
        out.reverse();
        out
    }

    fn extract_function_like(&self, node: &TsNode, name: String, source: &str, is_method: bool) -> FunctionDef {
        let is_async = {
            let mut c = node.walk();
            node.children(&mut c).any(|ch| ch.kind() == "async")
                || node.utf8_text(source.as_bytes()).unwrap_or("").trim_start().starts_with("async")
        };
        let return_type = node
            .child_by_field_name("return_type")
            .map(|n| text(&n, source).trim_start_matches(':').trim().to_string());
        let parameters = self.extract_params(node.child_by_field_name("parameters"), source);
        let calls = node
            .child_by_field_name("body")
            .map(|b| self.extract_calls(&b, source))
            .unwrap_or_default();
        FunctionDef {
            name,
            qualified_name: String::new(),
            parameters,
            return_type,
            decorators: self.decorators_of(node, source),
            is_async,
            is_method,
            calls,
            line_start: node.start_position().row as u32 + 1,
            line_end: node.end_position().row as u32 + 1,
            complexity: self.complexity(node),
        }
    }

    fn extract_class(&self, node: &TsNode, source: &str) -> Option<ClassDef> {
        let name = text(&node.child_by_field_name("name")?, source);
        let mut bases = Vec::new();
        if let Some(heritage) = node.child_by_field_name("heritage") {
            let mut cursor = heritage.walk();
            for clause in heritage.children(&mut cursor) {
                let mut clause_cursor = clause.walk();
                for ident in clause.children(&mut clause_cursor) {
                    if ident.kind() == "identifier" {
                        bases.push(text(&ident, source));
                    }
                }
            }
        }

        let mut methods = Vec::new();
        let mut attributes = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.children(&mut cursor) {
                match member.kind() {
                    "method_definition" => {
                        if let Some(name_node) = member.child_by_field_name("name") {
                            let mname = text(&name_node, source);
                            let mut f = self.extract_function_like(&member, mname.clone(), source, true);
                            f.qualified_name = format!("{name}.{mname}");
                            methods.push(f);
                        }
                    }
                    "public_field_definition" | "property_signature" => {
                        if let Some(name_node) = member.child_by_field_name("name") {
                            attributes.push(text(&name_node, source));
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
            decorators: self.decorators_of(node, source),
            attributes,
            methods,
            line_start: node.start_position().row as u32 + 1,
            line_end: node.end_position().row as u32 + 1,
        })
    }

    fn extract_import(&self, node: &TsNode, source: &str) -> Vec<ImportDef> {
        let line = node.start_position().row as u32 + 1;
        let Some(source_node) = node.child_by_field_name("source") else {
            return Vec::new();
        };
        let module = text(&source_node, source).trim_matches(['"', '\'']).to_string();
        let mut names = Vec::new();
        if let Some(clause) = node.child_by_field_name("import") {
            let mut stack = vec![clause];
            while let Some(n) = stack.pop() {
                if n.kind() == "identifier" {
                    names.push(text(&n, source));
                }
                let mut cursor = n.walk();
                for child in n.children(&mut cursor) {
                    stack.push(child);
                }
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

    fn extract_dynamic_import(&self, call: &TsNode, source: &str) -> Option<ImportDef> {
        let func = call.child_by_field_name("function")?;
        if text(&func, source) != "import" {
            return None;
        }
        let args = call.child_by_field_name("arguments")?;
        let mut cursor = args.walk();
        let arg = args.children(&mut cursor).find(|c| c.kind() == "string")?;
        Some(ImportDef {
            module: text(&arg, source).trim_matches(['"', '\'']).to_string(),
            names: Vec::new(),
            alias: None,
            is_dynamic: true,
            line: call.start_position().row as u32 + 1,
        })
    }
}

fn text(node: &TsNode, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or_default().to_string()
}

impl LanguageParser for TypeScriptParser {
    fn language_name(&self) -> &'static str {
        "typescript"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &[".ts", ".tsx", ".js", ".jsx"]
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
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            match node.kind() {
                "import_statement" => {
                    module.imports.extend(self.extract_import(&node, source));
                    continue; // don't descend into import clauses
                }
                "call_expression" => {
                    if let Some(import) = self.extract_dynamic_import(&node, source) {
                        module.imports.push(import);
                    }
                }
                "class_declaration" => {
                    if let Some(c) = self.extract_class(&node, source) {
                        module.classes.push(c);
                    }
                    continue; // members handled inside extract_class
                }
                "function_declaration" => {
                    if let Some(name_node) = node.child_by_field_name("name") {
                        let name = text(&name_node, source);
                        let mut f = self.extract_function_like(&node, name.clone(), source, false);
                        f.qualified_name = name;
                        module.functions.push(f);
                    }
                    continue;
                }
                _ if node.parent().map(|p| p.id()) == Some(root.id()) && node.kind() == "lexical_declaration" => {
                    // `const handler = () => {...}` at module top level.
                    let mut cursor = node.walk();
                    for declarator in node.children(&mut cursor) {
                        if declarator.kind() != "variable_declarator" {
                            continue;
                        }
                        let Some(value) = declarator.child_by_field_name("value") else { continue };
                        if matches!(value.kind(), "arrow_function" | "function_expression") {
                            if let Some(name_node) = declarator.child_by_field_name("name") {
                                let name = text(&name_node, source);
                                let mut f = self.extract_function_like(&value, name.clone(), source, false);
                                f.qualified_name = name;
                                module.functions.push(f);
                            }
                        }
                    }
                }
                _ => {}
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                stack.push(child);
            }
        }

        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_class_and_named_imports() {
        let source = r#"
import { helper } from "./utils";

export class UserService {
    async create(name: string): Promise<void> {
        if (!name) {
            throw new Error("bad");
        }
        helper(name);
    }
}

export function standalone() {
    return 1;
}
"#;
        let parser = TypeScriptParser::new();
        let module = parser.parse(Path::new("service.ts"), source).unwrap();
        assert_eq!(module.imports.len(), 1);
        assert_eq!(module.imports[0].module, "./utils");
        assert_eq!(module.classes.len(), 1);
        assert_eq!(module.classes[0].name, "UserService");
        assert_eq!(module.classes[0].methods.len(), 1);
        assert!(module.classes[0].methods[0].is_async);
        assert_eq!(module.functions.len(), 1);
    }
}
