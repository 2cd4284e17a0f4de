//! The `Node` type — one addressable semantic unit in the codebase.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The closed set of node kinds the store recognises (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Module,
    Class,
    Function,
    Method,
    External,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::External => "external",
        }
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "module" => Ok(NodeKind::Module),
            "class" => Ok(NodeKind::Class),
            "function" => Ok(NodeKind::Function),
            "method" => Ok(NodeKind::Method),
            "external" => Ok(NodeKind::External),
            other => Err(format!("unknown node kind {other:?}")),
        }
    }
}

/// A single parameter of a function or method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// The `properties` bag (SPEC_FULL.md §9): known fields are typed, everything
/// else that a collaborator sends along rides in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Properties {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_method: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_path: Option<String>,
    /// Forward-compatible catch-all for collaborator-specific data.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One addressable semantic unit in the codebase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Opaque stable id, `<kind>:<path>[:<qualifier>]`.
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub qualified_name: String,
    /// Repo-relative, forward-slash normalised.
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub complexity: u32,
    #[serde(default)]
    pub properties: Properties,
}

impl Node {
    /// Builds the canonical id from the triple that identifies a node
    /// (SPEC_FULL.md §3: `(kind, file_path, qualified_name)` is unique).
    pub fn make_id(kind: NodeKind, file_path: &str, qualified_name: &str) -> String {
        if qualified_name.is_empty() {
            format!("{}:{}", kind.as_str(), file_path)
        } else {
            format!("{}:{}:{}", kind.as_str(), file_path, qualified_name)
        }
    }

    pub fn new(
        kind: NodeKind,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        file_path: impl Into<String>,
        line_start: u32,
        line_end: u32,
    ) -> Self {
        let file_path = file_path.into().replace('\\', "/");
        let qualified_name = qualified_name.into();
        let id = Self::make_id(kind, &file_path, &qualified_name);
        Self {
            id,
            kind,
            name: name.into(),
            qualified_name,
            file_path,
            line_start,
            line_end,
            complexity: 0,
            properties: Properties::default(),
        }
    }

    /// True if this node lives under a recognised test-file convention
    /// (GLOSSARY: "Test file conventions recognised").
    pub fn is_test_location(&self) -> bool {
        let p = self.file_path.as_str();
        p.contains("/tests/")
            || p.contains("__tests__")
            || p.contains("__mocks__")
            || p.ends_with("_test.py")
            || p.starts_with("test_")
            || p.contains("/test_")
            || p.contains(".test.")
            || p.contains(".spec.")
            || p.ends_with("_test.go")
            || p.ends_with("Test.java")
            || p.ends_with("Tests.java")
            || p.contains("src/test/java/")
            || p.ends_with("Tests.cs")
            || p.ends_with("Test.cs")
            || p.ends_with("_test.rs")
            || p.contains("conftest.py")
    }
}
