//! The `Edge` type — a directed relationship between two nodes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// The closed set of edge kinds the store recognises (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Imports,
    Calls,
    Inherits,
    Implements,
    Uses,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Imports => "imports",
            EdgeKind::Calls => "calls",
            EdgeKind::Inherits => "inherits",
            EdgeKind::Implements => "implements",
            EdgeKind::Uses => "uses",
        }
    }

    /// Edge kinds that admit self-loops by design (SPEC_FULL.md §4.3): only
    /// recursive calls are expected to legitimately target their own source.
    pub fn admits_self_cycle(&self) -> bool {
        matches!(self, EdgeKind::Calls)
    }

    /// Edge kinds the cycle detector runs over (the "import subgraph").
    pub fn is_cyclable(&self) -> bool {
        matches!(self, EdgeKind::Imports | EdgeKind::Calls | EdgeKind::Uses)
    }
}

impl std::str::FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "contains" => Ok(EdgeKind::Contains),
            "imports" => Ok(EdgeKind::Imports),
            "calls" => Ok(EdgeKind::Calls),
            "inherits" => Ok(EdgeKind::Inherits),
            "implements" => Ok(EdgeKind::Implements),
            "uses" => Ok(EdgeKind::Uses),
            other => Err(format!("unknown edge kind {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EdgeProperties {
    /// For `imports`: true when the import target could not be statically
    /// resolved (e.g. a runtime string-keyed import).
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A directed relationship between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
    #[serde(default)]
    pub properties: EdgeProperties,
}

impl Edge {
    /// `id = hash(source_id || kind || target_id)` (SPEC_FULL.md §4.1), so
    /// duplicate inserts of the same (source, kind, target) triple are
    /// idempotent no-ops under a UNIQUE constraint.
    pub fn make_id(source_id: &str, kind: EdgeKind, target_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_id.as_bytes());
        hasher.update(kind.as_str().as_bytes());
        hasher.update(target_id.as_bytes());
        format!("{:x}", hasher.finalize())[..16].to_string()
    }

    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, kind: EdgeKind) -> Self {
        let source_id = source_id.into();
        let target_id = target_id.into();
        let id = Self::make_id(&source_id, kind, &target_id);
        Self {
            id,
            source_id,
            target_id,
            kind,
            properties: EdgeProperties::default(),
        }
    }
}
