//! MUQL abstract syntax tree (SPEC_FULL.md §4.5 grammar sketch).

use crate::model::{EdgeKind, NodeKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(SelectQuery),
    Show(ShowQuery),
    Find(FindQuery),
    Path(PathQuery),
    Analyze(AnalyzeQuery),
}

/// `node_kind ∈ {modules, classes, functions, methods, nodes}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKindFilter {
    Modules,
    Classes,
    Functions,
    Methods,
    Nodes,
}

impl NodeKindFilter {
    /// `None` for `nodes` (no kind filter).
    pub fn to_kind(self) -> Option<NodeKind> {
        match self {
            NodeKindFilter::Modules => Some(NodeKind::Module),
            NodeKindFilter::Classes => Some(NodeKind::Class),
            NodeKindFilter::Functions => Some(NodeKind::Function),
            NodeKindFilter::Methods => Some(NodeKind::Method),
            NodeKindFilter::Nodes => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Star,
    Name(String),
    Aggregate(AggFunc, AggField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Avg,
    Min,
    Max,
    Sum,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggField {
    Star,
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    NotIn,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    List(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Cmp(Condition),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub fields: Vec<Field>,
    pub from: NodeKindFilter,
    pub where_: Option<Expr>,
    pub order_by: Vec<(String, SortDir)>,
    pub limit: Option<usize>,
}

/// `show_kind ∈ {dependencies, dependents, callers, callees, inheritance,
/// implementations, children, parents}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowKind {
    Dependencies,
    Dependents,
    Callers,
    Callees,
    Inheritance,
    Implementations,
    Children,
    Parents,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShowQuery {
    pub kind: ShowKind,
    pub reference: String,
    pub depth: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FindPredicate {
    Calling(String),
    CalledBy(String),
    Importing(String),
    ImportedBy(String),
    Inheriting(String),
    Implementing(String),
    Mutating(String),
    WithDecorator(String),
    WithAnnotation(String),
    Matching(String),
    SimilarTo(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub kind: NodeKindFilter,
    pub predicate: FindPredicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathQuery {
    pub from: String,
    pub to: String,
    pub max_depth: usize,
    pub via: Option<EdgeKind>,
}

/// `analysis_kind ∈ {coupling, cohesion, complexity, hotspots, circular,
/// unused, impact}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Coupling,
    Cohesion,
    Complexity,
    Hotspots,
    Circular,
    Unused,
    Impact,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeQuery {
    pub kind: AnalysisKind,
    pub for_ref: Option<String>,
}
