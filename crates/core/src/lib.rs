//! mu-core — the persistent, queryable semantic graph of a source-code
//! repository.
//!
//! - [`model`]: the node/edge/graph data model.
//! - [`ingest`]: scan → parse → reduce → assemble → build pipeline.
//! - [`store`]: the durable storage contract (in-memory and CozoDB-backed).
//! - [`engine`]: adjacency queries that don't fit naturally in SQL (impact,
//!   dependencies, path, cycles).
//! - [`resolver`]: best-match lookup from a loose reference to a node.
//! - [`muql`]: the declarative query language (lexer/parser/executor).
//! - [`context`]: task analysis, multi-signal retrieval, budget fitting and
//!   OMEGA emission for the context extractor.
//! - [`patterns`]: mines recurring conventions from the stored graph.
//! - [`warnings`]: proactive advisory warnings about a target node or file.
//! - [`snapshot`]: append-only history and semantic diff.
//! - [`config`]: `.murc.toml` configuration.
//! - [`cache`]: content-addressed parser/LLM result cache under `.mu/cache/`.

pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod model;
pub mod muql;
pub mod patterns;
pub mod resolver;
pub mod snapshot;
pub mod store;
pub mod warnings;

pub use config::MuConfig;
pub use context::{ContextExtractor, ContextResult};
pub use engine::GraphEngine;
pub use error::{MuError, Result};
pub use ingest::{build, ingest, LanguageParser, ParseError, ParserDispatcher};
pub use model::{CodeGraph, Edge, EdgeKind, EdgeProperties, Node, NodeKind, Parameter, Properties};
pub use muql::{execute as execute_muql, parse as parse_muql, MuqlError, Query, QueryResult};
pub use patterns::{Pattern, PatternCategory, PatternDetector};
pub use resolver::{Candidate, ResolveStrategy, ResolvedNode, Resolver};
pub use store::{open, Embedding, EmbeddingType, OpenMode, Store, StoreStats};
pub use warnings::{GitFileInfo, Warning, WarningGenerator, WarningKind, WarningLevel};

/// mu's own version, distinct from any ingested repository's version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
