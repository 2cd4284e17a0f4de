//! `mu` — command-line interface to the mu semantic code graph.
//!
//! Exposed as a library so integration tests can drive commands directly
//! without spawning the binary (teacher pattern: `revet` kept the same
//! split between `main.rs` and `lib.rs`).

pub mod commands;
pub mod output;
#[allow(dead_code)]
pub mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mu")]
#[command(about = "Persistent, queryable semantic graph of a source-code repository", long_about = None)]
#[command(version = mu_core::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create `.murc.toml` if missing, build the graph, optionally build embeddings.
    Bootstrap {
        /// Path to the repository (default: current directory).
        path: Option<PathBuf>,

        /// Rebuild even if a store already exists.
        #[arg(long)]
        force: bool,

        /// Also build the embedding index (requires a configured provider).
        #[arg(long)]
        embed: bool,
    },

    /// Report config, store, and embedding state, and a next-action hint.
    Status {
        path: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Print the source excerpt for a resolved node.
    Read {
        /// Node reference: id, name, qualified-name suffix, or fuzzy fragment.
        node_ref: String,

        path: Option<PathBuf>,

        /// Extra lines of context around the node's line range.
        #[arg(long, default_value_t = 0)]
        context: u32,

        #[arg(long)]
        json: bool,
    },

    /// Emit an OMEGA context bundle for a natural-language question.
    Context {
        question: String,

        path: Option<PathBuf>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Attach patterns, warnings, and entry points (the task bundle extension).
        #[arg(long)]
        bundle: bool,

        #[arg(long)]
        json: bool,
    },

    /// Semantic or keyword search over the graph, falling back gracefully.
    Search {
        query: String,

        path: Option<PathBuf>,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Run a MUQL query.
    Query {
        muql: String,

        path: Option<PathBuf>,

        #[arg(long)]
        json: bool,

        #[arg(long)]
        csv: bool,
    },

    /// Print the nodes impacted by a change at the given reference.
    Impact {
        node_ref: String,

        path: Option<PathBuf>,

        #[arg(long)]
        depth: Option<usize>,

        /// Restrict traversal to these edge kinds (default: all).
        #[arg(long = "type", value_delimiter = ',')]
        edge_kinds: Option<Vec<String>>,

        #[arg(long)]
        json: bool,
    },

    /// Semantic diff between two refs.
    Diff {
        base_ref: String,
        target_ref: String,

        path: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = DiffFormat::Terminal)]
        format: DiffFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DiffFormat {
    Terminal,
    Json,
    Markdown,
}
