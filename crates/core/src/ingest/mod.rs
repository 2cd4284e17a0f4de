//! The ingestion pipeline: scan → parse → reduce → assemble → build
//! (SPEC_FULL.md §4.2).
//!
//! Per-language parsers are external collaborators (SPEC_FULL.md §1): the
//! core only requires that they implement [`LanguageParser`] and yield the
//! normalised [`ModuleDef`] shape. Three representative tree-sitter-backed
//! implementations (Python, Rust, TypeScript) are provided to prove the
//! interface end-to-end; see DESIGN.md for why the rest of the teacher's
//! eleven parsers were dropped.

pub mod python;
pub mod rust_lang;
pub mod typescript;

mod assemble;
mod reduce;
mod scan;

pub use assemble::assemble;
pub use reduce::{reduce, ReductionRules};
pub use scan::{scan, FileInfo};

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::MuConfig;
use crate::model::{Edge, Node};
use crate::store::Store;

/// Per-file parse failure. Never aborts a build (SPEC_FULL.md §4.2, §7).
#[derive(Debug, Error, Clone)]
#[error("parse error in {path}: {message}")]
pub struct ParseError {
    pub path: PathBuf,
    pub message: String,
}

/// One function or method definition as yielded by a language parser.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub qualified_name: String,
    pub parameters: Vec<ParamDef>,
    pub return_type: Option<String>,
    pub decorators: Vec<String>,
    pub is_async: bool,
    pub is_method: bool,
    /// Names called from this function's body, as they appear at the call
    /// site (resolved against the module's own symbols and imports during
    /// `assemble`).
    pub calls: Vec<String>,
    pub line_start: u32,
    pub line_end: u32,
    /// 1 + number of decision points; see GLOSSARY "Cyclomatic complexity".
    pub complexity: u32,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: Option<String>,
    pub default_value: Option<String>,
}

/// A class (or equivalent: struct/interface/trait, depending on language).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub qualified_name: String,
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    pub attributes: Vec<String>,
    pub methods: Vec<FunctionDef>,
    pub line_start: u32,
    pub line_end: u32,
}

/// An import statement, prior to cross-file resolution.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ImportDef {
    /// Raw module specifier as written in source (e.g. `"./utils"`, `"os"`).
    pub module: String,
    /// Individual names imported (`from x import a, b` -> `["a", "b"]`).
    pub names: Vec<String>,
    pub alias: Option<String>,
    /// True for imports whose target can't be determined statically
    /// (runtime string-keyed imports).
    pub is_dynamic: bool,
    pub line: u32,
}

/// The normalised shape every language parser must produce for one file
/// (SPEC_FULL.md §4.2).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ModuleDef {
    /// Repo-relative, forward-slash normalised path.
    pub path: String,
    pub language: String,
    pub imports: Vec<ImportDef>,
    pub classes: Vec<ClassDef>,
    /// Top-level functions only; methods live under `ClassDef::methods`.
    pub functions: Vec<FunctionDef>,
    pub line_count: u32,
    /// Set when the parser could only extract part of the file.
    pub parse_error: Option<String>,
}

/// The polymorphic parser-adapter interface (SPEC_FULL.md §4.2, §9
/// "Reflection / plug-in parsers" — implementers register at startup rather
/// than dynamically loading).
pub trait LanguageParser: Send + Sync {
    fn language_name(&self) -> &'static str;
    fn file_extensions(&self) -> &[&'static str];
    fn parse(&self, path: &Path, source: &str) -> Result<ModuleDef, ParseError>;
}

/// Routes files to the registered parser by extension.
pub struct ParserDispatcher {
    parsers: Vec<Box<dyn LanguageParser>>,
}

impl ParserDispatcher {
    pub fn new() -> Self {
        Self {
            parsers: vec![
                Box::new(python::PythonParser::new()),
                Box::new(rust_lang::RustParser::new()),
                Box::new(typescript::TypeScriptParser::new()),
            ],
        }
    }

    pub fn with_parsers(parsers: Vec<Box<dyn LanguageParser>>) -> Self {
        Self { parsers }
    }

    pub fn find(&self, path: &Path) -> Option<&dyn LanguageParser> {
        let ext = path.extension()?.to_str()?;
        let with_dot = format!(".{ext}");
        self.parsers
            .iter()
            .find(|p| p.file_extensions().contains(&with_dot.as_str()))
            .map(|p| p.as_ref())
    }

    /// `parse_file(path, language)` from SPEC_FULL.md §4.2. Tolerant of
    /// syntax errors: never returns `Err` for a file whose language is
    /// known, only for files with no registered parser.
    pub fn parse_file(&self, root: &Path, path: &Path) -> Result<ModuleDef, ParseError> {
        let parser = self.find(path).ok_or_else(|| ParseError {
            path: path.to_path_buf(),
            message: format!(
                "unsupported language for extension {:?}",
                path.extension().and_then(|e| e.to_str())
            ),
        })?;
        let source = std::fs::read_to_string(path).map_err(|e| ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let mut module = parser.parse(path, &source)?;
        module.path = rel;
        module.language = parser.language_name().to_string();
        module.line_count = source.lines().count() as u32;
        Ok(module)
    }

    /// Scan, then parse every discovered file on a worker pool. Parse
    /// failures are collected, never abort the build (SPEC_FULL.md §4.2).
    pub fn parse_tree(&self, root: &Path, config: &MuConfig) -> (Vec<ModuleDef>, Vec<ParseError>) {
        use rayon::prelude::*;

        let files = match scan(root, config) {
            Ok(files) => files,
            Err(_) => return (Vec::new(), Vec::new()),
        };

        let results: Vec<Result<ModuleDef, ParseError>> = files
            .par_iter()
            .map(|f| self.parse_file(root, &f.path))
            .collect();

        let mut modules = Vec::new();
        let mut errors = Vec::new();
        for r in results {
            match r {
                Ok(m) => modules.push(m),
                Err(e) => errors.push(e),
            }
        }
        (modules, errors)
    }
}

impl Default for ParserDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// `build(store, modules, root)` — rebuild transaction that installs the new
/// graph (SPEC_FULL.md §4.1, §4.2).
pub fn build(store: &mut dyn Store, modules: &[ModuleDef], root: &Path) -> crate::error::Result<()> {
    let (nodes, edges) = assemble(modules);
    store.build(nodes, edges, root)
}

/// Convenience: scan, parse the whole tree, reduce with the config's rules,
/// and build the store in one call. This is what the `bootstrap` CLI command
/// drives.
pub fn ingest(
    store: &mut dyn Store,
    root: &Path,
    config: &MuConfig,
) -> crate::error::Result<Vec<ParseError>> {
    let dispatcher = ParserDispatcher::new();
    let (modules, errors) = dispatcher.parse_tree(root, config);
    for e in &errors {
        tracing::warn!(path = %e.path.display(), error = %e.message, "parse error, excluding file from build");
    }
    let rules = ReductionRules::from_config(config);
    let reduced = reduce(modules, &rules);
    build(store, &reduced, root)?;
    Ok(errors)
}

#[allow(unused)]
fn _assert_node_edge_types(_n: &Node, _e: &Edge) {}
