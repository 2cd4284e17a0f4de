//! The error taxonomy surfaced by every component of the core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors the core can raise. Each variant maps to one taxonomy entry.
#[derive(Debug, Error)]
pub enum MuError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous reference {reference:?}: {} candidates", candidates.len())]
    Ambiguous {
        reference: String,
        candidates: Vec<String>,
    },

    #[error("store locked: {0}")]
    Locked(String),

    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("schema mismatch: on-disk version {on_disk}, library expects {expected}")]
    SchemaMismatch { on_disk: String, expected: String },

    #[error("store corruption detected: {0}")]
    Corruption(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("external error from {provider}: {message}")]
    External { provider: String, message: String },
}

impl MuError {
    /// Exit code per SPEC_FULL.md §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            MuError::Config(_) => 2,
            MuError::External { provider, .. } if provider == "git" => 3,
            MuError::Locked(_) => 4,
            _ => 1,
        }
    }

    /// Stable `kind` string for the `{"error": {"kind", ...}}` JSON shape.
    pub fn kind(&self) -> &'static str {
        match self {
            MuError::NotFound(_) => "NotFound",
            MuError::Ambiguous { .. } => "Ambiguous",
            MuError::Locked(_) => "Locked",
            MuError::Parse { .. } => "ParseError",
            MuError::SchemaMismatch { .. } => "SchemaMismatch",
            MuError::Corruption(_) => "Corruption",
            MuError::Cancelled => "Cancelled",
            MuError::Config(_) => "ConfigError",
            MuError::External { .. } => "ExternalError",
        }
    }
}

pub type Result<T> = std::result::Result<T, MuError>;
