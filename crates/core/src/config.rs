//! `.murc.toml` configuration (SPEC_FULL.md §6).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MuError, Result};

/// Top-level `.murc.toml` structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MuConfig {
    pub scanner: ScannerConfig,
    pub reducer: ReducerConfig,
    pub embeddings: EmbeddingsConfig,
    pub cache: CacheConfig,
    pub security: SecurityConfig,
    pub warnings: WarningsConfig,
    pub context: ContextConfig,
}

impl Default for MuConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig::default(),
            reducer: ReducerConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            cache: CacheConfig::default(),
            security: SecurityConfig::default(),
            warnings: WarningsConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Skip files above this byte count.
    pub max_file_size: u64,
    /// Forward-compatible catch-all for collaborator-specific keys
    /// (SPEC_FULL.md §10), mirroring `model::Properties`'s `extra` field.
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, toml::Value>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*".to_string()],
            exclude: default_noise_dirs(),
            max_file_size: 1_000_000,
            extra: std::collections::HashMap::new(),
        }
    }
}

fn default_noise_dirs() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/vendor/**".to_string(),
        "**/target/**".to_string(),
        "**/dist/**".to_string(),
        "**/build/**".to_string(),
        "**/__pycache__/**".to_string(),
        "**/.venv/**".to_string(),
        "**/venv/**".to_string(),
        "**/.mu/**".to_string(),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReducerConfig {
    pub strip_stdlib_imports: bool,
    pub strip_dunder_methods: bool,
    /// Functions with complexity above this are flagged for optional LLM
    /// summarisation (the core only flags; it never calls the summariser).
    pub complexity_threshold_for_llm: u32,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            strip_stdlib_imports: true,
            strip_dunder_methods: true,
            complexity_threshold_for_llm: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub dimension: u32,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            dimension: 1536,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: 24 * 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub redact_secrets: bool,
    pub secret_patterns: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            redact_secrets: true,
            secret_patterns: default_secret_patterns(),
        }
    }
}

fn default_secret_patterns() -> Vec<String> {
    vec![
        r#"(?i)api[_-]?key\s*[:=]\s*['"][a-z0-9]{16,}['"]"#.to_string(),
        r#"(?i)secret\s*[:=]\s*['"][a-z0-9]{16,}['"]"#.to_string(),
        r#"-----BEGIN [A-Z ]*PRIVATE KEY-----"#.to_string(),
        r#"(?i)aws_secret_access_key\s*[:=]"#.to_string(),
    ]
}

/// Risk-score weights for the proactive warning generator (SPEC_FULL.md §4.8,
/// §9 Open Question: "Risk-score weights ... should be externalised").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningsConfig {
    pub weights: WarningWeights,
    /// Dependent-count threshold for `high_impact`; elevated to error at 3x.
    pub high_impact_threshold: usize,
    /// Days since last modification before `stale` warns / errors.
    pub stale_warn_days: u64,
    pub stale_error_days: u64,
    pub complexity_threshold: u32,
}

impl Default for WarningsConfig {
    fn default() -> Self {
        Self {
            weights: WarningWeights::default(),
            high_impact_threshold: 10,
            stale_warn_days: 180,
            stale_error_days: 365,
            complexity_threshold: 20,
        }
    }
}

/// Ordering per SPEC_FULL.md §4.8: security > high_impact > complexity >
/// stale > no_tests > deprecated > different_owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningWeights {
    pub security: f64,
    pub high_impact: f64,
    pub complexity: f64,
    pub stale: f64,
    pub no_tests: f64,
    pub deprecated: f64,
    pub different_owner: f64,
}

impl Default for WarningWeights {
    fn default() -> Self {
        Self {
            security: 0.30,
            high_impact: 0.25,
            complexity: 0.15,
            stale: 0.12,
            no_tests: 0.10,
            deprecated: 0.05,
            different_owner: 0.03,
        }
    }
}

/// Context extractor configuration (SPEC_FULL.md §4.6). The budget split is
/// adopted verbatim from `intelligence/task_context.py`'s
/// `TaskContextConfig` (60% core files / 20% patterns / 10% dependencies /
/// 10% warnings).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_tokens: u32,
    pub budget: ContextBudget,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { max_tokens: 8000, budget: ContextBudget::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextBudget {
    pub core_files: f64,
    pub patterns: f64,
    pub dependencies: f64,
    pub warnings: f64,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self { core_files: 0.60, patterns: 0.20, dependencies: 0.10, warnings: 0.10 }
    }
}

impl MuConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MuError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| MuError::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Walk up from `start_dir` looking for `.murc.toml`; fall back to
    /// defaults if none is found.
    pub fn find_and_load(start_dir: &Path) -> Result<Self> {
        let mut current = start_dir;
        loop {
            let candidate = current.join(".murc.toml");
            if candidate.exists() {
                return Self::from_file(&candidate);
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return Ok(Self::default()),
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| MuError::Config(format!("serialising config: {e}")))?;
        std::fs::write(path, contents)
            .map_err(|e| MuError::Config(format!("writing {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_toml() {
        let cfg: MuConfig = toml::from_str("").unwrap();
        assert!(cfg.reducer.strip_stdlib_imports);
        assert_eq!(cfg.embeddings.dimension, 1536);
    }

    #[test]
    fn find_and_load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = MuConfig::find_and_load(dir.path()).unwrap();
        assert_eq!(cfg.warnings.high_impact_threshold, 10);
    }
}
