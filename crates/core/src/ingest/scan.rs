//! `scan(root, config)` — lazy-ish directory walk, gitignore-aware, filtered
//! by the config's include/exclude globs and noise-directory list
//! (SPEC_FULL.md §4.2).

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::config::MuConfig;
use crate::error::{MuError, Result};

/// Compiles `scanner.include` into matchable globs once per scan rather than
/// per file.
fn compile_include_globs(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| MuError::Config(format!("bad include glob {p:?}: {e}")))
        })
        .collect()
}

fn matches_any(globs: &[glob::Pattern], relpath: &Path) -> bool {
    if globs.is_empty() {
        return true;
    }
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    globs.iter().any(|g| g.matches_path_with(relpath, options))
}

/// A discovered source file.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub language: Option<&'static str>,
    pub size_bytes: u64,
    pub line_count: u32,
}

const KNOWN_EXTENSIONS: &[(&str, &str)] = &[
    (".py", "python"),
    (".pyi", "python"),
    (".rs", "rust"),
    (".ts", "typescript"),
    (".tsx", "typescript"),
    (".js", "typescript"),
    (".jsx", "typescript"),
];

fn language_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    let with_dot = format!(".{ext}");
    KNOWN_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == with_dot)
        .map(|(_, lang)| *lang)
}

/// Walk `root`, respecting `.gitignore`/`.git/info/exclude`, the config's
/// `scanner.exclude` noise-directory globs, and `scanner.max_file_size`.
/// Only files whose extension maps to a registered language are returned.
pub fn scan(root: &Path, config: &MuConfig) -> Result<Vec<FileInfo>> {
    let root = root
        .canonicalize()
        .map_err(|e| MuError::Config(format!("cannot read {}: {e}", root.display())))?;

    let mut builder = WalkBuilder::new(&root);
    builder
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true);

    if !config.scanner.exclude.is_empty() {
        let mut overrides = OverrideBuilder::new(&root);
        for pattern in &config.scanner.exclude {
            let glob = format!("!{pattern}");
            overrides
                .add(&glob)
                .map_err(|e| MuError::Config(format!("bad exclude glob {pattern:?}: {e}")))?;
        }
        builder.overrides(
            overrides
                .build()
                .map_err(|e| MuError::Config(format!("building excludes: {e}")))?,
        );
    }

    let include_globs = compile_include_globs(&config.scanner.include)?;

    let mut files = Vec::new();
    for entry in builder.build() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.into_path();
        let relpath = path.strip_prefix(&root).unwrap_or(&path);
        if !matches_any(&include_globs, relpath) {
            continue;
        }
        let Some(language) = language_for(&path) else {
            continue;
        };
        let Ok(meta) = std::fs::metadata(&path) else {
            continue;
        };
        if meta.len() > config.scanner.max_file_size {
            continue;
        }
        let line_count = std::fs::read_to_string(&path)
            .map(|s| s.lines().count() as u32)
            .unwrap_or(0);
        files.push(FileInfo {
            path,
            language: Some(language),
            size_bytes: meta.len(),
            line_count,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn scan_finds_known_languages_and_skips_noise_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();

        let mut f = std::fs::File::create(dir.path().join("src/main.py")).unwrap();
        writeln!(f, "def main():\n    pass").unwrap();
        let mut noise = std::fs::File::create(dir.path().join("node_modules/pkg/index.js")).unwrap();
        writeln!(noise, "module.exports = {{}}").unwrap();

        let config = MuConfig::default();
        let files = scan(dir.path(), &config).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("src/main.py"));
    }

    #[test]
    fn scan_skips_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("big.py")).unwrap();
        writeln!(f, "{}", "x = 1\n".repeat(10)).unwrap();

        let mut config = MuConfig::default();
        config.scanner.max_file_size = 5;
        let files = scan(dir.path(), &config).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn scan_honours_scanner_include() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("scripts")).unwrap();

        std::fs::write(dir.path().join("src/main.py"), "def main():\n    pass\n").unwrap();
        std::fs::write(dir.path().join("scripts/tool.py"), "def run():\n    pass\n").unwrap();

        let mut config = MuConfig::default();
        config.scanner.include = vec!["src/**".to_string()];
        let files = scan(dir.path(), &config).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("src/main.py"));
    }
}
