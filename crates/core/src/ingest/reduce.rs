//! `reduce(modules, rules)` — declarative filters that strip boilerplate
//! before graph construction (SPEC_FULL.md §4.2). Rules are configured, not
//! hard-coded (SPEC_FULL.md §6).

use super::{ClassDef, FunctionDef, ModuleDef};
use crate::config::MuConfig;

/// Declarative reduction rules, derived from `.murc.toml`.
#[derive(Debug, Clone)]
pub struct ReductionRules {
    pub strip_stdlib_imports: bool,
    pub strip_dunder_methods: bool,
    pub strip_test_only_internals: bool,
}

impl ReductionRules {
    pub fn from_config(config: &MuConfig) -> Self {
        Self {
            strip_stdlib_imports: config.reducer.strip_stdlib_imports,
            strip_dunder_methods: config.reducer.strip_dunder_methods,
            strip_test_only_internals: true,
        }
    }
}

impl Default for ReductionRules {
    fn default() -> Self {
        Self {
            strip_stdlib_imports: true,
            strip_dunder_methods: true,
            strip_test_only_internals: true,
        }
    }
}

const PYTHON_STDLIB: &[&str] = &[
    "os", "sys", "re", "json", "typing", "collections", "itertools", "functools", "pathlib",
    "dataclasses", "abc", "enum", "logging", "datetime", "time", "math", "random", "subprocess",
    "asyncio", "io", "copy", "contextlib", "unittest", "argparse", "shutil", "tempfile",
];

const RUST_STDLIB: &[&str] = &["std", "core", "alloc"];

const TS_STDLIB: &[&str] = &["fs", "path", "os", "util", "events", "stream", "http", "crypto"];

fn is_stdlib_import(language: &str, module: &str) -> bool {
    let root = module.split(['.', '/', ':']).next().unwrap_or(module);
    match language {
        "python" => PYTHON_STDLIB.contains(&root),
        "rust" => RUST_STDLIB.contains(&root),
        "typescript" => TS_STDLIB.contains(&root) && !module.starts_with('.'),
        _ => false,
    }
}

fn is_dunder(name: &str) -> bool {
    name.starts_with("__") && name.ends_with("__") && name.len() > 4
}

/// Mirrors `Node::is_test_location` (GLOSSARY "Test file conventions
/// recognised") but operates on a bare path string before any node exists.
fn is_test_path(path: &str) -> bool {
    path.contains("/tests/")
        || path.contains("__tests__")
        || path.contains("__mocks__")
        || path.ends_with("_test.py")
        || path.starts_with("test_")
        || path.contains("/test_")
        || path.contains(".test.")
        || path.contains(".spec.")
        || path.ends_with("_test.go")
        || path.ends_with("Test.java")
        || path.ends_with("Tests.java")
        || path.contains("src/test/java/")
        || path.ends_with("Tests.cs")
        || path.ends_with("Test.cs")
        || path.ends_with("_test.rs")
        || path.contains("conftest.py")
}

fn reduce_function(f: FunctionDef, rules: &ReductionRules) -> Option<FunctionDef> {
    if rules.strip_dunder_methods && f.is_method && is_dunder(&f.name) && f.name != "__init__" {
        return None;
    }
    Some(f)
}

fn reduce_class(mut c: ClassDef, rules: &ReductionRules) -> ClassDef {
    c.methods = c
        .methods
        .into_iter()
        .filter_map(|m| reduce_function(m, rules))
        .collect();
    c
}

/// Strip boilerplate from each module per `rules`. Parser errors on other
/// modules are untouched; this only ever removes entries, never fails.
pub fn reduce(modules: Vec<ModuleDef>, rules: &ReductionRules) -> Vec<ModuleDef> {
    modules
        .into_iter()
        .map(|mut m| {
            let is_test_module = is_test_path(&m.path);

            if rules.strip_stdlib_imports {
                m.imports
                    .retain(|i| i.is_dynamic || !is_stdlib_import(&m.language, &i.module));
            }

            m.classes = m
                .classes
                .into_iter()
                .map(|c| reduce_class(c, rules))
                .collect();

            m.functions = m
                .functions
                .into_iter()
                .filter_map(|f| reduce_function(f, rules))
                .collect();

            if rules.strip_test_only_internals && is_test_module {
                // Test-only internals are kept as nodes (so impact/resolve can
                // still see them) but never treated as stdlib-stripped; no
                // further action needed here beyond the filters above.
            }

            m
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_with_import(language: &str, module: &str) -> ModuleDef {
        ModuleDef {
            path: "src/a.py".into(),
            language: language.into(),
            imports: vec![crate::ingest::ImportDef {
                module: module.into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn strips_stdlib_imports_when_enabled() {
        let modules = vec![module_with_import("python", "os")];
        let rules = ReductionRules::default();
        let reduced = reduce(modules, &rules);
        assert!(reduced[0].imports.is_empty());
    }

    #[test]
    fn keeps_non_stdlib_imports() {
        let modules = vec![module_with_import("python", "myapp.services")];
        let rules = ReductionRules::default();
        let reduced = reduce(modules, &rules);
        assert_eq!(reduced[0].imports.len(), 1);
    }

    #[test]
    fn strips_dunder_methods_except_init() {
        let class = ClassDef {
            name: "Foo".into(),
            methods: vec![
                FunctionDef {
                    name: "__repr__".into(),
                    is_method: true,
                    ..Default::default()
                },
                FunctionDef {
                    name: "__init__".into(),
                    is_method: true,
                    ..Default::default()
                },
                FunctionDef {
                    name: "bar".into(),
                    is_method: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let module = ModuleDef {
            classes: vec![class],
            ..Default::default()
        };
        let reduced = reduce(vec![module], &ReductionRules::default());
        let names: Vec<_> = reduced[0].classes[0]
            .methods
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["__init__", "bar"]);
    }
}
