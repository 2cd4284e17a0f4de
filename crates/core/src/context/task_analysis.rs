//! Task analysis — classify a natural-language question or task description
//! into a task type, a set of entity types, search keywords and domain
//! hints (SPEC_FULL.md §4.6 step 1). Grounded on
//! `original_source/src/mu/intelligence/task_context.py::TaskAnalyzer`,
//! ported from Python regex matching to `regex::Regex` lazily compiled once.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What kind of change the caller is describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Create,
    Modify,
    Delete,
    Refactor,
    Debug,
    Test,
    Document,
    Review,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Create => "create",
            TaskType::Modify => "modify",
            TaskType::Delete => "delete",
            TaskType::Refactor => "refactor",
            TaskType::Debug => "debug",
            TaskType::Test => "test",
            TaskType::Document => "document",
            TaskType::Review => "review",
        }
    }
}

/// What kind of entity the caller is talking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    ApiEndpoint,
    Hook,
    Component,
    Service,
    Repository,
    Model,
    Middleware,
    Config,
    Test,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::ApiEndpoint => "api_endpoint",
            EntityType::Hook => "hook",
            EntityType::Component => "component",
            EntityType::Service => "service",
            EntityType::Repository => "repository",
            EntityType::Model => "model",
            EntityType::Middleware => "middleware",
            EntityType::Config => "config",
            EntityType::Test => "test",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub original_task: String,
    pub task_type: TaskType,
    /// Empty when no entity-type pattern fired (the Python original's
    /// `EntityType.UNKNOWN` sentinel collapses to "no filtering applied").
    pub entity_types: Vec<EntityType>,
    pub keywords: Vec<String>,
    pub domain_hints: Vec<String>,
    pub confidence: f64,
}

struct PatternSet {
    task: Vec<(TaskType, Vec<Regex>)>,
    entity: Vec<(EntityType, Vec<Regex>)>,
    domain: Vec<(&'static str, Vec<Regex>)>,
    camel_case: Regex,
    snake_case: Regex,
    quoted: Regex,
    word: Regex,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("pattern set literal is a valid regex"))
        .collect()
}

fn patterns() -> &'static PatternSet {
    static PATTERNS: OnceLock<PatternSet> = OnceLock::new();
    PATTERNS.get_or_init(|| PatternSet {
        task: vec![
            (TaskType::Create, compile(&[
                r"\badd\b", r"\bcreate\b", r"\bimplement\b", r"\bbuild\b",
                r"\bnew\b", r"\bintroduce\b", r"\bset up\b", r"\bsetup\b",
            ])),
            (TaskType::Modify, compile(&[
                r"\bmodify\b", r"\bchange\b", r"\bupdate\b", r"\bedit\b",
                r"\balter\b", r"\badjust\b", r"\btweak\b", r"\benhance\b",
            ])),
            (TaskType::Delete, compile(&[
                r"\bremove\b", r"\bdelete\b", r"\bdrop\b", r"\bclean up\b", r"\bdeprecate\b",
            ])),
            (TaskType::Refactor, compile(&[
                r"\brefactor\b", r"\brestructure\b", r"\breorganize\b",
                r"\bextract\b", r"\bmove\b", r"\brename\b", r"\bsplit\b",
            ])),
            (TaskType::Debug, compile(&[
                r"\bfix\b", r"\bbug\b", r"\bdebug\b", r"\bissue\b",
                r"\berror\b", r"\bcrash\b", r"\bbroken\b", r"\bfailing\b",
            ])),
            (TaskType::Test, compile(&[
                r"\btest\b", r"\btests\b", r"\btesting\b", r"\bspec\b",
                r"\bcoverage\b", r"\bunit test\b",
            ])),
            (TaskType::Document, compile(&[
                r"\bdocument\b", r"\bdocs\b", r"\breadme\b", r"\bcomment\b",
                r"\bjsdoc\b", r"\bdocstring\b",
            ])),
            (TaskType::Review, compile(&[
                r"\breview\b", r"\baudit\b", r"\bcheck\b", r"\banalyze\b", r"\binspect\b",
            ])),
        ],
        entity: vec![
            (EntityType::ApiEndpoint, compile(&[
                r"\bapi\b", r"\bendpoint\b", r"\broute\b", r"\brest\b",
                r"\bgraphql\b", r"\bget\b", r"\bpost\b", r"\bput\b", r"\bdelete\b",
            ])),
            (EntityType::Hook, compile(&[r"\bhook\b", r"\buse[A-Z]", r"\bcustom hook\b"])),
            (EntityType::Component, compile(&[
                r"\bcomponent\b", r"\bwidget\b", r"\bui\b", r"\bview\b", r"\bscreen\b", r"\bpage\b",
            ])),
            (EntityType::Service, compile(&[r"\bservice\b", r"\bbusiness logic\b", r"\bmanager\b"])),
            (EntityType::Repository, compile(&[
                r"\brepository\b", r"\brepo\b", r"\bstore\b", r"\bdao\b", r"\bdata access\b",
            ])),
            (EntityType::Model, compile(&[
                r"\bmodel\b", r"\bentity\b", r"\bschema\b", r"\bdto\b", r"\btype\b", r"\binterface\b",
            ])),
            (EntityType::Middleware, compile(&[
                r"\bmiddleware\b", r"\binterceptor\b", r"\bguard\b", r"\bfilter\b",
            ])),
            (EntityType::Config, compile(&[r"\bconfig\b", r"\bconfiguration\b", r"\bsettings\b", r"\benv\b"])),
            (EntityType::Test, compile(&[r"\btest\b", r"\bspec\b", r"\bunit\b", r"\bintegration\b"])),
        ],
        domain: vec![
            ("auth", compile(&[r"\bauth", r"\blogin", r"\blogout", r"\bsession", r"\btoken", r"\bjwt"])),
            ("payment", compile(&[r"\bpay", r"\bbilling", r"\bcharge", r"\bsubscription", r"\binvoice"])),
            ("user", compile(&[r"\buser", r"\bprofile", r"\baccount", r"\bregistration"])),
            ("notification", compile(&[r"\bnotif", r"\bemail", r"\bsms", r"\balert", r"\bpush"])),
            ("search", compile(&[r"\bsearch", r"\bfilter", r"\bquery", r"\bindex"])),
            ("cache", compile(&[r"\bcache", r"\bredis", r"\bmemcache"])),
            ("database", compile(&[r"\bdatabase", r"\bdb\b", r"\bsql", r"\bquery", r"\btransaction"])),
            ("api", compile(&[r"\bapi\b", r"\bendpoint", r"\brest", r"\bgraphql"])),
            ("security", compile(&[r"\bsecur", r"\bencrypt", r"\bhash", r"\bvalidat"])),
            ("logging", compile(&[r"\blog", r"\btrace", r"\bmonitor", r"\bmetric"])),
        ],
        camel_case: Regex::new(r"\b[A-Z][a-z]+(?:[A-Z][a-z]+)+\b").unwrap(),
        snake_case: Regex::new(r"\b[a-z]+_[a-z_]+\b").unwrap(),
        quoted: Regex::new(r#"["']([^"']+)["']"#).unwrap(),
        word: Regex::new(r"\b[a-z]{4,}\b").unwrap(),
    })
}

const STOP_WORDS: &[&str] = &[
    "that", "this", "with", "from", "have", "been", "will", "should", "would", "could", "must",
    "need", "want", "like", "make", "sure", "when", "where", "what", "which", "while", "there",
    "their", "then", "than", "other", "some", "more", "into", "also", "just", "only",
];

/// Analyze a task description (SPEC_FULL.md §4.6 step 1).
pub fn analyze(task: &str) -> TaskAnalysis {
    let task_lower = task.to_lowercase();
    let p = patterns();

    let task_type = detect_task_type(&task_lower, p);
    let entity_types = detect_entity_types(&task_lower, p);
    let keywords = extract_keywords(task, p);
    let domain_hints = detect_domains(&task_lower, p);
    let confidence = calculate_confidence(task_type, &entity_types, &keywords, &domain_hints);

    TaskAnalysis {
        original_task: task.to_string(),
        task_type,
        entity_types,
        keywords,
        domain_hints,
        confidence,
    }
}

fn detect_task_type(task_lower: &str, p: &PatternSet) -> TaskType {
    let mut best: Option<(TaskType, usize)> = None;
    for (kind, regexes) in &p.task {
        let score = regexes.iter().filter(|r| r.is_match(task_lower)).count();
        if score > 0 && best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
            best = Some((*kind, score));
        }
    }
    best.map(|(k, _)| k).unwrap_or(TaskType::Modify)
}

fn detect_entity_types(task_lower: &str, p: &PatternSet) -> Vec<EntityType> {
    p.entity
        .iter()
        .filter(|(_, regexes)| regexes.iter().any(|r| r.is_match(task_lower)))
        .map(|(kind, _)| *kind)
        .collect()
}

fn detect_domains(task_lower: &str, p: &PatternSet) -> Vec<String> {
    p.domain
        .iter()
        .filter(|(_, regexes)| regexes.iter().any(|r| r.is_match(task_lower)))
        .map(|(name, _)| name.to_string())
        .collect()
}

fn extract_keywords(task: &str, p: &PatternSet) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    keywords.extend(p.camel_case.find_iter(task).map(|m| m.as_str().to_string()));
    keywords.extend(p.snake_case.find_iter(task).map(|m| m.as_str().to_string()));
    keywords.extend(p.quoted.captures_iter(task).map(|c| c[1].to_string()));

    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let task_lower = task.to_lowercase();
    let meaningful: Vec<String> = p
        .word
        .find_iter(&task_lower)
        .map(|m| m.as_str().to_string())
        .filter(|w| !stop.contains(w.as_str()))
        .take(10)
        .collect();
    keywords.extend(meaningful);

    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for kw in keywords {
        let lower = kw.to_lowercase();
        if seen.insert(lower) {
            unique.push(kw);
        }
    }
    unique
}

fn calculate_confidence(
    task_type: TaskType,
    entity_types: &[EntityType],
    keywords: &[String],
    domain_hints: &[String],
) -> f64 {
    let mut confidence = 0.5;
    if task_type != TaskType::Modify {
        confidence += 0.1;
    }
    if !entity_types.is_empty() {
        confidence += 0.1 * entity_types.len().min(3) as f64;
    }
    if keywords.len() >= 3 {
        confidence += 0.1;
    }
    if !domain_hints.is_empty() {
        confidence += 0.1;
    }
    confidence.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_create_and_entity_and_domain() {
        let a = analyze("Add a new API endpoint for user login with JWT tokens");
        assert_eq!(a.task_type, TaskType::Create);
        assert!(a.entity_types.contains(&EntityType::ApiEndpoint));
        assert!(a.domain_hints.contains(&"auth".to_string()));
        assert!(a.confidence > 0.5);
    }

    #[test]
    fn defaults_to_modify_with_no_signal() {
        let a = analyze("do the thing");
        assert_eq!(a.task_type, TaskType::Modify);
    }

    #[test]
    fn extracts_camel_and_snake_keywords() {
        let a = analyze("refactor AuthService to use session_token instead of 'legacyAuth'");
        assert!(a.keywords.iter().any(|k| k == "AuthService"));
        assert!(a.keywords.iter().any(|k| k == "session_token"));
        assert!(a.keywords.iter().any(|k| k == "legacyAuth"));
    }
}
