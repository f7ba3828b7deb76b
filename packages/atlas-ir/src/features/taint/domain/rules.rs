//! Taint rule catalog
//!
//! Declarative YAML rules mapping (language, FQN pattern, base type) to
//! source/sink/propagator/sanitizer. The catalog compiles once at
//! startup into a segment trie; no pattern interpretation happens on
//! the hot path. A whole-catalog load failure is fatal; an invalid
//! individual rule is skipped with a warning.

use crate::shared::models::{AtlasError, LanguageId, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Source,
    Sink,
    Propagator,
    Sanitizer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// What syntactic shape a rule matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOn {
    /// Call expression whose callee path matches `pattern`
    #[default]
    Call,
    /// A literal None/null flowing into a call argument
    NoneLiteral,
    /// Attribute access on a tainted base
    AttributeAccess,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaintRule {
    pub id: String,
    #[serde(default)]
    pub language: Option<LanguageId>,
    pub kind: RuleKind,
    /// Dotted FQN pattern; a trailing `*` segment matches any suffix
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub match_on: MatchOn,
    /// Base-type filter for method calls
    #[serde(default)]
    pub base_type: Option<String>,
    /// Taint label this rule introduces (source) or clears (sanitizer)
    pub label: String,
    /// Finding category (sinks)
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub cwe: Option<String>,
    /// Argument positions a sink checks (default: all)
    #[serde(default)]
    pub sink_args: Option<Vec<usize>>,
    /// Labels a sink fires on (default: any)
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

impl TaintRule {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.id.is_empty() {
            return Err("rule id missing".into());
        }
        if self.match_on == MatchOn::Call && self.pattern.is_empty() {
            return Err(format!("rule {} matches calls but has no pattern", self.id));
        }
        if self.kind == RuleKind::Sink && self.category.is_none() {
            return Err(format!("sink rule {} has no category", self.id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleCatalog {
    pub rules: Vec<TaintRule>,
}

impl RuleCatalog {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let catalog: RuleCatalog = serde_yaml::from_str(yaml)
            .map_err(|e| AtlasError::rule_catalog(format!("catalog parse failed: {}", e)))?;
        Ok(catalog)
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AtlasError::rule_catalog(format!("catalog unreadable: {}", e)))?;
        Self::from_yaml_str(&content)
    }

    /// Built-in rules shipped with the engine: null-dereference
    /// tracking for literal None flowing into attribute access.
    pub fn builtin() -> Self {
        Self {
            rules: vec![
                TaintRule {
                    id: "core.null.source".into(),
                    language: None,
                    kind: RuleKind::Source,
                    pattern: String::new(),
                    match_on: MatchOn::NoneLiteral,
                    base_type: None,
                    label: "null".into(),
                    category: None,
                    severity: None,
                    cwe: None,
                    sink_args: None,
                    labels: None,
                },
                TaintRule {
                    id: "core.null.deref".into(),
                    language: None,
                    kind: RuleKind::Sink,
                    pattern: String::new(),
                    match_on: MatchOn::AttributeAccess,
                    base_type: None,
                    label: "null".into(),
                    category: Some("NullDereference".into()),
                    severity: Some(Severity::Medium),
                    cwe: Some("CWE-476".into()),
                    sink_args: None,
                    labels: Some(vec!["null".into()]),
                },
            ],
        }
    }

    pub fn merged_with(mut self, other: RuleCatalog) -> Self {
        self.rules.extend(other.rules);
        self
    }

    /// Compile to matchers; invalid rules are dropped with a warning
    pub fn compile(&self) -> CompiledRules {
        let mut compiled = CompiledRules::default();
        for rule in &self.rules {
            if let Err(reason) = rule.validate() {
                tracing::warn!("skipping invalid taint rule: {}", reason);
                continue;
            }
            let idx = compiled.rules.len();
            match rule.match_on {
                MatchOn::Call => compiled.trie.insert(&rule.pattern, idx),
                MatchOn::NoneLiteral => compiled.none_literal_rules.push(idx),
                MatchOn::AttributeAccess => compiled.attribute_rules.push(idx),
            }
            compiled.rules.push(rule.clone());
        }
        compiled
    }
}

/// Segment trie over dotted patterns
#[derive(Debug, Default)]
struct TrieNode {
    children: FxHashMap<String, TrieNode>,
    /// Rules terminating exactly here
    terminal: Vec<usize>,
    /// Rules with a trailing wildcard from here
    wildcard: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct PatternTrie {
    root: TrieNode,
}

impl PatternTrie {
    fn insert(&mut self, pattern: &str, rule_idx: usize) {
        let mut node = &mut self.root;
        let segments: Vec<&str> = pattern.split('.').collect();
        for (i, segment) in segments.iter().enumerate() {
            if *segment == "*" && i == segments.len() - 1 {
                node.wildcard.push(rule_idx);
                return;
            }
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.terminal.push(rule_idx);
    }

    fn lookup(&self, path: &str) -> Vec<usize> {
        let mut out = Vec::new();
        let mut node = &self.root;
        let segments: Vec<&str> = path.split('.').collect();
        for (i, segment) in segments.iter().enumerate() {
            out.extend(node.wildcard.iter().copied());
            match node.children.get(*segment) {
                Some(child) => node = child,
                None => return out,
            }
            if i == segments.len() - 1 {
                out.extend(node.terminal.iter().copied());
                out.extend(node.wildcard.iter().copied());
            }
        }
        out
    }
}

/// Compiled matcher set
#[derive(Debug, Default)]
pub struct CompiledRules {
    pub rules: Vec<TaintRule>,
    trie: PatternTrie,
    pub none_literal_rules: Vec<usize>,
    pub attribute_rules: Vec<usize>,
}

impl CompiledRules {
    /// Rules matching a call to `callee` (optionally filtered by the
    /// receiver's type when known)
    pub fn match_call(&self, callee: &str, base_type: Option<&str>) -> Vec<&TaintRule> {
        self.trie
            .lookup(callee)
            .into_iter()
            .map(|i| &self.rules[i])
            .filter(|rule| match (&rule.base_type, base_type) {
                (Some(required), Some(actual)) => required == actual,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect()
    }

    pub fn none_sources(&self) -> impl Iterator<Item = (usize, &TaintRule)> + '_ {
        self.none_literal_rules.iter().map(move |&i| (i, &self.rules[i]))
    }

    pub fn attribute_sinks(&self) -> impl Iterator<Item = (usize, &TaintRule)> + '_ {
        self.attribute_rules
            .iter()
            .map(move |&i| (i, &self.rules[i]))
            .filter(|(_, r)| r.kind == RuleKind::Sink)
    }

    pub fn rule(&self, idx: usize) -> &TaintRule {
        &self.rules[idx]
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
rules:
  - id: py.web.source.get_item
    kind: source
    pattern: "req.GET.__getitem__"
    label: user_input
  - id: py.sql.sink.execute
    kind: sink
    pattern: "db.execute"
    label: sql
    category: SQLInjection
    severity: high
    cwe: CWE-89
    sink_args: [0]
  - id: py.escape.sanitizer
    kind: sanitizer
    pattern: "html.escape"
    label: user_input
  - id: py.os.sink.wild
    kind: sink
    pattern: "os.*"
    label: cmd
    category: CommandInjection
    severity: critical
"#;

    #[test]
    fn test_catalog_parses_and_compiles() {
        let catalog = RuleCatalog::from_yaml_str(CATALOG).unwrap();
        assert_eq!(catalog.rules.len(), 4);

        let compiled = catalog.compile();
        assert_eq!(compiled.len(), 4);

        let hits = compiled.match_call("req.GET.__getitem__", None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, RuleKind::Source);

        let hits = compiled.match_call("db.execute", None);
        assert_eq!(hits[0].category.as_deref(), Some("SQLInjection"));
        assert_eq!(hits[0].cwe.as_deref(), Some("CWE-89"));
    }

    #[test]
    fn test_wildcard_pattern() {
        let compiled = RuleCatalog::from_yaml_str(CATALOG).unwrap().compile();
        assert_eq!(compiled.match_call("os.system", None).len(), 1);
        assert_eq!(compiled.match_call("os.path.join", None).len(), 1);
        assert!(compiled.match_call("subprocess.run", None).is_empty());
    }

    #[test]
    fn test_base_type_filter() {
        let yaml = r#"
rules:
  - id: typed.sink
    kind: sink
    pattern: "cursor.execute"
    base_type: "sqlite3.Cursor"
    label: sql
    category: SQLInjection
"#;
        let compiled = RuleCatalog::from_yaml_str(yaml).unwrap().compile();
        assert!(compiled
            .match_call("cursor.execute", Some("sqlite3.Cursor"))
            .len()
            == 1);
        assert!(compiled
            .match_call("cursor.execute", Some("other.Type"))
            .is_empty());
        assert!(compiled.match_call("cursor.execute", None).is_empty());
    }

    #[test]
    fn test_invalid_rule_skipped_not_fatal() {
        let yaml = r#"
rules:
  - id: ok.sink
    kind: sink
    pattern: "db.execute"
    label: sql
    category: SQLInjection
  - id: broken.sink
    kind: sink
    pattern: "no.category.sink"
    label: sql
"#;
        let compiled = RuleCatalog::from_yaml_str(yaml).unwrap().compile();
        assert_eq!(compiled.len(), 1);
    }

    #[test]
    fn test_malformed_catalog_is_fatal() {
        assert!(RuleCatalog::from_yaml_str("rules: [{ not yaml").is_err());
    }

    #[test]
    fn test_builtin_null_rules() {
        let compiled = RuleCatalog::builtin().compile();
        assert_eq!(compiled.none_sources().count(), 1);
        assert_eq!(compiled.attribute_sinks().count(), 1);
    }
}
