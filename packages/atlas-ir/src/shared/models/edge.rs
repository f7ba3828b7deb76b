//! IR edge model

use super::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Edge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    Contains,
    Imports,
    Calls,
    Inherits,
    Implements,
    ReferencesType,
    ReferencesSymbol,
    Reads,
    Writes,
    CfgNext,
    CfgBranch,
    CfgLoop,
    CfgHandler,
    DfgDefUse,
    PointsTo,
    Taint,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "CONTAINS",
            EdgeKind::Imports => "IMPORTS",
            EdgeKind::Calls => "CALLS",
            EdgeKind::Inherits => "INHERITS",
            EdgeKind::Implements => "IMPLEMENTS",
            EdgeKind::ReferencesType => "REFERENCES_TYPE",
            EdgeKind::ReferencesSymbol => "REFERENCES_SYMBOL",
            EdgeKind::Reads => "READS",
            EdgeKind::Writes => "WRITES",
            EdgeKind::CfgNext => "CFG_NEXT",
            EdgeKind::CfgBranch => "CFG_BRANCH",
            EdgeKind::CfgLoop => "CFG_LOOP",
            EdgeKind::CfgHandler => "CFG_HANDLER",
            EdgeKind::DfgDefUse => "DFG_DEF_USE",
            EdgeKind::PointsTo => "POINTS_TO",
            EdgeKind::Taint => "TAINT",
        }
    }

    /// Edge kinds that create a file-level dependency when they cross files
    pub fn is_dependency(&self) -> bool {
        matches!(self, EdgeKind::Imports | EdgeKind::Inherits | EdgeKind::Implements)
    }
}

/// IR edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,

    /// Span of the referencing site (call site, import statement, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, serde_json::Value>,
}

impl Edge {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            span: None,
            attrs: HashMap::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn is_ambiguous(&self) -> bool {
        self.attrs
            .get("ambiguous")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Normalization key: edge lists are sorted by this before artifacts
    /// are fingerprinted or cached, so equality is by value.
    pub fn sort_key(&self) -> (&str, EdgeKind, &str) {
        (self.source_id.as_str(), self.kind, self.target_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_sort_key_ordering() {
        let mut edges = vec![
            Edge::new("b", "c", EdgeKind::Calls),
            Edge::new("a", "z", EdgeKind::Imports),
            Edge::new("a", "c", EdgeKind::Contains),
        ];
        edges.sort_by(|l, r| l.sort_key().cmp(&r.sort_key()));
        assert_eq!(edges[0].source_id, "a");
        assert_eq!(edges[0].kind, EdgeKind::Contains);
        assert_eq!(edges[2].source_id, "b");
    }
}
