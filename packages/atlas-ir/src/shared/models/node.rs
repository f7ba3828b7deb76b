//! IR node model
//!
//! Nodes are the vertices of the structural graph. Ids are stable:
//! `blake3(repo_id, fqn, kind, span_start)` truncated to 16 hex chars,
//! so rebuilding identical content yields identical ids and a file move
//! that preserves FQNs preserves ids.

use super::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Node kind (tagged variant, no inheritance)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Module,
    Class,
    Interface,
    Enum,
    Function,
    Method,
    Field,
    Variable,
    Parameter,
    Import,
    Call,
    Literal,
    Lambda,
    /// Symbol resolved outside the snapshot
    External,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Enum => "enum",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Field => "field",
            NodeKind::Variable => "variable",
            NodeKind::Parameter => "parameter",
            NodeKind::Import => "import",
            NodeKind::Call => "call",
            NodeKind::Literal => "literal",
            NodeKind::Lambda => "lambda",
            NodeKind::External => "external",
        }
    }

    /// Kinds that define a user-visible symbol
    pub fn is_symbol(&self) -> bool {
        matches!(
            self,
            NodeKind::Class
                | NodeKind::Interface
                | NodeKind::Enum
                | NodeKind::Function
                | NodeKind::Method
                | NodeKind::Field
                | NodeKind::Variable
                | NodeKind::Parameter
                | NodeKind::Lambda
        )
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, NodeKind::Function | NodeKind::Method | NodeKind::Lambda)
    }
}

/// IR node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier
    pub id: String,

    pub kind: NodeKind,

    /// Fully qualified dotted name (unique per snapshot for symbols)
    pub fqn: String,

    /// Short name (last FQN segment for named symbols)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub file_path: String,

    pub span: Span,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,

    /// Open attribute map (degraded, ambiguous, typed, signature, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, serde_json::Value>,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        kind: NodeKind,
        fqn: impl Into<String>,
        file_path: impl Into<String>,
        span: Span,
    ) -> Self {
        let fqn = fqn.into();
        let name = fqn.rsplit('.').next().map(|s| s.to_string());
        Self {
            id: id.into(),
            kind,
            fqn,
            name,
            file_path: file_path.into(),
            span,
            parent_id: None,
            docstring: None,
            attrs: HashMap::new(),
        }
    }

    /// Derive the stable id for a symbol.
    ///
    /// File path is intentionally not hashed: moving a file without
    /// changing its FQNs keeps logical identity.
    pub fn stable_id(repo_id: &str, fqn: &str, kind: NodeKind, span: Span) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(repo_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(fqn.as_bytes());
        hasher.update(b"\0");
        hasher.update(kind.as_str().as_bytes());
        hasher.update(&span.start_line.to_le_bytes());
        hasher.update(&span.start_col.to_le_bytes());
        let hex = hasher.finalize().to_hex();
        format!("n:{}", &hex.as_str()[..16])
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn is_degraded(&self) -> bool {
        self.attrs
            .get("degraded")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_id_deterministic() {
        let span = Span::new(3, 0, 8, 0);
        let a = Node::stable_id("repo", "pkg.mod.f", NodeKind::Function, span);
        let b = Node::stable_id("repo", "pkg.mod.f", NodeKind::Function, span);
        assert_eq!(a, b);

        let c = Node::stable_id("repo", "pkg.mod.g", NodeKind::Function, span);
        assert_ne!(a, c);
    }

    #[test]
    fn test_node_name_from_fqn() {
        let node = Node::new("n:1", NodeKind::Method, "pkg.Cls.run", "pkg/cls.py", Span::zero());
        assert_eq!(node.name.as_deref(), Some("run"));
    }
}
