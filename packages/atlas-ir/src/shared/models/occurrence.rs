//! Occurrence tracking
//!
//! SCIP-style (span, symbol, role) records generated alongside nodes and
//! edges. Occurrences are the atom of go-to-definition and
//! find-references.

use super::edge::{Edge, EdgeKind};
use super::node::{Node, NodeKind};
use super::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Symbol role bitflags
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolRole {
    None = 0,
    Definition = 1,
    Reference = 2,
    Import = 4,
    Write = 8,
    Read = 16,
}

impl SymbolRole {
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

/// Combined roles as bitflags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SymbolRoles(pub u8);

impl SymbolRoles {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn definition() -> Self {
        Self(SymbolRole::Definition as u8)
    }

    pub fn add(&mut self, role: SymbolRole) {
        self.0 |= role as u8;
    }

    pub fn has(&self, role: SymbolRole) -> bool {
        self.0 & (role as u8) != 0
    }

    pub fn is_definition(&self) -> bool {
        self.has(SymbolRole::Definition)
    }
}

/// A single occurrence of a symbol at a source location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: String,

    /// Node id of the symbol (definition node for references too)
    pub symbol_id: String,

    pub span: Span,

    /// Role bitflags
    pub roles: u8,

    pub file_path: String,

    /// Enclosing symbol, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_symbol_id: Option<String>,

    /// Syntax kind of the referencing site
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax_kind: Option<String>,
}

impl Occurrence {
    /// Definition occurrence from a symbol node
    pub fn from_node(node: &Node, counter: &mut u64) -> Option<Self> {
        if !node.kind.is_symbol() && node.kind != NodeKind::File {
            return None;
        }

        *counter += 1;
        Some(Self {
            id: format!("occ:def:{}:{}", node.id, counter),
            symbol_id: node.id.clone(),
            span: node.span,
            roles: SymbolRole::Definition as u8,
            file_path: node.file_path.clone(),
            parent_symbol_id: node.parent_id.clone(),
            syntax_kind: Some(node.kind.as_str().to_string()),
        })
    }

    /// Reference occurrence from an edge
    pub fn from_edge(edge: &Edge, source_node: &Node, counter: &mut u64) -> Option<Self> {
        let roles = Self::edge_kind_to_roles(&edge.kind)?;

        *counter += 1;
        let tag = if roles & (SymbolRole::Import as u8) != 0 {
            "import"
        } else if roles & (SymbolRole::Write as u8) != 0 {
            "write"
        } else {
            "ref"
        };

        let span = edge.span.unwrap_or(source_node.span);

        Some(Self {
            id: format!("occ:{}:{}:{}", tag, edge.source_id, counter),
            symbol_id: edge.target_id.clone(),
            span,
            roles,
            file_path: source_node.file_path.clone(),
            parent_symbol_id: Some(edge.source_id.clone()),
            syntax_kind: Some(edge.kind.as_str().to_string()),
        })
    }

    fn edge_kind_to_roles(kind: &EdgeKind) -> Option<u8> {
        match kind {
            EdgeKind::Calls
            | EdgeKind::Inherits
            | EdgeKind::Implements
            | EdgeKind::ReferencesType
            | EdgeKind::ReferencesSymbol => {
                Some(SymbolRole::Reference as u8 | SymbolRole::Read as u8)
            }
            EdgeKind::Reads => Some(SymbolRole::Read as u8),
            EdgeKind::Writes => Some(SymbolRole::Write as u8),
            EdgeKind::Imports => Some(SymbolRole::Import as u8),
            // Structural and derived edges have no navigation occurrence
            EdgeKind::Contains
            | EdgeKind::CfgNext
            | EdgeKind::CfgBranch
            | EdgeKind::CfgLoop
            | EdgeKind::CfgHandler
            | EdgeKind::DfgDefUse
            | EdgeKind::PointsTo
            | EdgeKind::Taint => None,
        }
    }

    pub fn is_definition(&self) -> bool {
        self.roles & (SymbolRole::Definition as u8) != 0
    }
}

/// Occurrence generator for a single file
#[derive(Debug, Default)]
pub struct OccurrenceGenerator {
    counter: u64,
}

impl OccurrenceGenerator {
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    pub fn generate(&mut self, nodes: &[Node], edges: &[Edge]) -> Vec<Occurrence> {
        let mut occurrences = Vec::with_capacity(nodes.len() + edges.len());

        let node_by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        for node in nodes {
            if let Some(occ) = Occurrence::from_node(node, &mut self.counter) {
                occurrences.push(occ);
            }
        }

        for edge in edges {
            if let Some(source_node) = node_by_id.get(edge.source_id.as_str()) {
                if let Some(occ) = Occurrence::from_edge(edge, source_node, &mut self.counter) {
                    occurrences.push(occ);
                }
            }
        }

        occurrences
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_roles() {
        let mut roles = SymbolRoles::new();
        assert!(!roles.is_definition());

        roles.add(SymbolRole::Definition);
        assert!(roles.is_definition());

        roles.add(SymbolRole::Write);
        assert!(roles.has(SymbolRole::Write));
        assert_eq!(roles.0, 0b00001001);
    }

    #[test]
    fn test_occurrence_from_node() {
        let node = Node::new(
            "n:1",
            NodeKind::Function,
            "mod.foo",
            "mod.py",
            Span::new(1, 0, 5, 0),
        );

        let mut counter = 0u64;
        let occ = Occurrence::from_node(&node, &mut counter).unwrap();

        assert!(occ.id.starts_with("occ:def:"));
        assert_eq!(occ.symbol_id, "n:1");
        assert!(occ.is_definition());
    }

    #[test]
    fn test_occurrence_generator_one_definition_per_symbol() {
        let node = Node::new(
            "n:1",
            NodeKind::Function,
            "mod.foo",
            "mod.py",
            Span::new(1, 0, 5, 0),
        );
        let edge = Edge::new("n:1", "n:2", EdgeKind::Calls).with_span(Span::new(2, 4, 2, 9));

        let mut gener = OccurrenceGenerator::new();
        let occs = gener.generate(&[node], &[edge]);

        let defs: Vec<_> = occs.iter().filter(|o| o.is_definition()).collect();
        assert_eq!(defs.len(), 1);
        assert_eq!(occs.len(), 2);
    }
}
