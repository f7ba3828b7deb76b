//! IR document: the per-file aggregate produced by the structural build

use crate::features::cache::EstimateSize;
use crate::features::ir_build::domain::FunctionBody;
use crate::shared::models::{Edge, LanguageId, Node, NodeKind, Occurrence, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Immutable per-(snapshot, file) analysis aggregate.
///
/// Built once, normalized (sorted node/edge order) before caching so
/// artifact equality is by value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IRDocument {
    pub repo_id: String,
    pub snapshot_id: String,
    pub file_path: String,
    pub language: Option<LanguageId>,

    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub occurrences: Vec<Occurrence>,

    /// Statement trees for every function, input to the semantic stages
    pub bodies: Vec<FunctionBody>,

    /// Blake3 over the file bytes (hex)
    pub fingerprint: String,
    /// AST shape hash (comments/formatting independent)
    pub ast_hash: String,
    /// Hash over sorted function signatures
    pub signature_hash: String,
    /// Hash over sorted import targets
    pub import_hash: String,

    /// True when the source had parse errors or extraction fell back
    pub degraded: bool,
}

impl IRDocument {
    pub fn new(repo_id: &str, snapshot_id: &str, file_path: &str) -> Self {
        Self {
            repo_id: repo_id.to_string(),
            snapshot_id: snapshot_id.to_string(),
            file_path: file_path.to_string(),
            ..Default::default()
        }
    }

    /// File node of this document
    pub fn file_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeKind::File)
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Sort nodes and edges into canonical order
    pub fn normalize(&mut self) {
        self.nodes.sort_by(|a, b| a.id.cmp(&b.id));
        self.edges
            .sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        self.bodies.sort_by(|a, b| a.function_id.cmp(&b.function_id));
    }

    /// Structural invariants checkable on a single document: edge
    /// sources resolve locally, at most one definition occurrence per
    /// symbol, and every non-file node is reachable from the file node
    /// via CONTAINS. Edge targets may live in other documents; the
    /// snapshot-wide target check is `validate_snapshot` in the
    /// cross-file resolver.
    pub fn validate(&self) -> Result<()> {
        use crate::shared::models::AtlasError;

        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();

        for edge in &self.edges {
            if !ids.contains(edge.source_id.as_str()) {
                return Err(AtlasError::invariant(format!(
                    "edge source {} missing in {}",
                    edge.source_id, self.file_path
                )));
            }
            // Targets: local node, resolved cross-file node ("n:"),
            // synthesized external, or still pending resolution
            let target = edge.target_id.as_str();
            let target_ok = ids.contains(target)
                || target.starts_with("n:")
                || target.starts_with("external:")
                || target.starts_with("unresolved:");
            if !target_ok {
                return Err(AtlasError::invariant(format!(
                    "edge target {} malformed in {}",
                    edge.target_id, self.file_path
                )));
            }
        }

        let mut defined: HashSet<&str> = HashSet::new();
        for occ in &self.occurrences {
            if occ.is_definition() && !defined.insert(occ.symbol_id.as_str()) {
                return Err(AtlasError::invariant(format!(
                    "duplicate definition occurrence for {} in {}",
                    occ.symbol_id, self.file_path
                )));
            }
        }

        // Containment: BFS from the file node over CONTAINS edges
        if let Some(file_node) = self.file_node() {
            let mut contained: HashSet<&str> = HashSet::new();
            contained.insert(file_node.id.as_str());
            let mut frontier = vec![file_node.id.as_str()];
            let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
            for edge in &self.edges {
                if edge.kind == crate::shared::models::EdgeKind::Contains {
                    children
                        .entry(edge.source_id.as_str())
                        .or_default()
                        .push(edge.target_id.as_str());
                }
            }
            while let Some(id) = frontier.pop() {
                for child in children.get(id).into_iter().flatten() {
                    if contained.insert(child) {
                        frontier.push(child);
                    }
                }
            }
            for node in &self.nodes {
                if node.kind != NodeKind::File
                    && node.kind != NodeKind::External
                    && !contained.contains(node.id.as_str())
                {
                    return Err(AtlasError::invariant(format!(
                        "node {} not contained in file {}",
                        node.fqn, self.file_path
                    )));
                }
            }
        }

        Ok(())
    }
}

impl EstimateSize for IRDocument {
    fn estimated_size_bytes(&self) -> usize {
        // Rough per-entity costs; exact accounting is not worth a walk
        // over every string.
        self.nodes.len() * 256
            + self.edges.len() * 128
            + self.occurrences.len() * 128
            + self.bodies.len() * 512
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{EdgeKind, Span};

    fn doc_with_file_node() -> IRDocument {
        let mut doc = IRDocument::new("repo", "snap", "m.py");
        doc.fingerprint = "abc".into();
        doc.nodes.push(Node::new(
            "n:file",
            NodeKind::File,
            "m",
            "m.py",
            Span::zero(),
        ));
        doc
    }

    #[test]
    fn test_validate_ok() {
        let mut doc = doc_with_file_node();
        let func = Node::new("n:f", NodeKind::Function, "m.f", "m.py", Span::new(1, 0, 2, 0));
        doc.edges
            .push(Edge::new("n:file", "n:f", EdgeKind::Contains));
        doc.nodes.push(func);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_malformed_target() {
        let mut doc = doc_with_file_node();
        doc.edges.push(Edge::new("n:file", "ghost", EdgeKind::Calls));
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_validate_detects_missing_source() {
        let mut doc = doc_with_file_node();
        doc.edges.push(Edge::new("n:ghost", "n:file", EdgeKind::Calls));
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_validate_detects_uncontained_node() {
        let mut doc = doc_with_file_node();
        doc.nodes.push(Node::new(
            "n:orphan",
            NodeKind::Function,
            "m.orphan",
            "m.py",
            Span::new(5, 0, 6, 0),
        ));
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_normalize_is_stable() {
        let mut a = doc_with_file_node();
        a.edges.push(Edge::new("n:b", "n:c", EdgeKind::Calls));
        a.edges.push(Edge::new("n:a", "n:c", EdgeKind::Calls));

        let mut b = a.clone();
        b.edges.reverse();

        a.normalize();
        b.normalize();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
