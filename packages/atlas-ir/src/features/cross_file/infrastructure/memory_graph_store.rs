//! In-memory graph store (reference port implementation)

use crate::features::cross_file::ports::{GraphStore, GraphTransaction};
use crate::shared::models::{Edge, Node, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct GraphState {
    nodes: HashMap<String, Node>,
    edges: Vec<Edge>,
}

/// In-memory graph store with real transaction semantics: staged
/// mutations apply atomically on commit and vanish on rollback.
#[derive(Default)]
pub struct MemoryGraphStore {
    state: Arc<RwLock<GraphState>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.read().edges.len()
    }

    pub fn get_node(&self, id: &str) -> Option<Node> {
        self.state.read().nodes.get(id).cloned()
    }
}

enum Op {
    UpsertNodes(Vec<Node>),
    UpsertEdges(Vec<Edge>),
    DeleteOutbound(Vec<String>),
}

pub struct MemoryTransaction<'a> {
    state: &'a RwLock<GraphState>,
    staged: Vec<Op>,
}

impl GraphTransaction for MemoryTransaction<'_> {
    fn upsert_nodes(&mut self, nodes: &[Node]) -> Result<()> {
        self.staged.push(Op::UpsertNodes(nodes.to_vec()));
        Ok(())
    }

    fn upsert_edges(&mut self, edges: &[Edge]) -> Result<()> {
        self.staged.push(Op::UpsertEdges(edges.to_vec()));
        Ok(())
    }

    fn delete_outbound_edges_by_file_paths(&mut self, file_paths: &[String]) -> Result<()> {
        self.staged.push(Op::DeleteOutbound(file_paths.to_vec()));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let mut state = self.state.write();
        for op in self.staged {
            match op {
                Op::UpsertNodes(nodes) => {
                    for node in nodes {
                        state.nodes.insert(node.id.clone(), node);
                    }
                }
                Op::UpsertEdges(edges) => {
                    for edge in edges {
                        state.edges.retain(|e| e.sort_key() != edge.sort_key());
                        state.edges.push(edge);
                    }
                }
                Op::DeleteOutbound(file_paths) => {
                    let node_ids: Vec<String> = state
                        .nodes
                        .values()
                        .filter(|n| file_paths.contains(&n.file_path))
                        .map(|n| n.id.clone())
                        .collect();
                    state.edges.retain(|e| !node_ids.contains(&e.source_id));
                }
            }
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        // Staged operations are simply dropped
        Ok(())
    }
}

impl GraphStore for MemoryGraphStore {
    fn transaction(&self) -> Result<Box<dyn GraphTransaction + '_>> {
        Ok(Box::new(MemoryTransaction {
            state: &self.state,
            staged: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{EdgeKind, NodeKind, Span};

    fn node(id: &str, file: &str) -> Node {
        Node::new(id, NodeKind::Function, format!("m.{}", id), file, Span::zero())
    }

    #[test]
    fn test_commit_makes_changes_visible() {
        let store = MemoryGraphStore::new();

        let mut tx = store.transaction().unwrap();
        tx.upsert_nodes(&[node("a", "m.py")]).unwrap();
        tx.upsert_edges(&[Edge::new("a", "b", EdgeKind::Calls)]).unwrap();

        // Nothing visible before commit
        assert_eq!(store.node_count(), 0);

        tx.commit().unwrap();
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn test_rollback_discards() {
        let store = MemoryGraphStore::new();

        let mut tx = store.transaction().unwrap();
        tx.upsert_nodes(&[node("a", "m.py")]).unwrap();
        tx.rollback().unwrap();

        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_delete_outbound_edges_by_file() {
        let store = MemoryGraphStore::new();

        let mut tx = store.transaction().unwrap();
        tx.upsert_nodes(&[node("a", "m.py"), node("b", "other.py")])
            .unwrap();
        tx.upsert_edges(&[
            Edge::new("a", "b", EdgeKind::Calls),
            Edge::new("b", "a", EdgeKind::Calls),
        ])
        .unwrap();
        tx.commit().unwrap();

        let mut tx = store.transaction().unwrap();
        tx.delete_outbound_edges_by_file_paths(&["m.py".to_string()])
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(store.edge_count(), 1);
    }
}
