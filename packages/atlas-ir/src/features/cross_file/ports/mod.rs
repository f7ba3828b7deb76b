//! Graph storage port

use crate::shared::models::{Edge, Node, Result};

/// One ACID unit of graph mutation. Nothing is visible until `commit`;
/// `rollback` (or drop) discards every staged operation.
pub trait GraphTransaction: Send {
    fn upsert_nodes(&mut self, nodes: &[Node]) -> Result<()>;

    fn upsert_edges(&mut self, edges: &[Edge]) -> Result<()>;

    fn delete_outbound_edges_by_file_paths(&mut self, file_paths: &[String]) -> Result<()>;

    fn commit(self: Box<Self>) -> Result<()>;

    fn rollback(self: Box<Self>) -> Result<()>;
}

/// Graph store port
pub trait GraphStore: Send + Sync {
    fn transaction(&self) -> Result<Box<dyn GraphTransaction + '_>>;
}
