//! Data flow graph: def-use chains

use crate::shared::models::Span;
use serde::{Deserialize, Serialize};

/// A definition site (write) inside the flow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub id: u32,
    pub var: String,
    pub block: u32,
    /// Index into the flow graph's statement arena
    pub stmt: u32,
    pub span: Span,
}

/// def → use edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefUse {
    pub def: u32,
    pub use_block: u32,
    /// Statement arena index of the use
    pub use_stmt: u32,
    pub var: String,
    pub span: Span,
}

/// Data flow graph of one function
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataFlowGraph {
    pub function_id: String,
    pub definitions: Vec<Definition>,
    pub edges: Vec<DefUse>,
}

impl DataFlowGraph {
    pub fn defs_of(&self, var: &str) -> impl Iterator<Item = &Definition> + '_ {
        let var = var.to_string();
        self.definitions.iter().filter(move |d| d.var == var)
    }

    pub fn uses_of_def(&self, def_id: u32) -> impl Iterator<Item = &DefUse> + '_ {
        self.edges.iter().filter(move |e| e.def == def_id)
    }

    /// Defs that reach a given use statement for a variable
    pub fn reaching_defs(&self, use_stmt: u32, var: &str) -> Vec<u32> {
        self.edges
            .iter()
            .filter(|e| e.use_stmt == use_stmt && e.var == var)
            .map(|e| e.def)
            .collect()
    }
}
