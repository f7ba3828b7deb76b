//! Basic-block and control-flow graphs (C4)

pub mod domain;
pub mod infrastructure;

pub use domain::{BasicBlock, BlockId, BlockKind, CfgEdge, CfgEdgeKind, FlowGraph, NO_BLOCK};
pub use infrastructure::{BfgBuilder, Dominators};
