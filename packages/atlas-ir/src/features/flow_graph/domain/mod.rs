//! Flow graph domain models

pub mod bfg;
pub mod cfg;

pub use bfg::{BasicBlock, BlockId, BlockKind, NO_BLOCK};
pub use cfg::{CfgEdge, CfgEdgeKind, FlowGraph};
