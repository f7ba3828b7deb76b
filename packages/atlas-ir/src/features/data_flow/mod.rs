//! Data flow graph (C4)

pub mod domain;
pub mod infrastructure;

pub use domain::{DataFlowGraph, DefUse, Definition};
pub use infrastructure::ReachingDefinitions;
