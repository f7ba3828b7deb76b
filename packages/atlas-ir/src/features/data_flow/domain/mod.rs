//! Data flow domain models

mod dfg;

pub use dfg::{DataFlowGraph, DefUse, Definition};
