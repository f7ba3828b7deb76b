//! SSA domain models

mod ssa_graph;

pub use ssa_graph::{PhiNode, SsaGraph, SsaVariable, StmtVersions};
