//! SSA construction (C4)

pub mod domain;
pub mod infrastructure;

pub use domain::{PhiNode, SsaGraph, SsaVariable, StmtVersions};
pub use infrastructure::SsaBuilder;
