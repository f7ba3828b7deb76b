//! SSA infrastructure

mod ssa_builder;

pub use ssa_builder::SsaBuilder;
