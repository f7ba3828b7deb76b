//! Flow graph infrastructure

pub mod bfg_builder;
pub mod dominators;

pub use bfg_builder::BfgBuilder;
pub use dominators::Dominators;
