//! Data flow infrastructure

mod reaching_defs;

pub use reaching_defs::ReachingDefinitions;
