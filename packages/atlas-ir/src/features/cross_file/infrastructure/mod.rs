//! Cross-file infrastructure

pub mod memory_graph_store;

pub use memory_graph_store::MemoryGraphStore;
