//! Chunking infrastructure

pub mod chunk_builder;
pub mod memory_stores;

pub use chunk_builder::ChunkBuilder;
pub use memory_stores::{MemoryLexicalStore, MemoryVectorStore};
