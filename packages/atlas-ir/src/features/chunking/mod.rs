//! Chunker & index emitter (C10)

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::ChunkEmitter;
pub use domain::{Chunk, ChunkKind, ChunkSet};
pub use infrastructure::{ChunkBuilder, MemoryLexicalStore, MemoryVectorStore};
pub use ports::{LexicalStore, VectorStore};
