//! Chunking domain models

mod chunk;
mod chunk_kind;

pub use chunk::{Chunk, ChunkSet};
pub use chunk_kind::ChunkKind;
