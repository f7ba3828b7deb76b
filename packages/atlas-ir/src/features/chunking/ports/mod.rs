//! Index store ports

use crate::features::chunking::domain::Chunk;
use crate::shared::models::Result;

/// Vector index port.
///
/// Deletion is soft (mark inactive); implementations hard-delete only
/// during `compact`, which the emitter triggers after the configured
/// number of soft deletions.
pub trait VectorStore: Send + Sync {
    fn index(&self, chunks: &[Chunk]) -> Result<()>;

    fn upsert(&self, chunks: &[Chunk]) -> Result<()>;

    /// Soft-delete by chunk id
    fn delete(&self, chunk_ids: &[String]) -> Result<()>;

    /// Hard-delete soft-deleted records; returns how many were removed
    fn compact(&self) -> Result<usize>;

    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(String, f32)>>;
}

/// Lexical index port
pub trait LexicalStore: Send + Sync {
    fn index(&self, chunks: &[Chunk]) -> Result<()>;

    fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    fn delete(&self, chunk_ids: &[String]) -> Result<()>;
}
