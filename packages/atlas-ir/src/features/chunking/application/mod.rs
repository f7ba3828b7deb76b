//! Chunk emission use case
//!
//! Streams chunks to the lexical and vector ports in batches without
//! retaining them; soft deletions are counted and compaction triggers
//! past the configured threshold.

use crate::config::VectorConfig;
use crate::features::chunking::domain::Chunk;
use crate::features::chunking::ports::{LexicalStore, VectorStore};
use crate::shared::models::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BATCH_SIZE: usize = 256;

pub struct ChunkEmitter {
    vector: Arc<dyn VectorStore>,
    lexical: Arc<dyn LexicalStore>,
    config: VectorConfig,
    soft_deletes: AtomicUsize,
}

impl ChunkEmitter {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        lexical: Arc<dyn LexicalStore>,
        config: VectorConfig,
    ) -> Self {
        Self {
            vector,
            lexical,
            config,
            soft_deletes: AtomicUsize::new(0),
        }
    }

    /// Stream chunks to both stores; returns the emitted count
    pub fn emit(&self, chunks: impl Iterator<Item = Chunk>) -> Result<usize> {
        let mut batch: Vec<Chunk> = Vec::with_capacity(BATCH_SIZE);
        let mut total = 0usize;

        for chunk in chunks {
            batch.push(chunk);
            if batch.len() >= BATCH_SIZE {
                total += self.flush(&batch)?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            total += self.flush(&batch)?;
        }

        Ok(total)
    }

    fn flush(&self, batch: &[Chunk]) -> Result<usize> {
        self.vector.upsert(batch)?;
        self.lexical.index(batch)?;
        Ok(batch.len())
    }

    /// Soft-delete chunks; compaction runs after the threshold
    pub fn delete(&self, chunk_ids: &[String]) -> Result<()> {
        self.vector.delete(chunk_ids)?;
        self.lexical.delete(chunk_ids)?;

        let total = self
            .soft_deletes
            .fetch_add(chunk_ids.len(), Ordering::SeqCst)
            + chunk_ids.len();
        if total >= self.config.soft_delete_threshold {
            let removed = self.vector.compact()?;
            tracing::debug!("vector compaction removed {} records", removed);
            self.soft_deletes.store(0, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::chunking::domain::ChunkKind;
    use crate::features::chunking::infrastructure::memory_stores::{
        MemoryLexicalStore, MemoryVectorStore,
    };

    fn emitter(threshold: usize) -> (ChunkEmitter, Arc<MemoryVectorStore>) {
        let vector = Arc::new(MemoryVectorStore::new());
        let lexical = Arc::new(MemoryLexicalStore::new());
        (
            ChunkEmitter::new(
                Arc::clone(&vector) as Arc<dyn VectorStore>,
                lexical,
                VectorConfig {
                    soft_delete_threshold: threshold,
                },
            ),
            vector,
        )
    }

    fn chunk(fqn: &str) -> Chunk {
        Chunk::new("repo", "snap", ChunkKind::Function, fqn)
    }

    #[test]
    fn test_emit_streams_batches() {
        let (emitter, vector) = emitter(1000);
        let chunks: Vec<Chunk> = (0..600).map(|i| chunk(&format!("m.f{}", i))).collect();

        let emitted = emitter.emit(chunks.into_iter()).unwrap();
        assert_eq!(emitted, 600);
        assert_eq!(vector.active_count(), 600);
    }

    #[test]
    fn test_soft_delete_triggers_compaction_at_threshold() {
        let (emitter, vector) = emitter(3);
        emitter
            .emit((0..5).map(|i| chunk(&format!("m.f{}", i))))
            .unwrap();

        // Below threshold: soft-deleted records remain
        emitter
            .delete(&[Chunk::make_id("repo", ChunkKind::Function, "m.f0")])
            .unwrap();
        assert_eq!(vector.soft_deleted_count(), 1);

        // Crossing the threshold compacts
        emitter
            .delete(&[
                Chunk::make_id("repo", ChunkKind::Function, "m.f1"),
                Chunk::make_id("repo", ChunkKind::Function, "m.f2"),
            ])
            .unwrap();
        assert_eq!(vector.soft_deleted_count(), 0);
        assert_eq!(vector.active_count(), 2);
    }
}
