//! In-memory index stores (reference port implementations)

use crate::features::chunking::domain::Chunk;
use crate::features::chunking::ports::{LexicalStore, VectorStore};
use crate::shared::models::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

struct VectorRecord {
    chunk: Chunk,
    deleted: bool,
}

/// In-memory vector store with soft-delete and compaction
#[derive(Default)]
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.records.read().values().filter(|r| !r.deleted).count()
    }

    pub fn soft_deleted_count(&self) -> usize {
        self.records.read().values().filter(|r| r.deleted).count()
    }
}

impl VectorStore for MemoryVectorStore {
    fn index(&self, chunks: &[Chunk]) -> Result<()> {
        self.upsert(chunks)
    }

    fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        let mut records = self.records.write();
        for chunk in chunks {
            records.insert(
                chunk.chunk_id.clone(),
                VectorRecord {
                    chunk: chunk.clone(),
                    deleted: false,
                },
            );
        }
        Ok(())
    }

    fn delete(&self, chunk_ids: &[String]) -> Result<()> {
        let mut records = self.records.write();
        for id in chunk_ids {
            if let Some(record) = records.get_mut(id) {
                record.deleted = true;
            }
        }
        Ok(())
    }

    fn compact(&self) -> Result<usize> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| !r.deleted);
        Ok(before - records.len())
    }

    fn search(&self, _query: &[f32], limit: usize) -> Result<Vec<(String, f32)>> {
        // Reference implementation: no embeddings, stable id order
        let records = self.records.read();
        let mut ids: Vec<&String> = records
            .iter()
            .filter(|(_, r)| !r.deleted)
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        Ok(ids
            .into_iter()
            .take(limit)
            .map(|id| (id.clone(), 0.0))
            .collect())
    }
}

/// In-memory lexical store
#[derive(Default)]
pub struct MemoryLexicalStore {
    records: RwLock<HashMap<String, Chunk>>,
}

impl MemoryLexicalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl LexicalStore for MemoryLexicalStore {
    fn index(&self, chunks: &[Chunk]) -> Result<()> {
        let mut records = self.records.write();
        for chunk in chunks {
            records.insert(chunk.chunk_id.clone(), chunk.clone());
        }
        Ok(())
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let records = self.records.read();
        let mut hits: Vec<String> = records
            .values()
            .filter(|c| c.fqn.contains(query))
            .map(|c| c.chunk_id.clone())
            .collect();
        hits.sort();
        hits.truncate(limit);
        Ok(hits)
    }

    fn delete(&self, chunk_ids: &[String]) -> Result<()> {
        let mut records = self.records.write();
        for id in chunk_ids {
            records.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::chunking::domain::ChunkKind;

    fn chunk(fqn: &str) -> Chunk {
        Chunk::new("repo", "snap", ChunkKind::Function, fqn)
    }

    #[test]
    fn test_soft_delete_then_compact() {
        let store = MemoryVectorStore::new();
        store.index(&[chunk("a.f"), chunk("a.g")]).unwrap();
        assert_eq!(store.active_count(), 2);

        store
            .delete(&[Chunk::make_id("repo", ChunkKind::Function, "a.f")])
            .unwrap();
        assert_eq!(store.active_count(), 1);
        assert_eq!(store.soft_deleted_count(), 1);

        let removed = store.compact().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.soft_deleted_count(), 0);
    }

    #[test]
    fn test_lexical_roundtrip() {
        let store = MemoryLexicalStore::new();
        store.index(&[chunk("pkg.mod.handler")]).unwrap();
        let hits = store.search("handler", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }
}
