//! Chunk data model
//!
//! Symbol-first hierarchical chunking:
//!     Repo → Module → File → Class → Function
//! Chunks are the unit of embedding and lexical indexing.

use super::ChunkKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ID format: `chunk:{repo_id}:{kind}:{fqn}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub repo_id: String,
    pub snapshot_id: String,

    pub kind: ChunkKind,
    pub fqn: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,

    /// Hash of the chunk's code text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub children: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Symbol node this chunk represents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_id: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, String>,

    /// Deterministic ordering tie-breaker within a file
    pub local_seq: u32,

    /// Soft-delete marker (hard delete happens at compaction)
    pub is_deleted: bool,
}

impl Chunk {
    pub fn make_id(repo_id: &str, kind: ChunkKind, fqn: &str) -> String {
        format!("chunk:{}:{}:{}", repo_id, kind.as_str(), fqn)
    }

    pub fn new(
        repo_id: impl Into<String>,
        snapshot_id: impl Into<String>,
        kind: ChunkKind,
        fqn: impl Into<String>,
    ) -> Self {
        let repo_id = repo_id.into();
        let fqn = fqn.into();
        Self {
            chunk_id: Self::make_id(&repo_id, kind, &fqn),
            repo_id,
            snapshot_id: snapshot_id.into(),
            kind,
            fqn,
            file_path: None,
            start_line: None,
            end_line: None,
            content_hash: None,
            parent_id: None,
            children: Vec::new(),
            language: None,
            symbol_id: None,
            attrs: HashMap::new(),
            local_seq: 0,
            is_deleted: false,
        }
    }
}

/// A batch of chunks, cache-friendly
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkSet {
    pub chunks: Vec<Chunk>,
}

impl crate::features::cache::EstimateSize for ChunkSet {
    fn estimated_size_bytes(&self) -> usize {
        self.chunks.len() * 384
    }
}
