//! Analysis configuration
//!
//! A single configuration object covers every stage. All fields carry
//! serde defaults so partial configs deserialize cleanly, and
//! `config_hash()` folds the canonical JSON form into every cache key:
//! changing any stage option invalidates exactly the artifacts built
//! under the old options.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Incremental build depth mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncrementalMode {
    Fast,
    Balanced,
    Deep,
}

impl IncrementalMode {
    /// BFS depth bound for affected-set expansion (None = unbounded)
    pub fn depth_bound(&self) -> Option<usize> {
        match self {
            IncrementalMode::Fast => Some(1),
            IncrementalMode::Balanced => Some(3),
            IncrementalMode::Deep => None,
        }
    }

    pub fn escalated(&self) -> Self {
        match self {
            IncrementalMode::Fast => IncrementalMode::Balanced,
            IncrementalMode::Balanced | IncrementalMode::Deep => IncrementalMode::Deep,
        }
    }
}

/// Chunk granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkGranularity {
    File,
    Function,
    Statement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Worker thread count; 0 means 75% of available cores
    pub workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { workers: 0 }
    }
}

impl ParallelConfig {
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::cmp::max(1, (num_cpus::get() * 3) / 4)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTierConfig {
    pub enabled: bool,
    /// Max entries (L0/L1) or bytes (L2)
    pub max_size: u64,
    /// Backing directory (L2 only)
    pub path: Option<PathBuf>,
    /// Time-to-live in seconds (0 = no expiry)
    pub ttl_s: u64,
}

impl Default for CacheTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 10_000,
            path: None,
            ttl_s: 3600,
        }
    }
}

impl CacheTierConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_s.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub l0: CacheTierConfig,
    pub l1: CacheTierConfig,
    pub l2: CacheTierConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeEnrichConfig {
    pub max_concurrent: usize,
    pub timeout_s: u64,
    /// Fail the stage on first adapter error instead of degrading
    pub fail_fast: bool,
}

impl Default for TypeEnrichConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            timeout_s: 30,
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    pub enable_escape: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            enable_escape: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaintConfig {
    /// Call-string context bound; deeper contexts merge
    pub context_k: usize,
    pub path_sensitive: bool,
    pub smt_enabled: bool,
    /// Witness paths longer than this are truncated
    pub max_path_len: usize,
    /// Access-path field depth before widening to the whole base
    pub max_field_depth: usize,
}

impl Default for TaintConfig {
    fn default() -> Self {
        Self {
            context_k: 2,
            path_sensitive: false,
            smt_enabled: false,
            max_path_len: 24,
            max_field_depth: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalConfig {
    pub mode: IncrementalMode,
    /// Affected-set size that triggers automatic mode escalation
    pub escalation_threshold: usize,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self {
            mode: IncrementalMode::Balanced,
            escalation_threshold: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Soft-deleted records tolerated before compaction
    pub soft_delete_threshold: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            soft_delete_threshold: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub granularity: ChunkGranularity,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            granularity: ChunkGranularity::Function,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Files above this size are registered but not parsed
    pub max_file_bytes: u64,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Top-level analysis configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub parallel: ParallelConfig,
    pub parsing: ParsingConfig,
    pub cache: CacheConfig,
    pub type_enrich: TypeEnrichConfig,
    pub heap: HeapConfig,
    pub taint: TaintConfig,
    pub incremental: IncrementalConfig,
    pub vector: VectorConfig,
    pub chunk: ChunkConfig,
}

impl AnalysisConfig {
    /// Blake3 of the canonical JSON form; part of every cache key
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_vec(self).expect("config serializes");
        let hex = blake3::hash(&json).to_hex();
        hex.as_str()[..16].to_string()
    }

    pub fn from_json_str(s: &str) -> crate::shared::models::Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| crate::shared::models::AtlasError::config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_hash_changes_with_options() {
        let base = AnalysisConfig::default();
        let mut deep = AnalysisConfig::default();
        deep.incremental.mode = IncrementalMode::Deep;

        assert_eq!(base.config_hash(), AnalysisConfig::default().config_hash());
        assert_ne!(base.config_hash(), deep.config_hash());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = AnalysisConfig::from_json_str(r#"{"taint": {"context_k": 3}}"#).unwrap();
        assert_eq!(cfg.taint.context_k, 3);
        assert_eq!(cfg.taint.max_path_len, 24);
        assert_eq!(cfg.type_enrich.max_concurrent, 10);
    }

    #[test]
    fn test_mode_escalation() {
        assert_eq!(
            IncrementalMode::Fast.escalated(),
            IncrementalMode::Balanced
        );
        assert_eq!(IncrementalMode::Deep.escalated(), IncrementalMode::Deep);
        assert_eq!(IncrementalMode::Fast.depth_bound(), Some(1));
        assert_eq!(IncrementalMode::Deep.depth_bound(), None);
    }
}
