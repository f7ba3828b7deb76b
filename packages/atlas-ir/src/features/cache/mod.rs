//! Tiered content-addressed cache (C8)
//!
//! Three tiers: L0 session cache (lock-free, fast path), L1 adaptive
//! cache (TTL + size-aware eviction), L2 disk cache (content-addressed,
//! mmap'd, validated). Every artifact is keyed by
//! (artifact-kind, subject-id, fingerprint, stage-config-hash).

pub mod bloom;
pub mod dependency_graph;
mod error;
mod fingerprint;
pub mod l0_session_cache;
pub mod l1_adaptive_cache;
pub mod l2_disk_cache;
pub mod metrics;
pub mod tiered_cache;
mod types;

pub use dependency_graph::{AffectedSet, DependencyGraph, FileNode};
pub use error::{CacheError, CacheResult};
pub use l0_session_cache::SessionCache;
pub use l1_adaptive_cache::{AdaptiveCache, EstimateSize};
pub use l2_disk_cache::DiskCache;
pub use tiered_cache::TieredCache;
pub use types::{ArtifactKind, CacheKey, FileMetadata, Fingerprint, SubjectKey};
