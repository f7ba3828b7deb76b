//! atlas-ir: multi-language code intelligence core
//!
//! Feature-first architecture:
//! - shared/      : common models (Node, Edge, Span, Occurrence)
//! - features/    : vertical slices (parsing → ir → cross-file →
//!                  flow/dfg/ssa → points-to/escape → taint →
//!                  cache/incremental → chunking)
//! - pipeline/    : orchestration (full + incremental builds)
//!
//! The pipeline is synchronous and data-parallel (rayon); async is
//! confined to type enrichment where adapter latency pays for it.

#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::module_inception)]
#![allow(clippy::new_without_default)]

/// Shared models and utilities
pub mod shared;

/// Feature modules
pub mod features;

/// Pipeline orchestration
pub mod pipeline;

/// Configuration system
pub mod config;

pub use config::AnalysisConfig;
pub use features::chunking::{Chunk, ChunkKind};
pub use features::cross_file::GlobalContext;
pub use features::heap_analysis::{EscapeInfo, EscapeState};
pub use features::incremental::ChangeSet;
pub use features::ir_build::{IRDocument, IrBuilder};
pub use features::parsing::{SourceRegistry, TreeSitterParser};
pub use features::taint::{RuleCatalog, TaintFinding};
pub use pipeline::{BuildResult, CancellationToken, PipelineOrchestrator};
pub use shared::models::{
    AtlasError, Edge, EdgeKind, ErrorKind, LanguageId, Node, NodeKind, Occurrence, RepoSnapshot,
    Result, SourceFile, Span,
};

/// Initialize the global rayon pool (sized to ~75% of cores unless
/// configured otherwise). Safe to call repeatedly; only the first call
/// builds the pool.
pub fn init_rayon(workers: usize) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let threads = workers.max(1);
        if let Err(err) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            // A pool already exists (embedding application owns it)
            tracing::debug!("rayon pool init skipped: {}", err);
        }
    });
}
