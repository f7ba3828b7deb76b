//! Build result and error summary

use crate::features::cross_file::GlobalContext;
use crate::features::heap_analysis::EscapeInfo;
use crate::features::incremental::{ChangeSet, FileManifest};
use crate::features::ir_build::domain::IRDocument;
use crate::features::points_to::PointsToGraph;
use crate::features::semantic::SemanticIr;
use crate::features::taint::{FunctionSummary, TaintFinding};
use crate::shared::models::RepoSnapshot;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-file errors collected during a run; a file-level failure never
/// fails the whole build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// (file, error message)
    pub file_errors: Vec<(String, String)>,
    pub degraded_files: Vec<String>,
    /// Set when a fatal invariant violation aborted the snapshot
    pub poisoned: bool,
}

impl ErrorSummary {
    pub fn record_file_error(&mut self, file: impl Into<String>, message: impl Into<String>) {
        self.file_errors.push((file.into(), message.into()));
    }

    pub fn record_degraded(&mut self, file: impl Into<String>) {
        self.degraded_files.push(file.into());
    }

    pub fn is_clean(&self) -> bool {
        self.file_errors.is_empty() && self.degraded_files.is_empty() && !self.poisoned
    }
}

/// Run statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildStats {
    pub files_total: usize,
    pub files_analyzed: usize,
    pub files_from_cache: usize,
    pub functions_analyzed: usize,
    pub findings: usize,
    pub chunks_emitted: usize,
    pub duration_ms: u64,
}

/// Everything a build produces
#[derive(Debug)]
pub struct BuildResult {
    pub snapshot: RepoSnapshot,
    /// file path → resolved document
    pub documents: HashMap<String, Arc<IRDocument>>,
    pub context: Arc<GlobalContext>,
    /// function node id → semantic IR
    pub semantic: HashMap<String, Arc<SemanticIr>>,
    pub points_to: Arc<PointsToGraph>,
    /// function node id → escape classification
    pub escape: HashMap<String, EscapeInfo>,
    pub findings: Vec<TaintFinding>,
    pub summaries: FxHashMap<String, FunctionSummary>,
    /// What this build saw on disk (input to the next incremental run)
    pub manifest: FileManifest,
    /// Change set that drove an incremental build (empty for full)
    pub change_set: ChangeSet,
    pub errors: ErrorSummary,
    pub stats: BuildStats,
}
