//! Taint findings

use super::rules::Severity;
use crate::shared::models::Span;
use serde::{Deserialize, Serialize};

/// One step of a witness path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub file: String,
    pub span: Span,
    /// What happened at this step ("source", "assign", "call", "sink")
    pub action: String,
}

impl TraceStep {
    pub fn new(file: impl Into<String>, span: Span, action: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            span,
            action: action.into(),
        }
    }
}

/// A source-to-sink taint finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaintFinding {
    pub rule_id: String,
    pub category: String,
    pub severity: Severity,
    pub source: TraceStep,
    pub sink: TraceStep,
    /// Minimal witnessing path, source first, sink last
    pub path: Vec<TraceStep>,
    pub sanitizers_encountered: Vec<String>,
    /// 0.0 - 1.0, decreasing with path length and unproven branches
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwe: Option<String>,
}

impl TaintFinding {
    /// Confidence: long paths and unproven branch crossings reduce it
    pub fn confidence_for(path_len: usize, unproven_branches: usize) -> f32 {
        let base = 1.0_f32;
        let length_penalty = 0.04 * path_len.saturating_sub(2) as f32;
        let branch_penalty = 0.08 * unproven_branches as f32;
        (base - length_penalty - branch_penalty).clamp(0.1, 1.0)
    }
}

/// Findings list with EstimateSize for caching
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingSet {
    pub findings: Vec<TaintFinding>,
}

impl crate::features::cache::EstimateSize for FindingSet {
    fn estimated_size_bytes(&self) -> usize {
        self.findings.len() * 512
    }
}
