//! Function summaries for interprocedural taint
//!
//! Computed bottom-up over the SCC condensation and reused at every
//! call site. Flows are boolean sets, so per-SCC iteration converges.

use super::finding::TraceStep;
use serde::{Deserialize, Serialize};

/// A source label introduced inside a function and flowing to its return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnedSource {
    pub label: String,
    pub rule_idx: usize,
    pub trace: Vec<TraceStep>,
}

/// A parameter whose taint reaches a sink inside the function (directly
/// or through deeper calls)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSink {
    pub param: usize,
    pub sink_rule_idx: usize,
    /// Labels the sink fires on (empty = any)
    pub labels: Vec<String>,
    /// Trace inside the callee, ending at the sink
    pub trace: Vec<TraceStep>,
    /// Call-string depth this entry was composed through
    pub depth: usize,
}

/// Parameter-to-output flow summary of one function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub function_id: String,
    pub function_fqn: String,
    /// Parameter indices whose taint flows to the return value
    pub param_to_return: Vec<usize>,
    /// (from, to) parameter flows (aliasing through the callee)
    pub param_to_param: Vec<(usize, usize)>,
    pub returned_sources: Vec<ReturnedSource>,
    pub param_sinks: Vec<ParamSink>,
    /// Sanitizer rule ids applied on any internal path
    pub sanitizers_applied: Vec<String>,
}

impl crate::features::cache::EstimateSize for FunctionSummary {
    fn estimated_size_bytes(&self) -> usize {
        256 + self.param_sinks.len() * 128 + self.returned_sources.len() * 128
    }
}

impl FunctionSummary {
    pub fn new(function_id: impl Into<String>, function_fqn: impl Into<String>) -> Self {
        Self {
            function_id: function_id.into(),
            function_fqn: function_fqn.into(),
            ..Default::default()
        }
    }

    /// Merge another computation of the same function; returns true on
    /// change (SCC fixpoint driver)
    pub fn merge(&mut self, other: FunctionSummary) -> bool {
        let mut changed = false;
        for p in other.param_to_return {
            if !self.param_to_return.contains(&p) {
                self.param_to_return.push(p);
                changed = true;
            }
        }
        for pair in other.param_to_param {
            if !self.param_to_param.contains(&pair) {
                self.param_to_param.push(pair);
                changed = true;
            }
        }
        for source in other.returned_sources {
            if !self
                .returned_sources
                .iter()
                .any(|s| s.label == source.label && s.rule_idx == source.rule_idx)
            {
                self.returned_sources.push(source);
                changed = true;
            }
        }
        for sink in other.param_sinks {
            if !self
                .param_sinks
                .iter()
                .any(|s| s.param == sink.param && s.sink_rule_idx == sink.sink_rule_idx)
            {
                self.param_sinks.push(sink);
                changed = true;
            }
        }
        for s in other.sanitizers_applied {
            if !self.sanitizers_applied.contains(&s) {
                self.sanitizers_applied.push(s);
                changed = true;
            }
        }
        changed
    }
}
