//! Taint analysis use case

use crate::config::TaintConfig;
use crate::features::cross_file::CallGraph;
use crate::features::ir_build::domain::IRDocument;
use crate::features::taint::domain::{FunctionSummary, RuleCatalog, TaintFinding};
use crate::features::taint::infrastructure::TaintEngine;
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub struct TaintAnalysis;

impl TaintAnalysis {
    /// Run the taint engine over resolved documents.
    ///
    /// The catalog is merged with the built-in rules and compiled once.
    pub fn run(
        documents: &[Arc<IRDocument>],
        call_graph: &CallGraph,
        catalog: &RuleCatalog,
        config: &TaintConfig,
    ) -> (Vec<TaintFinding>, FxHashMap<String, FunctionSummary>) {
        let compiled = RuleCatalog::builtin()
            .merged_with(catalog.clone())
            .compile();

        let bodies: Vec<_> = documents
            .iter()
            .flat_map(|d| d.bodies.iter().cloned())
            .collect();

        let engine = TaintEngine::new(&compiled, config);
        engine.analyze(&bodies, call_graph)
    }
}
