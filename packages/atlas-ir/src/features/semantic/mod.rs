//! Semantic IR assembly (C4)
//!
//! Bundles BFG/CFG, dominators, DFG, and SSA per function. Runs purely
//! on structural IR; type information is never required.

use crate::features::data_flow::{DataFlowGraph, ReachingDefinitions};
use crate::features::flow_graph::{BfgBuilder, Dominators, FlowGraph};
use crate::features::ir_build::domain::IRDocument;
use crate::features::ssa::{SsaBuilder, SsaGraph};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Semantic IR of one function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticIr {
    pub function_id: String,
    pub cfg: FlowGraph,
    pub dominators: Dominators,
    pub dfg: DataFlowGraph,
    pub ssa: SsaGraph,
}

impl crate::features::cache::EstimateSize for SemanticIr {
    fn estimated_size_bytes(&self) -> usize {
        self.cfg.blocks.len() * 128
            + self.cfg.stmts.len() * 256
            + self.dfg.definitions.len() * 64
            + self.dfg.edges.len() * 64
            + self.ssa.variables.len() * 48
    }
}

/// Build SemanticIr for every function body of a document set, in
/// parallel over functions
pub fn build_semantic_irs(documents: &[Arc<IRDocument>]) -> HashMap<String, Arc<SemanticIr>> {
    documents
        .par_iter()
        .flat_map(|doc| {
            doc.bodies
                .par_iter()
                .map(move |body| {
                    let cfg = BfgBuilder::build(body);
                    let dominators = Dominators::compute(&cfg);
                    let dfg = ReachingDefinitions::compute(body, &cfg);
                    let ssa = SsaBuilder::build(body, &cfg, &dominators);
                    (
                        body.function_id.clone(),
                        Arc::new(SemanticIr {
                            function_id: body.function_id.clone(),
                            cfg,
                            dominators,
                            dfg,
                            ssa,
                        }),
                    )
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir_build::IrBuilder;
    use crate::features::parsing::{SourceParser, TreeSitterParser};
    use crate::shared::models::{LanguageId, SourceFile};

    #[test]
    fn test_semantic_ir_per_function() {
        let file = SourceFile::new(
            "m.py",
            LanguageId::Python,
            "def f(x):\n    return x\n\ndef g(y):\n    return y\n",
        );
        let tree = TreeSitterParser::new().parse(&file).unwrap();
        let doc = Arc::new(IrBuilder::new("repo", "snap").build(&file, &tree));

        let irs = build_semantic_irs(&[doc.clone()]);

        // One per function plus the module body
        assert_eq!(irs.len(), doc.bodies.len());
        for ir in irs.values() {
            assert!(ir.cfg.block_count() >= 3);
        }
    }
}
