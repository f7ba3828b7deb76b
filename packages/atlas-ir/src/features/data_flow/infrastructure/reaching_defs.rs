//! Reaching definitions
//!
//! Per-block gen/kill over the statement arena, iterated across CFG
//! edges until fixpoint, then def-use edges materialized per block.
//! Sets are dense bitsets over definition ids.

use crate::features::data_flow::domain::{DataFlowGraph, DefUse, Definition};
use crate::features::flow_graph::domain::FlowGraph;
use crate::features::ir_build::domain::FunctionBody;
use crate::shared::utils::DenseBitSet;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

pub struct ReachingDefinitions;

impl ReachingDefinitions {
    pub fn compute(body: &FunctionBody, graph: &FlowGraph) -> DataFlowGraph {
        let mut dfg = DataFlowGraph {
            function_id: graph.function_id.clone(),
            ..Default::default()
        };

        // Parameters define at entry
        let mut param_defs: Vec<u32> = Vec::new();
        for param in &body.params {
            let id = dfg.definitions.len() as u32;
            dfg.definitions.push(Definition {
                id,
                var: param.clone(),
                block: graph.entry,
                stmt: u32::MAX,
                span: body.span,
            });
            param_defs.push(id);
        }

        // Definition per (block, stmt, var)
        for block in &graph.blocks {
            for &stmt_idx in &block.statements {
                let stmt = &graph.stmts[stmt_idx as usize];
                for var in &stmt.defs {
                    let id = dfg.definitions.len() as u32;
                    dfg.definitions.push(Definition {
                        id,
                        var: var.clone(),
                        block: block.id,
                        stmt: stmt_idx,
                        span: stmt.span,
                    });
                }
            }
        }

        let def_count = dfg.definitions.len();
        let mut defs_of_var: FxHashMap<&str, Vec<u32>> = FxHashMap::default();
        for def in &dfg.definitions {
            defs_of_var.entry(def.var.as_str()).or_default().push(def.id);
        }

        let n = graph.blocks.len();
        let mut gen = vec![DenseBitSet::new(def_count); n];
        let mut kill = vec![DenseBitSet::new(def_count); n];

        // Entry generates parameter defs
        for &id in &param_defs {
            gen[graph.entry as usize].insert(id);
        }

        for block in &graph.blocks {
            let b = block.id as usize;
            // Walk in order; a later def of the same var kills earlier
            // ones generated in this block
            let mut last_def: FxHashMap<&str, u32> = FxHashMap::default();
            for &stmt_idx in &block.statements {
                let stmt = &graph.stmts[stmt_idx as usize];
                for var in &stmt.defs {
                    if let Some(&id) = find_def(&dfg, block.id, stmt_idx, var) {
                        last_def.insert(var.as_str(), id);
                    }
                }
            }
            for (&var, &id) in &last_def {
                gen[b].insert(id);
                for &other in defs_of_var.get(var).into_iter().flatten() {
                    if other != id {
                        kill[b].insert(other);
                    }
                }
            }
        }

        // Fixpoint over CFG edges
        let (succ, pred) = graph.adjacency();
        let mut input = vec![DenseBitSet::new(def_count); n];
        let mut output = vec![DenseBitSet::new(def_count); n];
        let mut worklist: VecDeque<u32> = graph.blocks.iter().map(|b| b.id).collect();
        let mut queued = vec![true; n];

        while let Some(b) = worklist.pop_front() {
            queued[b as usize] = false;

            let mut new_in = DenseBitSet::new(def_count);
            for &p in &pred[b as usize] {
                new_in.union_with(&output[p as usize]);
            }

            let mut new_out = new_in.clone();
            new_out.subtract(&kill[b as usize]);
            new_out.union_with(&gen[b as usize]);

            input[b as usize] = new_in;
            if new_out != output[b as usize] {
                output[b as usize] = new_out;
                for &s in &succ[b as usize] {
                    if !queued[s as usize] {
                        queued[s as usize] = true;
                        worklist.push_back(s);
                    }
                }
            }
        }

        // Def-use edges: per block, live defs seeded from IN
        for block in &graph.blocks {
            let b = block.id as usize;
            let mut live: FxHashMap<&str, Vec<u32>> = FxHashMap::default();
            for id in input[b].iter() {
                let def = &dfg.definitions[id as usize];
                live.entry(def.var.as_str()).or_default().push(id);
            }

            let mut edges = Vec::new();
            for &stmt_idx in &block.statements {
                let stmt = &graph.stmts[stmt_idx as usize];
                for var in &stmt.uses {
                    for &def_id in live.get(var.as_str()).into_iter().flatten() {
                        edges.push(DefUse {
                            def: def_id,
                            use_block: block.id,
                            use_stmt: stmt_idx,
                            var: var.clone(),
                            span: stmt.span,
                        });
                    }
                }
                for var in &stmt.defs {
                    if let Some(&id) = find_def(&dfg, block.id, stmt_idx, var) {
                        live.insert(
                            dfg.definitions[id as usize].var.as_str(),
                            vec![id],
                        );
                    }
                }
            }
            dfg.edges.extend(edges);
        }

        dfg.edges
            .sort_by_key(|e| (e.def, e.use_block, e.use_stmt));
        dfg
    }
}

fn find_def<'a>(
    dfg: &'a DataFlowGraph,
    block: u32,
    stmt: u32,
    var: &str,
) -> Option<&'a u32> {
    dfg.definitions
        .iter()
        .find(|d| d.block == block && d.stmt == stmt && d.var == var)
        .map(|d| &d.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flow_graph::BfgBuilder;
    use crate::features::ir_build::IrBuilder;
    use crate::features::parsing::{SourceParser, TreeSitterParser};
    use crate::shared::models::{LanguageId, SourceFile};

    fn dfg_of(content: &str) -> (FunctionBody, FlowGraph, DataFlowGraph) {
        let file = SourceFile::new("m.py", LanguageId::Python, content);
        let tree = TreeSitterParser::new().parse(&file).unwrap();
        let doc = IrBuilder::new("repo", "snap").build(&file, &tree);
        let body = doc
            .bodies
            .iter()
            .find(|b| b.function_fqn == "m.f")
            .unwrap()
            .clone();
        let graph = BfgBuilder::build(&body);
        let dfg = ReachingDefinitions::compute(&body, &graph);
        (body, graph, dfg)
    }

    #[test]
    fn test_def_reaches_use() {
        let (_, _, dfg) = dfg_of("def f(x):\n    y = x + 1\n    return y\n");

        let y_def = dfg.defs_of("y").next().unwrap().id;
        assert!(dfg.uses_of_def(y_def).count() >= 1);

        // Parameter def reaches its use
        let x_def = dfg.defs_of("x").next().unwrap().id;
        assert!(dfg.uses_of_def(x_def).count() >= 1);
    }

    #[test]
    fn test_redefinition_kills() {
        let (_, _, dfg) = dfg_of("def f(x):\n    y = 1\n    y = 2\n    return y\n");

        let defs: Vec<_> = dfg.defs_of("y").collect();
        assert_eq!(defs.len(), 2);

        // Only the second def reaches the return
        let first = defs[0].id;
        let second = defs[1].id;
        assert_eq!(dfg.uses_of_def(first).count(), 0);
        assert_eq!(dfg.uses_of_def(second).count(), 1);
    }

    #[test]
    fn test_branch_defs_both_reach_join() {
        let (_, _, dfg) = dfg_of(
            "def f(x):\n    if x:\n        y = 1\n    else:\n        y = 2\n    return y\n",
        );

        let defs: Vec<_> = dfg.defs_of("y").map(|d| d.id).collect();
        assert_eq!(defs.len(), 2);
        for def in defs {
            assert_eq!(dfg.uses_of_def(def).count(), 1, "both defs reach the join use");
        }
    }

    #[test]
    fn test_loop_carried_def_reaches_header() {
        let (_, _, dfg) = dfg_of("def f(x):\n    while x:\n        x = x - 1\n    return x\n");

        // The body def of x flows back to the header use
        let body_def = dfg
            .defs_of("x")
            .find(|d| d.stmt != u32::MAX)
            .unwrap()
            .id;
        assert!(dfg.uses_of_def(body_def).count() >= 1);
    }
}
