//! SSA construction
//!
//! Phi nodes inserted at the iterated dominance frontier of every
//! definition, then a renaming walk over the dominator tree. The walk
//! uses explicit index stacks in a frame vector, never recursion over
//! user-controlled depth.

use crate::features::flow_graph::domain::{BlockId, FlowGraph, NO_BLOCK};
use crate::features::flow_graph::infrastructure::Dominators;
use crate::features::ir_build::domain::FunctionBody;
use crate::features::ssa::domain::{PhiNode, SsaGraph, SsaVariable, StmtVersions};
use crate::shared::models::{AtlasError, Result};
use rustc_hash::{FxHashMap, FxHashSet};

pub struct SsaBuilder;

impl SsaBuilder {
    pub fn build(body: &FunctionBody, graph: &FlowGraph, doms: &Dominators) -> SsaGraph {
        let mut ssa = SsaGraph {
            function_id: graph.function_id.clone(),
            ..Default::default()
        };

        // Blocks containing a definition, per variable
        let mut def_blocks: FxHashMap<String, FxHashSet<BlockId>> = FxHashMap::default();
        for param in &body.params {
            def_blocks.entry(param.clone()).or_default().insert(graph.entry);
        }
        for block in &graph.blocks {
            if !block.reachable {
                continue;
            }
            for &stmt_idx in &block.statements {
                for var in &graph.stmts[stmt_idx as usize].defs {
                    def_blocks.entry(var.clone()).or_default().insert(block.id);
                }
            }
        }

        // Phi insertion at the iterated dominance frontier
        let mut vars: Vec<&String> = def_blocks.keys().collect();
        vars.sort();
        let mut phi_index: FxHashMap<(BlockId, String), usize> = FxHashMap::default();
        for var in vars {
            let mut worklist: Vec<BlockId> = def_blocks[var].iter().copied().collect();
            worklist.sort_unstable();
            let mut has_phi: FxHashSet<BlockId> = FxHashSet::default();

            while let Some(block) = worklist.pop() {
                for &frontier_block in &doms.frontier[block as usize] {
                    if has_phi.insert(frontier_block) {
                        phi_index
                            .insert((frontier_block, var.clone()), ssa.phis.len());
                        ssa.phis.push(PhiNode {
                            block: frontier_block,
                            var: var.clone(),
                            version: 0,
                            args: Vec::new(),
                        });
                        if !def_blocks[var].contains(&frontier_block) {
                            worklist.push(frontier_block);
                        }
                    }
                }
            }
        }

        // Renaming walk
        let mut counters: FxHashMap<String, u32> = FxHashMap::default();
        let mut stacks: FxHashMap<String, Vec<u32>> = FxHashMap::default();
        let (succ, _) = graph.adjacency();

        struct Frame {
            block: BlockId,
            child: usize,
            pushed: Vec<String>,
        }

        let mut frames: Vec<Frame> = Vec::new();

        // Entry frame: parameters get version 0
        {
            let mut pushed = Vec::new();
            for param in &body.params {
                new_version(
                    param,
                    graph.entry,
                    &mut counters,
                    &mut stacks,
                    &mut ssa.variables,
                );
                pushed.push(param.clone());
            }
            frames.push(Frame {
                block: graph.entry,
                child: 0,
                pushed,
            });
            Self::enter_block(
                graph.entry,
                graph,
                &succ,
                &mut ssa,
                &phi_index,
                &mut counters,
                &mut stacks,
                &mut frames.last_mut().unwrap().pushed,
            );
        }

        while let Some(frame) = frames.last_mut() {
            let block = frame.block;
            let child_idx = frame.child;
            let children = &doms.children[block as usize];

            if child_idx < children.len() {
                frame.child += 1;
                let child = children[child_idx];
                let mut pushed = Vec::new();
                Self::enter_block(
                    child,
                    graph,
                    &succ,
                    &mut ssa,
                    &phi_index,
                    &mut counters,
                    &mut stacks,
                    &mut pushed,
                );
                frames.push(Frame {
                    block: child,
                    child: 0,
                    pushed,
                });
            } else {
                for var in &frame.pushed {
                    if let Some(stack) = stacks.get_mut(var) {
                        stack.pop();
                    }
                }
                frames.pop();
            }
        }

        ssa.stmt_versions.sort_by_key(|sv| sv.stmt);
        ssa
    }

    #[allow(clippy::too_many_arguments)]
    fn enter_block(
        block: BlockId,
        graph: &FlowGraph,
        succ: &[Vec<BlockId>],
        ssa: &mut SsaGraph,
        phi_index: &FxHashMap<(BlockId, String), usize>,
        counters: &mut FxHashMap<String, u32>,
        stacks: &mut FxHashMap<String, Vec<u32>>,
        pushed: &mut Vec<String>,
    ) {
        // Phi definitions first
        let mut phi_ids: Vec<usize> = ssa
            .phis
            .iter()
            .enumerate()
            .filter(|(_, p)| p.block == block)
            .map(|(i, _)| i)
            .collect();
        phi_ids.sort_by(|&a, &b| ssa.phis[a].var.cmp(&ssa.phis[b].var));
        for phi_id in phi_ids {
            let var = ssa.phis[phi_id].var.clone();
            let version = new_version(&var, block, counters, stacks, &mut ssa.variables);
            ssa.phis[phi_id].version = version;
            pushed.push(var);
        }

        // Statements: uses read the stack top, defs push a new version
        for &stmt_idx in &graph.blocks[block as usize].statements {
            let stmt = &graph.stmts[stmt_idx as usize];
            let mut sv = StmtVersions {
                stmt: stmt_idx,
                block,
                ..Default::default()
            };
            for var in &stmt.uses {
                if let Some(&version) = stacks.get(var).and_then(|s| s.last()) {
                    sv.uses.push((var.clone(), version));
                }
            }
            for var in &stmt.defs {
                let version = new_version(var, block, counters, stacks, &mut ssa.variables);
                sv.defs.push((var.clone(), version));
                pushed.push(var.clone());
            }
            ssa.stmt_versions.push(sv);
        }

        // Fill phi args of CFG successors
        for &s in &succ[block as usize] {
            let mut vars: Vec<String> = ssa
                .phis
                .iter()
                .filter(|p| p.block == s)
                .map(|p| p.var.clone())
                .collect();
            vars.sort();
            vars.dedup();
            for var in vars {
                if let Some(&version) = stacks.get(&var).and_then(|st| st.last()) {
                    if let Some(&phi_id) = phi_index.get(&(s, var.clone())) {
                        ssa.phis[phi_id].args.push((block, version));
                    }
                }
            }
        }
    }

    /// I4: every use is reached by exactly one version whose definition
    /// site (statement or phi) dominates the use
    pub fn validate(ssa: &SsaGraph, doms: &Dominators) -> Result<()> {
        for sv in &ssa.stmt_versions {
            for (var, version) in &sv.uses {
                let defined_by_stmt = ssa
                    .variables
                    .iter()
                    .any(|v| &v.name == var && v.version == *version && {
                        v.def_block != NO_BLOCK && doms.dominates(v.def_block, sv.block)
                    });
                if !defined_by_stmt {
                    return Err(AtlasError::invariant(format!(
                        "use of {}_{} in block {} not dominated by its definition",
                        var, version, sv.block
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Mint the next version of a variable: bump the counter, push onto
/// the rename stack, record the definition site
fn new_version(
    var: &str,
    block: BlockId,
    counters: &mut FxHashMap<String, u32>,
    stacks: &mut FxHashMap<String, Vec<u32>>,
    variables: &mut Vec<SsaVariable>,
) -> u32 {
    let counter = counters.entry(var.to_string()).or_insert(0);
    let version = *counter;
    *counter += 1;
    stacks.entry(var.to_string()).or_default().push(version);
    variables.push(SsaVariable {
        name: var.to_string(),
        version,
        def_block: block,
    });
    version
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flow_graph::BfgBuilder;
    use crate::features::ir_build::IrBuilder;
    use crate::features::parsing::{SourceParser, TreeSitterParser};
    use crate::shared::models::{LanguageId, SourceFile};

    fn ssa_of(content: &str) -> (FunctionBody, FlowGraph, Dominators, SsaGraph) {
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
        let doms = Dominators::compute(&graph);
        let ssa = SsaBuilder::build(&body, &graph, &doms);
        (body, graph, doms, ssa)
    }

    #[test]
    fn test_versions_increment_per_def() {
        let (_, _, _, ssa) = ssa_of("def f(x):\n    y = 1\n    y = 2\n    return y\n");
        let versions: Vec<u32> = ssa.versions_of("y").map(|v| v.version).collect();
        assert_eq!(versions, vec![0, 1]);

        // The return reads the latest version
        let ret = ssa
            .stmt_versions
            .iter()
            .rev()
            .find(|sv| sv.uses.iter().any(|(n, _)| n == "y"))
            .unwrap();
        assert!(ret.uses.contains(&("y".to_string(), 1)));
    }

    #[test]
    fn test_phi_at_branch_join() {
        let (_, _, doms, ssa) = ssa_of(
            "def f(x):\n    if x:\n        y = 1\n    else:\n        y = 2\n    return y\n",
        );

        let phi = ssa.phis.iter().find(|p| p.var == "y").unwrap();
        assert_eq!(phi.args.len(), 2);
        let incoming: Vec<u32> = phi.args.iter().map(|(_, v)| *v).collect();
        assert!(incoming.contains(&0));
        assert!(incoming.contains(&1));

        SsaBuilder::validate(&ssa, &doms).unwrap();
    }

    #[test]
    fn test_loop_phi() {
        let (_, _, doms, ssa) =
            ssa_of("def f(x):\n    while x:\n        x = x - 1\n    return x\n");

        // Loop-carried variable needs a phi at the header
        assert!(ssa.phis.iter().any(|p| p.var == "x"));
        SsaBuilder::validate(&ssa, &doms).unwrap();
    }

    #[test]
    fn test_dissolve_matches_original_def_use(){
        let (_, graph, _, ssa) = ssa_of(
            "def f(x):\n    if x:\n        y = 1\n    else:\n        y = 2\n    return y\n",
        );

        for (stmt_idx, defs, uses) in ssa.dissolve() {
            let stmt = &graph.stmts[stmt_idx as usize];
            assert_eq!(stmt.defs, defs);
            for used in &uses {
                assert!(stmt.uses.contains(used));
            }
        }
    }
}
