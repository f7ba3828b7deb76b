//! Dominator tree and dominance frontier
//!
//! Cooper-Harvey-Kennedy "A Simple, Fast Dominance Algorithm": idom
//! computation by intersection over reverse postorder, iterated to
//! fixpoint. Iteration handles irreducible control flow without a
//! special case. Everything runs on u32 index arrays.

use crate::features::flow_graph::domain::{BlockId, FlowGraph, NO_BLOCK};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dominators {
    /// Immediate dominator per block (NO_BLOCK for unreachable blocks;
    /// the entry dominates itself)
    pub idom: Vec<BlockId>,
    /// Reverse postorder over reachable blocks
    pub rpo: Vec<BlockId>,
    /// Dominance frontier per block
    pub frontier: Vec<Vec<BlockId>>,
    /// Dominator-tree children per block
    pub children: Vec<Vec<BlockId>>,
}

impl Dominators {
    pub fn compute(graph: &FlowGraph) -> Self {
        let n = graph.blocks.len();
        let (succ, pred) = graph.adjacency();

        // Postorder via iterative DFS from entry
        let mut postorder: Vec<BlockId> = Vec::with_capacity(n);
        let mut state = vec![0u8; n]; // 0 unvisited, 1 on stack, 2 done
        let mut stack: Vec<(BlockId, usize)> = vec![(graph.entry, 0)];
        state[graph.entry as usize] = 1;
        while let Some((block, child)) = stack.pop() {
            let succs = &succ[block as usize];
            if child < succs.len() {
                stack.push((block, child + 1));
                let next = succs[child];
                if state[next as usize] == 0 {
                    state[next as usize] = 1;
                    stack.push((next, 0));
                }
            } else {
                state[block as usize] = 2;
                postorder.push(block);
            }
        }

        let mut po_number = vec![usize::MAX; n];
        for (i, &b) in postorder.iter().enumerate() {
            po_number[b as usize] = i;
        }
        let rpo: Vec<BlockId> = postorder.iter().rev().copied().collect();

        // Idom fixpoint
        let mut idom = vec![NO_BLOCK; n];
        idom[graph.entry as usize] = graph.entry;

        let intersect = |idom: &[BlockId], po: &[usize], mut a: BlockId, mut b: BlockId| {
            while a != b {
                while po[a as usize] < po[b as usize] {
                    a = idom[a as usize];
                }
                while po[b as usize] < po[a as usize] {
                    b = idom[b as usize];
                }
            }
            a
        };

        let mut changed = true;
        while changed {
            changed = false;
            for &b in rpo.iter().skip(1) {
                let preds = &pred[b as usize];
                let mut new_idom = NO_BLOCK;
                for &p in preds {
                    if idom[p as usize] == NO_BLOCK {
                        continue;
                    }
                    new_idom = if new_idom == NO_BLOCK {
                        p
                    } else {
                        intersect(&idom, &po_number, p, new_idom)
                    };
                }
                if new_idom != NO_BLOCK && idom[b as usize] != new_idom {
                    idom[b as usize] = new_idom;
                    changed = true;
                }
            }
        }

        // Dominance frontier
        let mut frontier: Vec<Vec<BlockId>> = vec![Vec::new(); n];
        for &b in &rpo {
            let preds = &pred[b as usize];
            if preds.len() < 2 {
                continue;
            }
            for &p in preds {
                if idom[p as usize] == NO_BLOCK {
                    continue;
                }
                let mut runner = p;
                while runner != idom[b as usize] && runner != NO_BLOCK {
                    if !frontier[runner as usize].contains(&b) {
                        frontier[runner as usize].push(b);
                    }
                    if runner == idom[runner as usize] {
                        break;
                    }
                    runner = idom[runner as usize];
                }
            }
        }
        for f in &mut frontier {
            f.sort_unstable();
        }

        // Dominator-tree children
        let mut children: Vec<Vec<BlockId>> = vec![Vec::new(); n];
        for &b in &rpo {
            if b != graph.entry && idom[b as usize] != NO_BLOCK {
                children[idom[b as usize] as usize].push(b);
            }
        }

        Self {
            idom,
            rpo,
            frontier,
            children,
        }
    }

    /// True when `a` dominates `b`
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return true;
        }
        let mut runner = b;
        loop {
            let up = match self.idom.get(runner as usize) {
                Some(&up) if up != NO_BLOCK => up,
                _ => return false,
            };
            if up == runner {
                return false;
            }
            if up == a {
                return true;
            }
            runner = up;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flow_graph::infrastructure::bfg_builder::BfgBuilder;
    use crate::features::ir_build::IrBuilder;
    use crate::features::parsing::{SourceParser, TreeSitterParser};
    use crate::shared::models::{LanguageId, SourceFile};

    fn graph_of(content: &str) -> FlowGraph {
        let file = SourceFile::new("m.py", LanguageId::Python, content);
        let tree = TreeSitterParser::new().parse(&file).unwrap();
        let doc = IrBuilder::new("repo", "snap").build(&file, &tree);
        let body = doc
            .bodies
            .iter()
            .find(|b| b.function_fqn == "m.f")
            .unwrap();
        BfgBuilder::build(body)
    }

    #[test]
    fn test_entry_dominates_everything_reachable() {
        let graph = graph_of(
            "def f(x):\n    if x:\n        y = 1\n    else:\n        y = 2\n    return y\n",
        );
        let doms = Dominators::compute(&graph);

        for block in &graph.blocks {
            if block.reachable {
                assert!(doms.dominates(graph.entry, block.id));
            }
        }
    }

    #[test]
    fn test_branch_join_in_frontier() {
        let graph = graph_of(
            "def f(x):\n    if x:\n        y = 1\n    else:\n        y = 2\n    return y\n",
        );
        let doms = Dominators::compute(&graph);

        // The join block appears in the frontier of both branch blocks
        let join = graph
            .blocks
            .iter()
            .find(|b| graph.predecessors(b.id).count() >= 2)
            .unwrap();
        let holders = doms
            .frontier
            .iter()
            .filter(|f| f.contains(&join.id))
            .count();
        assert!(holders >= 2);
    }

    #[test]
    fn test_loop_header_dominates_body() {
        let graph = graph_of("def f(x):\n    while x:\n        x = x - 1\n    return x\n");
        let doms = Dominators::compute(&graph);

        let header = graph
            .blocks
            .iter()
            .find(|b| b.kind == crate::features::flow_graph::domain::BlockKind::LoopHeader)
            .unwrap();
        let back_edge = graph
            .edges
            .iter()
            .find(|e| e.kind == crate::features::flow_graph::domain::CfgEdgeKind::LoopBack)
            .unwrap();
        assert!(doms.dominates(header.id, back_edge.from));
    }

    #[test]
    fn test_unreachable_has_no_idom() {
        let graph = graph_of("def f(x):\n    return x\n    y = 1\n");
        let doms = Dominators::compute(&graph);
        let unreachable = graph.blocks.iter().find(|b| !b.reachable).unwrap();
        assert_eq!(doms.idom[unreachable.id as usize], NO_BLOCK);
    }
}
