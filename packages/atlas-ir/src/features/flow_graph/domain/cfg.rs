//! Control flow graph edges and the graph aggregate

use super::bfg::{ArenaStmt, BasicBlock, BlockId};
use crate::shared::models::EdgeKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfgEdgeKind {
    Next,
    TrueBranch,
    FalseBranch,
    LoopBack,
    LoopExit,
    Handler,
    Finally,
}

impl CfgEdgeKind {
    /// Projection onto the shared edge vocabulary
    pub fn to_edge_kind(&self) -> EdgeKind {
        match self {
            CfgEdgeKind::Next => EdgeKind::CfgNext,
            CfgEdgeKind::TrueBranch | CfgEdgeKind::FalseBranch => EdgeKind::CfgBranch,
            CfgEdgeKind::LoopBack | CfgEdgeKind::LoopExit => EdgeKind::CfgLoop,
            CfgEdgeKind::Handler | CfgEdgeKind::Finally => EdgeKind::CfgHandler,
        }
    }

    pub fn is_back_edge(&self) -> bool {
        matches!(self, CfgEdgeKind::LoopBack)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgEdge {
    pub from: BlockId,
    pub to: BlockId,
    pub kind: CfgEdgeKind,
}

/// Control flow graph of one function
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    pub function_id: String,
    pub blocks: Vec<BasicBlock>,
    pub edges: Vec<CfgEdge>,
    pub entry: BlockId,
    pub exit: BlockId,
    /// Flattened leaf statements; blocks index into this arena
    pub stmts: Vec<ArenaStmt>,
}

impl FlowGraph {
    pub fn successors(&self, block: BlockId) -> impl Iterator<Item = &CfgEdge> + '_ {
        self.edges.iter().filter(move |e| e.from == block)
    }

    pub fn predecessors(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.to == block)
            .map(|e| e.from)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Adjacency lists indexed by block id
    pub fn adjacency(&self) -> (Vec<Vec<BlockId>>, Vec<Vec<BlockId>>) {
        let n = self.blocks.len();
        let mut succ = vec![Vec::new(); n];
        let mut pred = vec![Vec::new(); n];
        for edge in &self.edges {
            succ[edge.from as usize].push(edge.to);
            pred[edge.to as usize].push(edge.from);
        }
        (succ, pred)
    }

    /// Mark reachability by BFS from entry
    pub fn mark_reachability(&mut self) {
        let n = self.blocks.len();
        let (succ, _) = self.adjacency();
        let mut seen = vec![false; n];
        let mut queue = std::collections::VecDeque::new();
        seen[self.entry as usize] = true;
        queue.push_back(self.entry);
        while let Some(b) = queue.pop_front() {
            for &s in &succ[b as usize] {
                if !seen[s as usize] {
                    seen[s as usize] = true;
                    queue.push_back(s);
                }
            }
        }
        for block in &mut self.blocks {
            block.reachable = seen[block.id as usize];
        }
    }
}
