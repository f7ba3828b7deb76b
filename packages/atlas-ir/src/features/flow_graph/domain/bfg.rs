//! Basic flow graph: blocks over the statement arena

use crate::features::ir_build::domain::Stmt;
use crate::shared::models::Span;
use serde::{Deserialize, Serialize};

pub type BlockId = u32;

/// Sentinel for "no block" (unreachable idom, missing parent)
pub const NO_BLOCK: BlockId = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Entry,
    Exit,
    Statement,
    Condition,
    LoopHeader,
    Try,
    Catch,
    Finally,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Entry => "Entry",
            BlockKind::Exit => "Exit",
            BlockKind::Statement => "Statement",
            BlockKind::Condition => "Condition",
            BlockKind::LoopHeader => "LoopHeader",
            BlockKind::Try => "Try",
            BlockKind::Catch => "Catch",
            BlockKind::Finally => "Finally",
        }
    }
}

/// Basic block. Statements are indices into the owning graph's arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub kind: BlockKind,
    pub span: Option<Span>,
    /// Indices into FlowGraph::stmts
    pub statements: Vec<u32>,
    /// Unreachable blocks are kept but marked
    pub reachable: bool,
}

impl BasicBlock {
    pub fn new(id: BlockId, kind: BlockKind) -> Self {
        Self {
            id,
            kind,
            span: None,
            statements: Vec::new(),
            reachable: true,
        }
    }
}

/// Flattened statement arena entry: leaf statements with nested bodies
/// stripped (control statements keep only their condition facts)
pub type ArenaStmt = Stmt;
