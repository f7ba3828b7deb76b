//! Basic-block construction from statement trees
//!
//! Linear scan: a block ends at any branch, loop, return, raise,
//! break, or continue. Statements after a terminator land in a fresh
//! block that the reachability pass marks unreachable.

use crate::features::flow_graph::domain::{
    BasicBlock, BlockId, BlockKind, CfgEdge, CfgEdgeKind, FlowGraph,
};
use crate::features::ir_build::domain::{FunctionBody, Stmt, StmtKind};

struct LoopCtx {
    header: BlockId,
    exit: BlockId,
}

pub struct BfgBuilder {
    graph: FlowGraph,
    loops: Vec<LoopCtx>,
}

impl BfgBuilder {
    pub fn build(body: &FunctionBody) -> FlowGraph {
        let mut builder = Self {
            graph: FlowGraph {
                function_id: body.function_id.clone(),
                ..Default::default()
            },
            loops: Vec::new(),
        };

        let entry = builder.new_block(BlockKind::Entry);
        let exit = builder.new_block(BlockKind::Exit);
        builder.graph.entry = entry;
        builder.graph.exit = exit;

        let first = builder.new_block(BlockKind::Statement);
        builder.edge(entry, first, CfgEdgeKind::Next);

        let end = builder.lower_seq(&body.statements, first);
        if let Some(end) = end {
            builder.edge(end, exit, CfgEdgeKind::Next);
        }

        let mut graph = builder.graph;
        graph.mark_reachability();
        graph
    }

    fn new_block(&mut self, kind: BlockKind) -> BlockId {
        let id = self.graph.blocks.len() as BlockId;
        self.graph.blocks.push(BasicBlock::new(id, kind));
        id
    }

    fn edge(&mut self, from: BlockId, to: BlockId, kind: CfgEdgeKind) {
        self.graph.edges.push(CfgEdge { from, to, kind });
    }

    /// Append a leaf copy (nested bodies stripped) to a block
    fn push_stmt(&mut self, block: BlockId, stmt: &Stmt) {
        let mut leaf = stmt.clone();
        leaf.body.clear();
        leaf.orelse.clear();
        leaf.handlers.clear();
        leaf.finalizer.clear();

        let idx = self.graph.stmts.len() as u32;
        self.graph.stmts.push(leaf);

        let b = &mut self.graph.blocks[block as usize];
        b.statements.push(idx);
        if b.span.is_none() {
            b.span = Some(stmt.span);
        }
    }

    /// Lower a statement sequence into `current`; returns the open
    /// block at the end, or None when flow terminated
    fn lower_seq(&mut self, stmts: &[Stmt], mut current: BlockId) -> Option<BlockId> {
        let mut open = Some(current);

        for stmt in stmts {
            current = match open {
                Some(b) => b,
                None => {
                    // Dead code after a terminator: keep it, fresh block
                    let b = self.new_block(BlockKind::Statement);
                    open = Some(b);
                    b
                }
            };

            match stmt.kind {
                StmtKind::If => {
                    let cond = self.branch_block(current, BlockKind::Condition, stmt);

                    let then_start = self.new_block(BlockKind::Statement);
                    self.edge(cond, then_start, CfgEdgeKind::TrueBranch);
                    let then_end = self.lower_seq(&stmt.body, then_start);

                    let join = self.new_block(BlockKind::Statement);

                    if stmt.orelse.is_empty() {
                        self.edge(cond, join, CfgEdgeKind::FalseBranch);
                    } else {
                        let else_start = self.new_block(BlockKind::Statement);
                        self.edge(cond, else_start, CfgEdgeKind::FalseBranch);
                        if let Some(else_end) = self.lower_seq(&stmt.orelse, else_start) {
                            self.edge(else_end, join, CfgEdgeKind::Next);
                        }
                    }
                    if let Some(then_end) = then_end {
                        self.edge(then_end, join, CfgEdgeKind::Next);
                    }
                    open = Some(join);
                }
                StmtKind::While | StmtKind::For => {
                    let header = self.branch_block(current, BlockKind::LoopHeader, stmt);
                    let after = self.new_block(BlockKind::Statement);
                    self.edge(header, after, CfgEdgeKind::LoopExit);

                    let body_start = self.new_block(BlockKind::Statement);
                    self.edge(header, body_start, CfgEdgeKind::TrueBranch);

                    self.loops.push(LoopCtx {
                        header,
                        exit: after,
                    });
                    let body_end = self.lower_seq(&stmt.body, body_start);
                    self.loops.pop();

                    if let Some(body_end) = body_end {
                        self.edge(body_end, header, CfgEdgeKind::LoopBack);
                    }
                    open = Some(after);
                }
                StmtKind::Try => {
                    let try_start = self.branch_block(current, BlockKind::Try, stmt);
                    let body_end = self.lower_seq(&stmt.body, try_start);

                    let mut handler_ends = Vec::new();
                    for handler in &stmt.handlers {
                        let h_start = self.new_block(BlockKind::Catch);
                        self.edge(try_start, h_start, CfgEdgeKind::Handler);
                        self.push_stmt(h_start, handler);
                        handler_ends.push(self.lower_seq(&handler.body, h_start));
                    }

                    if stmt.finalizer.is_empty() {
                        let join = self.new_block(BlockKind::Statement);
                        if let Some(body_end) = body_end {
                            self.edge(body_end, join, CfgEdgeKind::Next);
                        }
                        for h_end in handler_ends.into_iter().flatten() {
                            self.edge(h_end, join, CfgEdgeKind::Next);
                        }
                        open = Some(join);
                    } else {
                        let fin = self.new_block(BlockKind::Finally);
                        if let Some(body_end) = body_end {
                            self.edge(body_end, fin, CfgEdgeKind::Finally);
                        }
                        for h_end in handler_ends.into_iter().flatten() {
                            self.edge(h_end, fin, CfgEdgeKind::Finally);
                        }
                        open = self.lower_seq(&stmt.finalizer, fin);
                    }
                }
                StmtKind::With => {
                    self.push_stmt(current, stmt);
                    open = self.lower_seq(&stmt.body, current);
                }
                StmtKind::Return => {
                    self.push_stmt(current, stmt);
                    self.edge(current, self.graph.exit, CfgEdgeKind::Next);
                    open = None;
                }
                StmtKind::Raise => {
                    self.push_stmt(current, stmt);
                    self.edge(current, self.graph.exit, CfgEdgeKind::Handler);
                    open = None;
                }
                StmtKind::Break => {
                    self.push_stmt(current, stmt);
                    if let Some(ctx) = self.loops.last() {
                        let exit = ctx.exit;
                        self.edge(current, exit, CfgEdgeKind::LoopExit);
                    }
                    open = None;
                }
                StmtKind::Continue => {
                    self.push_stmt(current, stmt);
                    if let Some(ctx) = self.loops.last() {
                        let header = ctx.header;
                        self.edge(current, header, CfgEdgeKind::LoopBack);
                    }
                    open = None;
                }
                _ => {
                    self.push_stmt(current, stmt);
                    open = Some(current);
                }
            }
        }

        open
    }

    /// Branch-opening statements need their own block; reuse the
    /// current block only when it is still empty
    fn branch_block(&mut self, current: BlockId, kind: BlockKind, stmt: &Stmt) -> BlockId {
        let reusable = {
            let b = &self.graph.blocks[current as usize];
            b.statements.is_empty() && b.kind == BlockKind::Statement
        };
        let block = if reusable {
            self.graph.blocks[current as usize].kind = kind;
            current
        } else {
            let b = self.new_block(kind);
            self.edge(current, b, CfgEdgeKind::Next);
            b
        };
        self.push_stmt(block, stmt);
        block
    }
}
