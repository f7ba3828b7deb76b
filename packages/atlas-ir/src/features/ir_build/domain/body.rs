//! Function body statement trees
//!
//! The language-neutral handoff from the structural builder to the
//! semantic stages: basic blocks, def-use, points-to, escape, and taint
//! all work from this tree and never touch the concrete AST again.

use crate::shared::models::Span;
use serde::{Deserialize, Serialize};

/// Statement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StmtKind {
    Assign,
    AugAssign,
    Expr,
    If,
    While,
    For,
    Return,
    Raise,
    Try,
    Handler,
    With,
    Break,
    Continue,
    Pass,
    /// Nested function/class definition (closure allocation)
    NestedDef,
}

/// Argument value at a call site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgValue {
    Var(String),
    NoneLiteral,
    StrLiteral,
    NumLiteral,
    Other,
}

impl ArgValue {
    pub fn as_var(&self) -> Option<&str> {
        match self {
            ArgValue::Var(name) => Some(name),
            _ => None,
        }
    }
}

/// A call site inside a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    /// Callee path as written (`foo`, `db.execute`, `req.GET.__getitem__`)
    pub callee: String,
    /// Receiver path for method-style calls (`db` in `db.execute`)
    pub base: Option<String>,
    pub args: Vec<ArgValue>,
    /// Variable the result is bound to, when the call feeds an assignment
    pub assigned_to: Option<String>,
    pub span: Span,
}

/// Field (attribute) access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAccess {
    pub base: String,
    pub field: String,
    pub span: Span,
}

/// Allocation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocKind {
    Dict,
    List,
    Set,
    Tuple,
    Str,
    Object,
    Closure,
}

/// An allocation site inside a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocSite {
    /// Variable the allocation is bound to, when direct
    pub var: Option<String>,
    pub kind: AllocKind,
    /// Variables captured by a closure allocation
    pub captures: Vec<String>,
    pub span: Span,
}

/// One statement in a function body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,

    /// Variables written by this statement
    pub defs: Vec<String>,
    /// Variables read by this statement (condition reads included)
    pub uses: Vec<String>,

    pub calls: Vec<CallSite>,
    pub field_reads: Vec<FieldAccess>,
    pub field_writes: Vec<FieldAccess>,
    pub allocs: Vec<AllocSite>,

    /// Nested bodies
    pub body: Vec<Stmt>,
    /// else / elif chain
    pub orelse: Vec<Stmt>,
    /// except handlers (each `Handler`)
    pub handlers: Vec<Stmt>,
    /// finally block
    pub finalizer: Vec<Stmt>,
}

impl Default for StmtKind {
    fn default() -> Self {
        StmtKind::Expr
    }
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self {
            kind,
            span,
            ..Default::default()
        }
    }

    /// True for statements that terminate the current block
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Return | StmtKind::Raise | StmtKind::Break | StmtKind::Continue
        )
    }

    /// True for statements that open nested control flow
    pub fn is_control(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::If | StmtKind::While | StmtKind::For | StmtKind::Try | StmtKind::With
        )
    }
}

/// Statement tree of one function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionBody {
    /// Node id of the owning function
    pub function_id: String,
    pub function_fqn: String,
    pub file_path: String,
    pub params: Vec<String>,
    pub span: Span,
    pub statements: Vec<Stmt>,
}

impl FunctionBody {
    /// All statements in preorder (nested bodies flattened)
    pub fn iter_preorder(&self) -> Vec<&Stmt> {
        fn walk<'a>(stmts: &'a [Stmt], out: &mut Vec<&'a Stmt>) {
            for stmt in stmts {
                out.push(stmt);
                walk(&stmt.body, out);
                walk(&stmt.orelse, out);
                walk(&stmt.handlers, out);
                walk(&stmt.finalizer, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.statements, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iter_preorder_flattens_nesting() {
        let mut body = FunctionBody::default();
        let mut if_stmt = Stmt::new(StmtKind::If, Span::new(1, 0, 3, 0));
        if_stmt.body.push(Stmt::new(StmtKind::Return, Span::new(2, 4, 2, 10)));
        body.statements.push(if_stmt);
        body.statements
            .push(Stmt::new(StmtKind::Pass, Span::new(4, 0, 4, 4)));

        let flat = body.iter_preorder();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[1].kind, StmtKind::Return);
    }

    #[test]
    fn test_terminators() {
        assert!(Stmt::new(StmtKind::Return, Span::zero()).is_terminator());
        assert!(!Stmt::new(StmtKind::Assign, Span::zero()).is_terminator());
    }
}
