//! Structural IR domain models

mod body;
mod ir_document;

pub use body::{AllocKind, AllocSite, ArgValue, CallSite, FieldAccess, FunctionBody, Stmt, StmtKind};
pub use ir_document::IRDocument;
