//! Structural IR builder (C2)

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::IrBuilder;
pub use domain::{
    AllocKind, AllocSite, ArgValue, CallSite, FieldAccess, FunctionBody, IRDocument, Stmt, StmtKind,
};
pub use infrastructure::MemoryIrStore;
pub use ports::IrStore;
