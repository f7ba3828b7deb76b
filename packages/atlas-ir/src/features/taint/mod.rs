//! Taint engine (C7)

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::TaintAnalysis;
pub use domain::{
    CompiledRules, FindingSet, FunctionSummary, MatchOn, RuleCatalog, RuleKind, Severity,
    TaintFinding, TaintRule, TraceStep,
};
pub use infrastructure::{AccessPath, TaintEngine};
pub use ports::{AllFeasible, PathFeasibilityPort};
