//! Taint domain models

mod finding;
pub mod rules;
mod summary;

pub use finding::{FindingSet, TaintFinding, TraceStep};
pub use rules::{CompiledRules, MatchOn, RuleCatalog, RuleKind, Severity, TaintRule};
pub use summary::{FunctionSummary, ParamSink, ReturnedSource};
