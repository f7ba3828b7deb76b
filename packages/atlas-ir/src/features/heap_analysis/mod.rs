//! Escape analysis (C6)

pub mod escape_analysis;

pub use escape_analysis::{EscapeAnalysis, EscapeInfo, EscapeState, EscapeSummary};
