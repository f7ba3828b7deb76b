//! Pipeline orchestration

pub mod cancellation;
pub mod orchestrator;
pub mod result;

pub use cancellation::CancellationToken;
pub use orchestrator::PipelineOrchestrator;
pub use result::{BuildResult, BuildStats, ErrorSummary};
