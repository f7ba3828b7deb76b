//! Source registry & parsers (C1)

pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use domain::ParsedTree;
pub use infrastructure::{SourceRegistry, TreeSitterParser};
pub use ports::SourceParser;
