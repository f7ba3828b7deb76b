//! Shared models

mod edge;
mod error;
mod language;
mod node;
pub mod occurrence;
mod snapshot;
mod span;

pub use edge::{Edge, EdgeKind};
pub use error::{AtlasError, ErrorKind, Result};
pub use language::LanguageId;
pub use node::{Node, NodeKind};
pub use occurrence::{Occurrence, OccurrenceGenerator, SymbolRole, SymbolRoles};
pub use snapshot::{RepoSnapshot, SourceFile};
pub use span::{Location, Span};

// Re-export serde_json::Value for convenience (used by node/edge attrs)
pub use serde_json::Value;

/// Node identifier type alias
pub type NodeId = String;
