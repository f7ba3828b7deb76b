//! Cross-file resolution types

use crate::shared::models::{NodeKind, Span};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A symbol visible across files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub fqn: String,
    pub name: String,
    pub kind: NodeKind,
    pub file_path: Arc<String>,
    pub node_id: String,
    pub span: Span,
}

impl Symbol {
    pub fn new_with_shared_path(
        fqn: String,
        name: String,
        kind: NodeKind,
        file_path: Arc<String>,
        node_id: String,
        span: Span,
    ) -> Self {
        Self {
            fqn,
            name,
            kind,
            file_path,
            node_id,
            span,
        }
    }
}

/// Per-file import table: local name → imported target path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportTable {
    pub named: std::collections::HashMap<String, String>,
    /// Modules imported via wildcard
    pub wildcard_modules: Vec<String>,
}
