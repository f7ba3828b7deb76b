//! Parsed tree domain model

use crate::shared::models::LanguageId;
use tree_sitter::Tree;

/// Output of parsing one source file.
///
/// Holds the concrete tree-sitter tree for downstream visitors plus the
/// AST shape hash used by impact classification (comment and formatting
/// changes leave it unchanged).
pub struct ParsedTree {
    pub tree: Tree,
    pub language: LanguageId,
    pub file_path: String,
    /// True when the tree contains error nodes (file is kept, degraded)
    pub has_errors: bool,
    /// Blake3 over the preorder named-node kind sequence, comments skipped
    pub ast_hash: String,
}

impl ParsedTree {
    pub fn root(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }
}
