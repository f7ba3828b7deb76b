//! Parser port (interface)

use crate::features::parsing::domain::ParsedTree;
use crate::shared::models::{LanguageId, Result, SourceFile};

/// Parser abstraction.
///
/// Implementations must be deterministic: same bytes, same tree.
/// A parse error yields a partial tree, never a pipeline abort.
pub trait SourceParser: Send + Sync {
    fn parse(&self, file: &SourceFile) -> Result<ParsedTree>;

    fn supports(&self, language: LanguageId) -> bool;
}
