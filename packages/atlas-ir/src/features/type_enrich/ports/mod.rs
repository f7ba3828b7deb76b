//! Language-server adapter port

use crate::shared::models::{Location, Result, Span};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Type information for a span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub span: Span,
    pub type_name: String,
}

/// Adapter diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub span: Span,
    pub message: String,
    pub severity: String,
}

/// Asynchronous language-server adapter.
///
/// Adapters are pluggable per language and must be safe to invoke
/// concurrently; the enricher bounds outstanding requests.
#[async_trait]
pub trait LanguageServerPort: Send + Sync {
    async fn types_for(&self, file: &str, span: Span) -> Result<Vec<TypeInfo>>;

    async fn diagnostics_for(&self, file: &str) -> Result<Vec<Diagnostic>>;

    async fn hover(&self, file: &str, location: Location) -> Result<Option<String>>;

    async fn definition_for(&self, file: &str, location: Location)
        -> Result<Option<(String, Span)>>;

    async fn references_for(&self, file: &str, location: Location) -> Result<Vec<(String, Span)>>;
}
