//! Error types for the atlas-ir crate
//!
//! One categorized error type across the pipeline, with optional file
//! and line context and source chaining. Per-feature error enums
//! (cache, rule catalog) convert into this.

use std::fmt;

/// Error kind categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Parsing errors (recoverable, file kept with degraded flag)
    Parse,
    /// Structural IR build errors
    IrBuild,
    /// Cross-file resolution errors (ambiguity is tagged, not raised)
    Resolution,
    /// Flow graph construction errors
    FlowAnalysis,
    /// Data flow errors
    DataFlow,
    /// SSA construction errors
    Ssa,
    /// Type enrichment failures and timeouts (demoted to warnings)
    TypeEnrichment,
    /// Points-to / heap analysis errors
    PointsTo,
    /// Taint analysis errors
    TaintAnalysis,
    /// Cache errors (miss/corruption fall through to recompute)
    Cache,
    /// Rule catalog errors (fatal at startup only)
    RuleCatalog,
    /// Storage port failures (retried per-batch)
    Storage,
    /// Chunking errors
    Chunking,
    /// Cooperative cancellation
    Cancelled,
    /// Invariant violation (fatal, poisons the snapshot)
    Invariant,
    /// Configuration errors
    Config,
    /// IO errors
    Io,
    /// Internal errors (bugs)
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::IrBuild => "ir_build",
            ErrorKind::Resolution => "resolution",
            ErrorKind::FlowAnalysis => "flow_analysis",
            ErrorKind::DataFlow => "data_flow",
            ErrorKind::Ssa => "ssa",
            ErrorKind::TypeEnrichment => "type_enrichment",
            ErrorKind::PointsTo => "points_to",
            ErrorKind::TaintAnalysis => "taint_analysis",
            ErrorKind::Cache => "cache",
            ErrorKind::RuleCatalog => "rule_catalog",
            ErrorKind::Storage => "storage",
            ErrorKind::Chunking => "chunking",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Invariant => "invariant",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        }
    }

    /// Fatal kinds abort the current snapshot; everything else is
    /// collected into the snapshot error summary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::Invariant)
    }
}

/// Unified error type
#[derive(Debug)]
pub struct AtlasError {
    pub kind: ErrorKind,
    pub message: String,
    pub file_path: Option<String>,
    pub line: Option<u32>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AtlasError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file_path: None,
            line: None,
            source: None,
        }
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn ir_build(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IrBuild, message)
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resolution, message)
    }

    pub fn flow_analysis(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FlowAnalysis, message)
    }

    pub fn data_flow(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataFlow, message)
    }

    pub fn ssa(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Ssa, message)
    }

    pub fn type_enrichment(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeEnrichment, message)
    }

    pub fn taint(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TaintAnalysis, message)
    }

    pub fn rule_catalog(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuleCatalog, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invariant, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

impl fmt::Display for AtlasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)?;
        if let Some(ref file) = self.file_path {
            write!(f, " in {}", file)?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for AtlasError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for AtlasError {
    fn from(err: std::io::Error) -> Self {
        AtlasError::new(ErrorKind::Io, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for AtlasError {
    fn from(err: serde_json::Error) -> Self {
        AtlasError::new(ErrorKind::Internal, format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<serde_yaml::Error> for AtlasError {
    fn from(err: serde_yaml::Error) -> Self {
        AtlasError::rule_catalog(format!("YAML error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AtlasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AtlasError::parse("unexpected token")
            .with_file("test.py")
            .with_line(42);

        let msg = format!("{}", err);
        assert!(msg.contains("parse"));
        assert!(msg.contains("unexpected token"));
        assert!(msg.contains("test.py"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_only_invariant_is_fatal() {
        assert!(AtlasError::invariant("edge endpoint missing").is_fatal());
        assert!(!AtlasError::parse("broken").is_fatal());
        assert!(!AtlasError::cancelled().is_fatal());
    }
}
