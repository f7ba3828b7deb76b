//! Error types for the cache system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache corrupted: {0}")]
    Corrupted(String),

    #[error("Cache version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: String, expected: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry quarantined: {0}")]
    Quarantined(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

impl From<CacheError> for crate::shared::models::AtlasError {
    fn from(err: CacheError) -> Self {
        crate::shared::models::AtlasError::new(
            crate::shared::models::ErrorKind::Cache,
            err.to_string(),
        )
        .with_source(err)
    }
}
