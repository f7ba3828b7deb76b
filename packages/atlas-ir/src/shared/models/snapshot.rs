//! Repository snapshot and source file models

use super::LanguageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The analysis unit: one immutable view of a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSnapshot {
    pub repo_id: String,
    pub snapshot_id: String,
    pub root_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl RepoSnapshot {
    pub fn new(
        repo_id: impl Into<String>,
        snapshot_id: impl Into<String>,
        root_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo_id: repo_id.into(),
            snapshot_id: snapshot_id.into(),
            root_path: root_path.into(),
            created_at: Utc::now(),
        }
    }
}

/// A source file registered in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path relative to the snapshot root
    pub path: String,
    pub language: LanguageId,
    pub content: String,
    /// Blake3 over the file bytes (hex)
    pub content_hash: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, language: LanguageId, content: impl Into<String>) -> Self {
        let content = content.into();
        let content_hash = blake3::hash(content.as_bytes()).to_hex().to_string();
        Self {
            path: path.into(),
            language,
            content,
            content_hash,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_content_derived() {
        let a = SourceFile::new("a.py", LanguageId::Python, "x = 1\n");
        let b = SourceFile::new("b.py", LanguageId::Python, "x = 1\n");
        assert_eq!(a.content_hash, b.content_hash);

        let c = SourceFile::new("a.py", LanguageId::Python, "x = 2\n");
        assert_ne!(a.content_hash, c.content_hash);
    }
}
