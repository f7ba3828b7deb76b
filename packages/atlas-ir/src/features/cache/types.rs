//! Core types for the tiered cache

use serde::{Deserialize, Serialize};

/// Kind of cached artifact
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArtifactKind {
    IrDocument,
    SemanticIr,
    PointsTo,
    EscapeInfo,
    TaintSummary,
    TaintFindings,
    GlobalContext,
    ChunkSet,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::IrDocument => "ir_document",
            ArtifactKind::SemanticIr => "semantic_ir",
            ArtifactKind::PointsTo => "points_to",
            ArtifactKind::EscapeInfo => "escape_info",
            ArtifactKind::TaintSummary => "taint_summary",
            ArtifactKind::TaintFindings => "taint_findings",
            ArtifactKind::GlobalContext => "global_context",
            ArtifactKind::ChunkSet => "chunk_set",
        }
    }
}

/// Content fingerprint (Blake3)
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct Fingerprint(pub blake3::Hash);

impl Fingerprint {
    /// Compute fingerprint from content
    pub fn compute(content: &[u8]) -> Self {
        Self(blake3::hash(content))
    }

    /// Fast path: from file metadata (mtime + size).
    ///
    /// Probabilistic - two files with equal mtime+size collide. Use only
    /// for pre-filter checks, always confirm with a content hash.
    pub fn from_metadata(mtime_ns: u64, size_bytes: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&mtime_ns.to_le_bytes());
        hasher.update(&size_bytes.to_le_bytes());
        Self(hasher.finalize())
    }

    /// Combine several fingerprints (e.g. sorted callee fingerprints +
    /// body hash for a function summary)
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a Fingerprint>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        Self(hasher.finalize())
    }

    pub fn zero() -> Self {
        Self(blake3::Hash::from_bytes([0u8; 32]))
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }

    pub fn from_hex(hex: &str) -> Result<Self, blake3::HexError> {
        Ok(Self(blake3::Hash::from_hex(hex)?))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn matches(&self, other: &Fingerprint) -> bool {
        self.0 == other.0
    }
}

// Blake3Hash does not implement serde; serialize as hex
impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        Self::from_hex(&hex_str).map_err(serde::de::Error::custom)
    }
}

/// File metadata for the L0 fast path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Last modified time (nanoseconds since Unix epoch)
    pub mtime_ns: u64,
    pub size_bytes: u64,
    pub fingerprint: Fingerprint,
}

impl FileMetadata {
    pub fn new(mtime_ns: u64, size_bytes: u64, fingerprint: Fingerprint) -> Self {
        Self {
            mtime_ns,
            size_bytes,
            fingerprint,
        }
    }

    pub fn matches_fast(&self, mtime_ns: u64, size_bytes: u64) -> bool {
        self.mtime_ns == mtime_ns && self.size_bytes == size_bytes
    }
}

/// Identity of a cached subject independent of content
/// (file path for per-file artifacts, function id for summaries)
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubjectKey {
    pub artifact: ArtifactKind,
    pub subject: String,
}

impl SubjectKey {
    pub fn new(artifact: ArtifactKind, subject: impl Into<String>) -> Self {
        Self {
            artifact,
            subject: subject.into(),
        }
    }
}

/// Full cache key: (artifact-kind, subject-id, fingerprint, stage-config-hash)
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CacheKey {
    pub artifact: ArtifactKind,
    pub subject: String,
    pub fingerprint: Fingerprint,
    pub config_hash: String,
}

impl CacheKey {
    pub fn new(
        artifact: ArtifactKind,
        subject: impl Into<String>,
        fingerprint: Fingerprint,
        config_hash: impl Into<String>,
    ) -> Self {
        Self {
            artifact,
            subject: subject.into(),
            fingerprint,
            config_hash: config_hash.into(),
        }
    }

    pub fn subject_key(&self) -> SubjectKey {
        SubjectKey {
            artifact: self.artifact,
            subject: self.subject.clone(),
        }
    }

    /// Byte form for content-addressed file naming
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.subject.len() + 64);
        bytes.extend_from_slice(self.artifact.as_str().as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(self.subject.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(self.fingerprint.as_bytes());
        bytes.extend_from_slice(self.config_hash.as_bytes());
        bytes
    }

    /// Stable hex stem for the on-disk entry
    pub fn file_stem(&self) -> String {
        blake3::hash(&self.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let content = b"print('hello')";
        assert_eq!(Fingerprint::compute(content), Fingerprint::compute(content));
        assert_ne!(
            Fingerprint::compute(content),
            Fingerprint::compute(b"other")
        );
    }

    #[test]
    fn test_fingerprint_hex_roundtrip() {
        let fp = Fingerprint::compute(b"test");
        let fp2 = Fingerprint::from_hex(&fp.to_hex()).unwrap();
        assert_eq!(fp, fp2);
    }

    #[test]
    fn test_cache_key_distinguishes_config() {
        let fp = Fingerprint::compute(b"code");
        let a = CacheKey::new(ArtifactKind::IrDocument, "a.py", fp, "cfg1");
        let b = CacheKey::new(ArtifactKind::IrDocument, "a.py", fp, "cfg2");
        assert_ne!(a, b);
        assert_ne!(a.file_stem(), b.file_stem());
    }

    #[test]
    fn test_cache_key_distinguishes_artifact_kind() {
        let fp = Fingerprint::compute(b"code");
        let a = CacheKey::new(ArtifactKind::IrDocument, "a.py", fp, "cfg");
        let b = CacheKey::new(ArtifactKind::SemanticIr, "a.py", fp, "cfg");
        assert_ne!(a.file_stem(), b.file_stem());
    }

    #[test]
    fn test_fingerprint_combine_order_sensitive() {
        let a = Fingerprint::compute(b"a");
        let b = Fingerprint::compute(b"b");
        assert_ne!(
            Fingerprint::combine([&a, &b]),
            Fingerprint::combine([&b, &a])
        );
    }
}
