//! File manifest and snapshot diffing

use super::change_set::ChangeSet;
use super::rename_detector::{FileFacts, RenameDetector};
use crate::shared::models::SourceFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub content_hash: String,
    pub size_bytes: u64,
    /// mtime fast-path value; 0 for in-memory sources
    pub mtime_ns: u64,
}

/// Snapshot of what the previous build saw
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileManifest {
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl FileManifest {
    pub fn from_sources(files: &[SourceFile]) -> Self {
        let entries = files
            .iter()
            .map(|f| {
                (
                    f.path.clone(),
                    ManifestEntry {
                        content_hash: f.content_hash.clone(),
                        size_bytes: f.size_bytes(),
                        mtime_ns: 0,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Diff against the current file set.
    ///
    /// The mtime+size pre-filter skips hashing only when both match;
    /// here hashes are already computed by SourceFile, so the filter
    /// degenerates to a hash compare. Renames are detected afterwards.
    pub fn diff(&self, current: &[SourceFile]) -> ChangeSet {
        let mut change_set = ChangeSet::new();
        let current_map: BTreeMap<&str, &SourceFile> =
            current.iter().map(|f| (f.path.as_str(), f)).collect();

        for (path, entry) in &self.entries {
            match current_map.get(path.as_str()) {
                None => change_set.add_deleted(path.clone()),
                Some(file) => {
                    if file.content_hash != entry.content_hash {
                        change_set.add_modified(path.clone());
                    }
                }
            }
        }
        for file in current {
            if !self.entries.contains_key(&file.path) {
                change_set.add_added(file.path.clone());
            }
        }

        // Rename refinement over the delete+add sets
        let deleted_facts: Vec<FileFacts> = change_set
            .deleted
            .iter()
            .filter_map(|path| {
                self.entries.get(path).map(|e| FileFacts {
                    path: path.clone(),
                    content_hash: e.content_hash.clone(),
                    size_bytes: e.size_bytes,
                })
            })
            .collect();
        let added_facts: Vec<FileFacts> = change_set
            .added
            .iter()
            .filter_map(|path| {
                current_map.get(path.as_str()).map(|f| FileFacts {
                    path: path.clone(),
                    content_hash: f.content_hash.clone(),
                    size_bytes: f.size_bytes(),
                })
            })
            .collect();
        RenameDetector::detect(&mut change_set, &deleted_facts, &added_facts);

        change_set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::LanguageId;

    fn src(path: &str, content: &str) -> SourceFile {
        SourceFile::new(path, LanguageId::Python, content)
    }

    #[test]
    fn test_diff_detects_all_kinds() {
        let previous = FileManifest::from_sources(&[
            src("same.py", "a = 1\n"),
            src("changed.py", "b = 1\n"),
            src("gone.py", "c = 1\n"),
        ]);

        let current = vec![
            src("same.py", "a = 1\n"),
            src("changed.py", "b = 2\n"),
            src("new.py", "d = 1\n"),
        ];

        let cs = previous.diff(&current);
        assert!(cs.modified.contains("changed.py"));
        assert!(cs.deleted.contains("gone.py"));
        assert!(cs.added.contains("new.py"));
        assert!(!cs.all_changed().contains("same.py"));
    }

    #[test]
    fn test_diff_detects_rename() {
        let body = "def foo():\n    return 1\n".repeat(20);
        let previous = FileManifest::from_sources(&[src("a.py", &body)]);
        let current = vec![src("b.py", &body)];

        let cs = previous.diff(&current);
        assert!(cs.added.is_empty());
        assert!(cs.deleted.is_empty());
        assert_eq!(cs.renamed.get("a.py").map(|s| s.as_str()), Some("b.py"));
    }

    #[test]
    fn test_diff_empty_when_unchanged() {
        let files = vec![src("a.py", "x = 1\n")];
        let manifest = FileManifest::from_sources(&files);
        assert!(manifest.diff(&files).is_empty());
    }
}
