//! Source registry: snapshot discovery
//!
//! Walks a snapshot root, decodes file contents, infers languages, and
//! produces the deterministic file list the pipeline operates on.

use crate::config::ParsingConfig;
use crate::features::parsing::infrastructure::language_registry::{decode_bytes, detect_language};
use crate::shared::models::{Result, SourceFile};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

const SKIP_DIRS: &[&str] = &[
    ".git",
    ".hg",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "target",
    "dist",
    "build",
];

/// Source registry
pub struct SourceRegistry {
    config: ParsingConfig,
}

impl SourceRegistry {
    pub fn new(config: ParsingConfig) -> Self {
        Self { config }
    }

    /// Discover source files under root.
    ///
    /// Files above the size ceiling and files in unsupported languages
    /// are skipped; the result is sorted by path so downstream stages
    /// see a stable order.
    pub fn discover(&self, root: &Path) -> Result<Vec<SourceFile>> {
        let mut files: BTreeMap<String, SourceFile> = BTreeMap::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                // The root itself is always walked, whatever its name
                if e.depth() == 0 {
                    return true;
                }
                e.file_name()
                    .to_str()
                    .map(|name| !SKIP_DIRS.contains(&name) && !name.starts_with('.'))
                    .unwrap_or(false)
            })
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| {
                crate::shared::models::AtlasError::new(
                    crate::shared::models::ErrorKind::Io,
                    e.to_string(),
                )
            })?;
            if metadata.len() > self.config.max_file_bytes {
                tracing::debug!(
                    "skipping {} ({} bytes over limit)",
                    entry.path().display(),
                    metadata.len()
                );
                continue;
            }

            let rel_path = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");

            let bytes = std::fs::read(entry.path())?;
            let Some(content) = decode_bytes(&bytes) else {
                continue;
            };
            let Some(language) = detect_language(&rel_path, &content, None) else {
                continue;
            };

            files.insert(
                rel_path.clone(),
                SourceFile::new(rel_path, language, content),
            );
        }

        Ok(files.into_values().collect())
    }

    /// Register in-memory sources (tests, overlays); applies the same
    /// language detection and ordering as `discover`.
    pub fn register_contents(&self, sources: &[(String, String)]) -> Vec<SourceFile> {
        let mut files: BTreeMap<String, SourceFile> = BTreeMap::new();
        for (path, content) in sources {
            if content.len() as u64 > self.config.max_file_bytes {
                continue;
            }
            if let Some(language) = detect_language(path, content, None) {
                files.insert(
                    path.clone(),
                    SourceFile::new(path.clone(), language, content.clone()),
                );
            }
        }
        files.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::LanguageId;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.py"), "x = 1\n").unwrap();
        fs::write(temp.path().join("a.py"), "y = 2\n").unwrap();
        fs::write(temp.path().join("notes.txt"), "hello\n").unwrap();
        fs::create_dir(temp.path().join("__pycache__")).unwrap();
        fs::write(temp.path().join("__pycache__").join("c.py"), "z = 3\n").unwrap();

        let registry = SourceRegistry::new(ParsingConfig::default());
        let files = registry.discover(temp.path()).unwrap();

        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "b.py"]);
        assert_eq!(files[0].language, LanguageId::Python);
    }

    #[test]
    fn test_discover_size_limit() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("big.py"), "x = 1\n".repeat(100)).unwrap();

        let registry = SourceRegistry::new(ParsingConfig { max_file_bytes: 10 });
        let files = registry.discover(temp.path()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_register_contents() {
        let registry = SourceRegistry::new(ParsingConfig::default());
        let files = registry.register_contents(&[
            ("m.py".into(), "x = 1\n".into()),
            ("ignored.bin".into(), "data".into()),
        ]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "m.py");
    }
}
