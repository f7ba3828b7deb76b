//! Rename detection
//!
//! Deleted and added files are grouped by extension; within a group
//! every pair is compared, pre-filtered by size (±10%) and filename
//! bigram similarity, and confirmed by content-hash equality. Grouping
//! keeps the pairing near O(n + k²) for k same-extension candidates.

use super::change_set::ChangeSet;
use std::collections::HashMap;

/// File facts needed for pairing
#[derive(Debug, Clone)]
pub struct FileFacts {
    pub path: String,
    pub content_hash: String,
    pub size_bytes: u64,
}

pub struct RenameDetector;

impl RenameDetector {
    /// Rewrite delete+add pairs in the change set as renames
    pub fn detect(change_set: &mut ChangeSet, deleted: &[FileFacts], added: &[FileFacts]) {
        let mut deleted_by_ext: HashMap<&str, Vec<&FileFacts>> = HashMap::new();
        for file in deleted {
            deleted_by_ext.entry(extension(&file.path)).or_default().push(file);
        }
        let mut added_by_ext: HashMap<&str, Vec<&FileFacts>> = HashMap::new();
        for file in added {
            added_by_ext.entry(extension(&file.path)).or_default().push(file);
        }

        for (ext, old_files) in &deleted_by_ext {
            let Some(new_files) = added_by_ext.get(ext) else {
                continue;
            };

            let mut claimed_new: Vec<&str> = Vec::new();
            for old in old_files {
                // Best candidate: identical content, highest filename
                // similarity when several match
                let mut best: Option<(&FileFacts, f64)> = None;
                for new in new_files {
                    if claimed_new.contains(&new.path.as_str()) {
                        continue;
                    }
                    if !size_within_tolerance(old.size_bytes, new.size_bytes) {
                        continue;
                    }
                    if old.content_hash != new.content_hash {
                        continue;
                    }
                    let similarity = filename_jaccard(&old.path, &new.path);
                    if best.map(|(_, s)| similarity > s).unwrap_or(true) {
                        best = Some((new, similarity));
                    }
                }
                if let Some((new, _)) = best {
                    claimed_new.push(&new.path);
                    change_set.mark_as_renamed(&old.path, &new.path);
                }
            }
        }
    }
}

fn extension(path: &str) -> &str {
    path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

fn size_within_tolerance(a: u64, b: u64) -> bool {
    let max = a.max(b) as f64;
    let min = a.min(b) as f64;
    max == 0.0 || (max - min) / max <= 0.10
}

/// Jaccard similarity over filename character bigrams
fn filename_jaccard(a: &str, b: &str) -> f64 {
    let name = |p: &str| {
        p.rsplit('/')
            .next()
            .unwrap_or(p)
            .to_lowercase()
    };
    let bigrams = |s: &str| -> std::collections::HashSet<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };

    let a_set = bigrams(&name(a));
    let b_set = bigrams(&name(b));
    if a_set.is_empty() && b_set.is_empty() {
        return 1.0;
    }
    let intersection = a_set.intersection(&b_set).count() as f64;
    let union = a_set.union(&b_set).count() as f64;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(path: &str, content: &str) -> FileFacts {
        FileFacts {
            path: path.to_string(),
            content_hash: blake3::hash(content.as_bytes()).to_hex().to_string(),
            size_bytes: content.len() as u64,
        }
    }

    #[test]
    fn test_identical_content_is_rename() {
        let mut cs = ChangeSet::new();
        cs.add_deleted("a.py");
        cs.add_added("b.py");

        let content = "def foo():\n    return 1\n".repeat(10);
        RenameDetector::detect(&mut cs, &[facts("a.py", &content)], &[facts("b.py", &content)]);

        assert!(cs.added.is_empty());
        assert!(cs.deleted.is_empty());
        assert_eq!(cs.renamed.get("a.py").map(|s| s.as_str()), Some("b.py"));
    }

    #[test]
    fn test_different_content_is_not_rename() {
        let mut cs = ChangeSet::new();
        cs.add_deleted("a.py");
        cs.add_added("b.py");

        RenameDetector::detect(
            &mut cs,
            &[facts("a.py", "x = 1\n")],
            &[facts("b.py", "y = 2\n")],
        );

        assert!(cs.renamed.is_empty());
        assert!(cs.deleted.contains("a.py"));
        assert!(cs.added.contains("b.py"));
    }

    #[test]
    fn test_extension_grouping() {
        let mut cs = ChangeSet::new();
        cs.add_deleted("a.py");
        cs.add_added("a.ts");

        let content = "shared content";
        RenameDetector::detect(&mut cs, &[facts("a.py", content)], &[facts("a.ts", content)]);

        // Different extensions never pair
        assert!(cs.renamed.is_empty());
    }

    #[test]
    fn test_best_filename_similarity_wins() {
        let mut cs = ChangeSet::new();
        cs.add_deleted("utils_old.py");
        cs.add_added("utils_new.py");
        cs.add_added("zzz.py");

        let content = "def helper():\n    pass\n";
        RenameDetector::detect(
            &mut cs,
            &[facts("utils_old.py", content)],
            &[facts("utils_new.py", content), facts("zzz.py", content)],
        );

        assert_eq!(
            cs.renamed.get("utils_old.py").map(|s| s.as_str()),
            Some("utils_new.py")
        );
        assert!(cs.added.contains("zzz.py"));
    }
}
