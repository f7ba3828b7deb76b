//! Change set model

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// File-level delta between two snapshots.
///
/// Disjointness is maintained by construction: a path lives in at most
/// one of {added, modified, deleted, renamed-targets}.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    /// old path → new path
    pub renamed: BTreeMap<String, String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn detach(&mut self, path: &str) {
        self.added.remove(path);
        self.modified.remove(path);
        self.deleted.remove(path);
        self.renamed.retain(|_, new| new != path);
    }

    pub fn add_added(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.detach(&path);
        self.added.insert(path);
    }

    pub fn add_modified(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.detach(&path);
        self.modified.insert(path);
    }

    pub fn add_deleted(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.detach(&path);
        self.deleted.insert(path);
    }

    /// Reclassify a delete+add pair as a rename
    pub fn mark_as_renamed(&mut self, old: impl Into<String>, new: impl Into<String>) {
        let old = old.into();
        let new = new.into();
        self.deleted.remove(&old);
        self.added.remove(&new);
        self.renamed.insert(old, new);
    }

    /// added ∪ modified ∪ renamed-targets
    pub fn all_changed(&self) -> BTreeSet<String> {
        let mut out = self.added.clone();
        out.extend(self.modified.iter().cloned());
        out.extend(self.renamed.values().cloned());
        out
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.renamed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len() + self.renamed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjointness() {
        let mut cs = ChangeSet::new();
        cs.add_added("a.py");
        cs.add_modified("a.py");

        assert!(!cs.added.contains("a.py"));
        assert!(cs.modified.contains("a.py"));
    }

    #[test]
    fn test_mark_as_renamed() {
        let mut cs = ChangeSet::new();
        cs.add_deleted("a.py");
        cs.add_added("b.py");
        cs.mark_as_renamed("a.py", "b.py");

        assert!(cs.added.is_empty());
        assert!(cs.deleted.is_empty());
        assert_eq!(cs.renamed.get("a.py").map(|s| s.as_str()), Some("b.py"));
    }

    #[test]
    fn test_all_changed() {
        let mut cs = ChangeSet::new();
        cs.add_added("a.py");
        cs.add_modified("b.py");
        cs.add_deleted("c.py");
        cs.mark_as_renamed("old.py", "new.py");

        let changed = cs.all_changed();
        assert!(changed.contains("a.py"));
        assert!(changed.contains("b.py"));
        assert!(changed.contains("new.py"));
        assert!(!changed.contains("c.py"));
        assert!(!changed.contains("old.py"));
    }
}
