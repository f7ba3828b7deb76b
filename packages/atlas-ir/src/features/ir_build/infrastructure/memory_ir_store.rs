//! In-memory IR store (reference port implementation)

use crate::features::ir_build::domain::IRDocument;
use crate::features::ir_build::ports::IrStore;
use crate::shared::models::Result;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct MemoryIrStore {
    docs: DashMap<(String, String, String), Arc<IRDocument>>,
}

impl MemoryIrStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl IrStore for MemoryIrStore {
    fn put(&self, doc: Arc<IRDocument>) -> Result<()> {
        self.docs.insert(
            (
                doc.repo_id.clone(),
                doc.snapshot_id.clone(),
                doc.file_path.clone(),
            ),
            doc,
        );
        Ok(())
    }

    fn get(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        file_path: &str,
    ) -> Result<Option<Arc<IRDocument>>> {
        Ok(self
            .docs
            .get(&(
                repo_id.to_string(),
                snapshot_id.to_string(),
                file_path.to_string(),
            ))
            .map(|v| Arc::clone(&v)))
    }

    fn delete(&self, repo_id: &str, snapshot_id: &str, file_path: &str) -> Result<()> {
        self.docs.remove(&(
            repo_id.to_string(),
            snapshot_id.to_string(),
            file_path.to_string(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = MemoryIrStore::new();
        let doc = Arc::new(IRDocument::new("r", "s", "a.py"));

        store.put(Arc::clone(&doc)).unwrap();
        assert!(store.get("r", "s", "a.py").unwrap().is_some());

        store.delete("r", "s", "a.py").unwrap();
        assert!(store.get("r", "s", "a.py").unwrap().is_none());
    }
}
