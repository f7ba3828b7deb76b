//! IR storage port

use crate::features::ir_build::domain::IRDocument;
use crate::shared::models::Result;
use std::sync::Arc;

/// Content-addressed IR document store.
///
/// Keys are (repo, snapshot, file); implementations address content by
/// the document fingerprint.
pub trait IrStore: Send + Sync {
    fn put(&self, doc: Arc<IRDocument>) -> Result<()>;

    fn get(&self, repo_id: &str, snapshot_id: &str, file_path: &str)
        -> Result<Option<Arc<IRDocument>>>;

    fn delete(&self, repo_id: &str, snapshot_id: &str, file_path: &str) -> Result<()>;
}
