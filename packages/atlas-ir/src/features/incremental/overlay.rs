//! Speculative execution overlay
//!
//! A `SpeculativePatch` set produces a `GraphDelta` without touching
//! the base build. Queries go through the merged view; the delta is
//! committed atomically into the base maps or discarded.

use crate::features::cross_file::{GlobalContext, Symbol};
use crate::features::ir_build::domain::IRDocument;
use crate::features::ir_build::IrBuilder;
use crate::features::parsing::{SourceParser, TreeSitterParser};
use crate::shared::models::{LanguageId, NodeKind, Result, SourceFile};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// One uncommitted edit
#[derive(Debug, Clone)]
pub struct SpeculativePatch {
    pub file_path: String,
    pub new_content: String,
}

/// Overlay produced from patches; base artifacts stay untouched
#[derive(Debug, Default)]
pub struct GraphDelta {
    pub session_id: String,
    pub replaced_documents: HashMap<String, Arc<IRDocument>>,
    pub removed_files: BTreeSet<String>,
    /// Symbols defined by the overlay documents
    pub overlay_symbols: HashMap<String, Arc<Symbol>>,
}

impl GraphDelta {
    /// Build a delta by re-running the structural build on the patched
    /// contents
    pub fn from_patches(
        repo_id: &str,
        snapshot_id: &str,
        patches: &[SpeculativePatch],
    ) -> Result<Self> {
        let parser = TreeSitterParser::new();
        let builder = IrBuilder::new(repo_id, snapshot_id);

        let mut delta = GraphDelta {
            session_id: uuid::Uuid::new_v4().to_string(),
            ..Default::default()
        };

        for patch in patches {
            let language = crate::features::parsing::infrastructure::language_registry::detect_language(
                &patch.file_path,
                &patch.new_content,
                None,
            )
            .unwrap_or(LanguageId::Python);
            let file = SourceFile::new(&patch.file_path, language, &patch.new_content);
            let tree = parser.parse(&file)?;
            let doc = Arc::new(builder.build(&file, &tree));

            let shared_path = Arc::new(doc.file_path.clone());
            for node in &doc.nodes {
                if node.kind == NodeKind::Import || node.kind == NodeKind::External {
                    continue;
                }
                if node.fqn.is_empty() {
                    continue;
                }
                delta.overlay_symbols.insert(
                    node.fqn.clone(),
                    Arc::new(Symbol::new_with_shared_path(
                        node.fqn.clone(),
                        node.name.clone().unwrap_or_default(),
                        node.kind,
                        Arc::clone(&shared_path),
                        node.id.clone(),
                        node.span,
                    )),
                );
            }
            delta
                .replaced_documents
                .insert(patch.file_path.clone(), doc);
        }

        Ok(delta)
    }

    /// Apply atomically into the base document map; returns the files
    /// whose artifacts downstream consumers must refresh
    pub fn commit(self, base: &mut HashMap<String, Arc<IRDocument>>) -> BTreeSet<String> {
        let mut touched = BTreeSet::new();
        for (path, doc) in self.replaced_documents {
            base.insert(path.clone(), doc);
            touched.insert(path);
        }
        for path in self.removed_files {
            base.remove(&path);
            touched.insert(path);
        }
        touched
    }
}

/// Merged read view over base + overlay
pub struct OverlayView<'a> {
    pub base_documents: &'a HashMap<String, Arc<IRDocument>>,
    pub base_context: &'a GlobalContext,
    pub delta: &'a GraphDelta,
}

impl<'a> OverlayView<'a> {
    pub fn new(
        base_documents: &'a HashMap<String, Arc<IRDocument>>,
        base_context: &'a GlobalContext,
        delta: &'a GraphDelta,
    ) -> Self {
        Self {
            base_documents,
            base_context,
            delta,
        }
    }

    pub fn document(&self, file_path: &str) -> Option<&Arc<IRDocument>> {
        if self.delta.removed_files.contains(file_path) {
            return None;
        }
        self.delta
            .replaced_documents
            .get(file_path)
            .or_else(|| self.base_documents.get(file_path))
    }

    pub fn resolve(&self, fqn: &str) -> Option<&Arc<Symbol>> {
        self.delta
            .overlay_symbols
            .get(fqn)
            .or_else(|| self.base_context.symbol_index.get(fqn))
    }
}
