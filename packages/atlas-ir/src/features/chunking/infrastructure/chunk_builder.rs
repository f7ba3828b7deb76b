//! Chunk construction from the IR
//!
//! Walks the document set into the chunk hierarchy; ordering and
//! local_seq assignment are deterministic so repeated builds emit
//! byte-identical chunk streams.

use crate::config::ChunkGranularity;
use crate::features::chunking::domain::{Chunk, ChunkKind};
use crate::features::ir_build::domain::IRDocument;
use crate::shared::models::NodeKind;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct ChunkBuilder {
    repo_id: String,
    snapshot_id: String,
    granularity: ChunkGranularity,
}

impl ChunkBuilder {
    pub fn new(
        repo_id: impl Into<String>,
        snapshot_id: impl Into<String>,
        granularity: ChunkGranularity,
    ) -> Self {
        Self {
            repo_id: repo_id.into(),
            snapshot_id: snapshot_id.into(),
            granularity,
        }
    }

    pub fn build(&self, documents: &[Arc<IRDocument>]) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::new();

        let mut repo_chunk = Chunk::new(&self.repo_id, &self.snapshot_id, ChunkKind::Repo, &self.repo_id);
        let repo_chunk_id = repo_chunk.chunk_id.clone();

        // Module chunks from package paths
        let mut modules: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for doc in documents {
            if let Some(file_node) = doc.file_node() {
                let package = file_node
                    .fqn
                    .rsplit_once('.')
                    .map(|(p, _)| p.to_string())
                    .unwrap_or_default();
                modules.entry(package).or_default().push(doc.file_path.clone());
            }
        }
        let mut module_ids: BTreeMap<String, String> = BTreeMap::new();
        for package in modules.keys().filter(|p| !p.is_empty()) {
            let mut chunk = Chunk::new(&self.repo_id, &self.snapshot_id, ChunkKind::Module, package);
            chunk.parent_id = Some(repo_chunk_id.clone());
            repo_chunk.children.push(chunk.chunk_id.clone());
            module_ids.insert(package.clone(), chunk.chunk_id.clone());
            chunks.push(chunk);
        }

        // Per-document chunks, documents in path order
        let mut ordered: Vec<&Arc<IRDocument>> = documents.iter().collect();
        ordered.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        for doc in ordered {
            self.build_for_document(doc, &repo_chunk_id, &module_ids, &mut chunks);
        }

        chunks.insert(0, repo_chunk);
        chunks
    }

    fn build_for_document(
        &self,
        doc: &IRDocument,
        repo_chunk_id: &str,
        module_ids: &BTreeMap<String, String>,
        chunks: &mut Vec<Chunk>,
    ) {
        let Some(file_node) = doc.file_node() else {
            return;
        };
        let mut seq = 0u32;
        let mut next_seq = || {
            let s = seq;
            seq += 1;
            s
        };

        let package = file_node
            .fqn
            .rsplit_once('.')
            .map(|(p, _)| p.to_string())
            .unwrap_or_default();
        let parent = module_ids
            .get(&package)
            .cloned()
            .unwrap_or_else(|| repo_chunk_id.to_string());

        let mut file_chunk = Chunk::new(
            &self.repo_id,
            &self.snapshot_id,
            ChunkKind::File,
            &file_node.fqn,
        );
        file_chunk.file_path = Some(doc.file_path.clone());
        file_chunk.start_line = Some(file_node.span.start_line);
        file_chunk.end_line = Some(file_node.span.end_line);
        file_chunk.content_hash = Some(doc.fingerprint.clone());
        file_chunk.parent_id = Some(parent);
        file_chunk.language = doc.language.map(|l| l.as_str().to_string());
        file_chunk.symbol_id = Some(file_node.id.clone());
        file_chunk.local_seq = next_seq();
        let file_chunk_id = file_chunk.chunk_id.clone();
        let file_chunk_idx = chunks.len();
        chunks.push(file_chunk);

        if self.granularity == ChunkGranularity::File {
            return;
        }

        // Symbol chunks in source order, so containers precede their
        // members and parent links resolve in one pass
        let mut symbol_nodes: Vec<&crate::shared::models::Node> = doc.nodes.iter().collect();
        symbol_nodes.sort_by(|a, b| {
            (a.span.start_line, a.span.start_col, &a.fqn)
                .cmp(&(b.span.start_line, b.span.start_col, &b.fqn))
        });

        let mut class_chunk_ids: BTreeMap<&str, String> = BTreeMap::new();
        for node in symbol_nodes {
            let kind = match node.kind {
                NodeKind::Class | NodeKind::Interface | NodeKind::Enum => ChunkKind::Class,
                NodeKind::Function | NodeKind::Method | NodeKind::Lambda => ChunkKind::Function,
                NodeKind::Variable if node.parent_id.as_deref() == Some(file_node.id.as_str()) => {
                    if node.attrs.get("constant").and_then(|v| v.as_bool()) == Some(true) {
                        ChunkKind::Constant
                    } else {
                        ChunkKind::Variable
                    }
                }
                _ => continue,
            };

            let mut chunk = Chunk::new(&self.repo_id, &self.snapshot_id, kind, &node.fqn);
            chunk.file_path = Some(doc.file_path.clone());
            chunk.start_line = Some(node.span.start_line);
            chunk.end_line = Some(node.span.end_line);
            chunk.language = doc.language.map(|l| l.as_str().to_string());
            chunk.symbol_id = Some(node.id.clone());
            chunk.local_seq = next_seq();

            // Parent: containing class chunk when nested, else the file
            let parent_id = node
                .parent_id
                .as_deref()
                .and_then(|p| class_chunk_ids.get(p).cloned())
                .unwrap_or_else(|| file_chunk_id.clone());
            chunk.parent_id = Some(parent_id.clone());

            if kind == ChunkKind::Class {
                class_chunk_ids.insert(node.id.as_str(), chunk.chunk_id.clone());
            }

            // Docstring chunk riding on its symbol
            if let Some(docstring) = &node.docstring {
                let mut doc_chunk = Chunk::new(
                    &self.repo_id,
                    &self.snapshot_id,
                    ChunkKind::Docstring,
                    format!("{}.__doc__", node.fqn),
                );
                doc_chunk.file_path = Some(doc.file_path.clone());
                doc_chunk.parent_id = Some(chunk.chunk_id.clone());
                doc_chunk.content_hash =
                    Some(blake3::hash(docstring.as_bytes()).to_hex().to_string());
                doc_chunk.local_seq = next_seq();
                chunk.children.push(doc_chunk.chunk_id.clone());
                chunks.push(doc_chunk);
            }

            chunks[file_chunk_idx].children.push(chunk.chunk_id.clone());
            chunks.push(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir_build::IrBuilder;
    use crate::features::parsing::{SourceParser, TreeSitterParser};
    use crate::shared::models::{LanguageId, SourceFile};

    fn chunks_of(content: &str, granularity: ChunkGranularity) -> Vec<Chunk> {
        let file = SourceFile::new("pkg/m.py", LanguageId::Python, content);
        let tree = TreeSitterParser::new().parse(&file).unwrap();
        let doc = Arc::new(IrBuilder::new("repo", "snap").build(&file, &tree));
        ChunkBuilder::new("repo", "snap", granularity).build(&[doc])
    }

    #[test]
    fn test_hierarchy_repo_module_file_function() {
        let chunks = chunks_of(
            "def f():\n    \"\"\"does f\"\"\"\n    return 1\n\nclass C:\n    def m(self):\n        pass\n",
            ChunkGranularity::Function,
        );

        let kinds: Vec<ChunkKind> = chunks.iter().map(|c| c.kind).collect();
        assert!(kinds.contains(&ChunkKind::Repo));
        assert!(kinds.contains(&ChunkKind::Module));
        assert!(kinds.contains(&ChunkKind::File));
        assert!(kinds.contains(&ChunkKind::Class));
        assert!(kinds.contains(&ChunkKind::Function));
        assert!(kinds.contains(&ChunkKind::Docstring));

        // Method chunk hangs off the class chunk
        let class_chunk = chunks.iter().find(|c| c.kind == ChunkKind::Class).unwrap();
        let method_chunk = chunks
            .iter()
            .find(|c| c.fqn == "pkg.m.C.m")
            .unwrap();
        assert_eq!(method_chunk.parent_id.as_deref(), Some(class_chunk.chunk_id.as_str()));
    }

    #[test]
    fn test_file_granularity_stops_at_files() {
        let chunks = chunks_of("def f():\n    return 1\n", ChunkGranularity::File);
        assert!(chunks.iter().all(|c| c.kind != ChunkKind::Function));
        assert!(chunks.iter().any(|c| c.kind == ChunkKind::File));
    }

    #[test]
    fn test_constant_chunks() {
        let chunks = chunks_of("MAX_SIZE = 10\nregular = 2\n", ChunkGranularity::Function);
        assert!(chunks
            .iter()
            .any(|c| c.kind == ChunkKind::Constant && c.fqn == "pkg.m.MAX_SIZE"));
        assert!(chunks
            .iter()
            .any(|c| c.kind == ChunkKind::Variable && c.fqn == "pkg.m.regular"));
    }

    #[test]
    fn test_deterministic_output() {
        let a = chunks_of("def f():\n    return 1\n", ChunkGranularity::Function);
        let b = chunks_of("def f():\n    return 1\n", ChunkGranularity::Function);
        assert_eq!(a, b);
    }
}
