//! Concurrent symbol index
//!
//! Two-phase: lock-free accumulation into DashMap during the parallel
//! pass, promotion to an immutable map inside GlobalContext afterwards.

use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use super::types::Symbol;
use crate::features::ir_build::domain::IRDocument;
use crate::shared::models::NodeKind;

/// Lock-free concurrent symbol index
pub struct SymbolIndex {
    /// FQN → symbol
    symbols: DashMap<String, Arc<Symbol>>,

    /// File → FQNs defined in that file
    file_symbols: DashMap<String, Vec<String>>,

    /// Short name → FQNs (wildcard-import resolution)
    name_to_fqns: DashMap<String, Vec<String>>,
}

impl Default for SymbolIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self {
            symbols: DashMap::new(),
            file_symbols: DashMap::new(),
            name_to_fqns: DashMap::new(),
        }
    }

    /// Build from IR documents in parallel.
    ///
    /// Import nodes are references, not definitions, and stay out of
    /// the table. The file path Arc is shared across all symbols of the
    /// same file.
    pub fn build_from_irs(docs: &[Arc<IRDocument>]) -> Self {
        let index = Self::new();

        docs.par_iter().for_each(|doc| {
            let mut file_fqns = Vec::with_capacity(doc.nodes.len());
            let shared_file_path = Arc::new(doc.file_path.clone());

            for node in &doc.nodes {
                if node.kind == NodeKind::Import || node.kind == NodeKind::External {
                    continue;
                }
                if node.fqn.is_empty() {
                    continue;
                }

                let name = node
                    .name
                    .clone()
                    .unwrap_or_else(|| extract_name(&node.fqn));

                let symbol = Arc::new(Symbol::new_with_shared_path(
                    node.fqn.clone(),
                    name.clone(),
                    node.kind,
                    Arc::clone(&shared_file_path),
                    node.id.clone(),
                    node.span,
                ));

                let fqn = node.fqn.clone();
                index.symbols.insert(fqn.clone(), Arc::clone(&symbol));
                file_fqns.push(fqn.clone());

                index.name_to_fqns.entry(name).or_default().push(fqn);
            }

            if !file_fqns.is_empty() {
                index.file_symbols.insert(doc.file_path.clone(), file_fqns);
            }
        });

        index
    }

    pub fn get(&self, fqn: &str) -> Option<Arc<Symbol>> {
        self.symbols.get(fqn).map(|v| v.clone())
    }

    pub fn contains(&self, fqn: &str) -> bool {
        self.symbols.contains_key(fqn)
    }

    pub fn get_by_name(&self, name: &str) -> Vec<String> {
        self.name_to_fqns
            .get(name)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn get_file_symbols(&self, file_path: &str) -> Vec<Arc<Symbol>> {
        self.file_symbols
            .get(file_path)
            .map(|fqns| fqns.iter().filter_map(|fqn| self.get(fqn)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Promote to the immutable form held by GlobalContext
    pub fn into_immutable(self) -> HashMap<String, Arc<Symbol>> {
        self.symbols.into_iter().collect()
    }
}

fn extract_name(fqn: &str) -> String {
    fqn.rsplit('.').next().unwrap_or(fqn).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir_build::IrBuilder;
    use crate::features::parsing::{SourceParser, TreeSitterParser};
    use crate::shared::models::{LanguageId, SourceFile};

    fn doc(path: &str, content: &str) -> Arc<IRDocument> {
        let file = SourceFile::new(path, LanguageId::Python, content);
        let tree = TreeSitterParser::new().parse(&file).unwrap();
        Arc::new(IrBuilder::new("repo", "snap").build(&file, &tree))
    }

    #[test]
    fn test_index_contains_functions_not_imports() {
        let docs = vec![doc("mod_a.py", "import os\n\ndef foo():\n    pass\n")];
        let index = SymbolIndex::build_from_irs(&docs);

        assert!(index.contains("mod_a.foo"));
        assert!(index.get_by_name("foo").contains(&"mod_a.foo".to_string()));
        assert!(!index.get_by_name("os").iter().any(|f| f.contains("import")));
    }

    #[test]
    fn test_file_symbols() {
        let docs = vec![
            doc("mod_a.py", "def foo():\n    pass\n"),
            doc("mod_b.py", "def bar():\n    pass\n"),
        ];
        let index = SymbolIndex::build_from_irs(&docs);

        let symbols = index.get_file_symbols("mod_a.py");
        assert!(symbols.iter().any(|s| s.fqn == "mod_a.foo"));
        assert!(!symbols.iter().any(|s| s.fqn == "mod_b.bar"));
    }
}
