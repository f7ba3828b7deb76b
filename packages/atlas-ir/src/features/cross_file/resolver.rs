//! Cross-file resolver (C3)
//!
//! Pass 1 accumulates every exported FQN and per-file import table into
//! concurrent maps; pass 2 rewrites dangling edge targets per document.
//! Unresolved names become one External node per target path; ambiguous
//! resolutions are tagged, never dropped.
//!
//! The incremental entry point rewrites only fresh documents and keeps
//! already-resolved documents by pointer; the context is reassembled
//! from the full resolved set either way, so a full and an incremental
//! build of the same snapshot produce equal contexts.

use super::global_context::GlobalContext;
use super::symbol_index::SymbolIndex;
use super::types::{ImportTable, Symbol};
use crate::features::ir_build::domain::IRDocument;
use crate::shared::models::{EdgeKind, Node, NodeKind, Span, Value};
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

const UNRESOLVED_IMPORT: &str = "unresolved:import:";
const UNRESOLVED_CALL: &str = "unresolved:call:";
const UNRESOLVED_TYPE: &str = "unresolved:type:";

/// Resolver output: resolved documents plus the global context
pub struct ResolveOutput {
    pub documents: Vec<Arc<IRDocument>>,
    pub context: Arc<GlobalContext>,
}

pub struct CrossFileResolver;

impl CrossFileResolver {
    /// Full resolve: every document is rewritten
    pub fn resolve(documents: Vec<Arc<IRDocument>>) -> ResolveOutput {
        Self::resolve_incremental(Vec::new(), documents, &HashMap::new())
    }

    /// Incremental resolve: `base` documents are already resolved and
    /// pass through untouched (pointer-preserved); only `fresh`
    /// documents are rewritten against the combined symbol index.
    pub fn resolve_incremental(
        base: Vec<Arc<IRDocument>>,
        fresh: Vec<Arc<IRDocument>>,
        prev_externals: &HashMap<String, Node>,
    ) -> ResolveOutput {
        let mut all: Vec<Arc<IRDocument>> = base;
        let fresh_start = all.len();
        all.extend(fresh);

        let index = SymbolIndex::build_from_irs(&all);

        // Import tables for the fresh documents
        let import_tables: DashMap<String, ImportTable> = DashMap::new();
        all[fresh_start..].par_iter().for_each(|doc| {
            let mut table = ImportTable::default();
            for edge in &doc.edges {
                if edge.kind != EdgeKind::Imports {
                    continue;
                }
                let Some(path) = edge.target_id.strip_prefix(UNRESOLVED_IMPORT) else {
                    continue;
                };
                let local = edge
                    .attrs
                    .get("local_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                if local == "*" || local.is_empty() {
                    table.wildcard_modules.push(path.to_string());
                } else {
                    table.named.insert(local.to_string(), path.to_string());
                }
            }
            import_tables.insert(doc.file_path.clone(), table);
        });

        let externals: DashMap<String, Node> = prev_externals
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let rewritten: Vec<Arc<IRDocument>> = all[fresh_start..]
            .par_iter()
            .map(|doc| Self::rewrite_document(doc, &index, &import_tables, &externals))
            .collect();

        let mut documents: Vec<Arc<IRDocument>> = all[..fresh_start].to_vec();
        documents.extend(rewritten);
        documents.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        let context = Self::assemble_context(&documents, index, externals);

        ResolveOutput {
            documents,
            context: Arc::new(context),
        }
    }

    /// Snapshot-wide invariants over resolved documents: every edge
    /// target exists in the snapshot or is an External node, no
    /// unresolved placeholders remain, and each symbol has at most one
    /// definition occurrence.
    pub fn validate_snapshot(
        documents: &[Arc<IRDocument>],
        context: &GlobalContext,
    ) -> crate::shared::models::Result<()> {
        use crate::shared::models::AtlasError;
        use std::collections::HashSet;

        let mut ids: HashSet<&str> = HashSet::new();
        for doc in documents {
            for node in &doc.nodes {
                ids.insert(node.id.as_str());
            }
        }
        for node in context.external_nodes.values() {
            ids.insert(node.id.as_str());
        }

        for doc in documents {
            for edge in &doc.edges {
                if edge.target_id.starts_with("unresolved:") {
                    return Err(AtlasError::invariant(format!(
                        "unresolved edge target {} survived resolution in {}",
                        edge.target_id, doc.file_path
                    )));
                }
                if !ids.contains(edge.target_id.as_str()) {
                    return Err(AtlasError::invariant(format!(
                        "edge target {} missing from snapshot (source {})",
                        edge.target_id, doc.file_path
                    )));
                }
            }
        }

        let mut defined: HashSet<&str> = HashSet::new();
        for doc in documents {
            for occ in &doc.occurrences {
                if occ.is_definition() && !defined.insert(occ.symbol_id.as_str()) {
                    return Err(AtlasError::invariant(format!(
                        "symbol {} defined more than once in the snapshot",
                        occ.symbol_id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Context assembly from fully-resolved documents
    fn assemble_context(
        documents: &[Arc<IRDocument>],
        index: SymbolIndex,
        externals: DashMap<String, Node>,
    ) -> GlobalContext {
        // Node id → owning file
        let mut file_of: ahash::AHashMap<&str, &str> = ahash::AHashMap::new();
        for doc in documents {
            for node in &doc.nodes {
                file_of.insert(node.id.as_str(), doc.file_path.as_str());
            }
        }

        let mut file_deps: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut direct_inherits: HashMap<String, Vec<String>> = HashMap::new();

        for doc in documents {
            for edge in &doc.edges {
                if edge.kind.is_dependency() {
                    if let Some(target_file) = file_of.get(edge.target_id.as_str()) {
                        if *target_file != doc.file_path {
                            file_deps
                                .entry(doc.file_path.clone())
                                .or_default()
                                .insert(target_file.to_string());
                        }
                    }
                }
                if matches!(edge.kind, EdgeKind::Inherits | EdgeKind::Implements)
                    && file_of.contains_key(edge.target_id.as_str())
                {
                    direct_inherits
                        .entry(edge.source_id.clone())
                        .or_default()
                        .push(edge.target_id.clone());
                }
            }
        }
        for parents in direct_inherits.values_mut() {
            parents.sort();
            parents.dedup();
        }

        let mut package_index: HashMap<String, Vec<String>> = HashMap::new();
        for doc in documents {
            if let Some(file_node) = doc.file_node() {
                let package = file_node
                    .fqn
                    .rsplit_once('.')
                    .map(|(p, _)| p.to_string())
                    .unwrap_or_default();
                package_index
                    .entry(package)
                    .or_default()
                    .push(doc.file_path.clone());
            }
        }
        for files in package_index.values_mut() {
            files.sort();
        }

        GlobalContext {
            symbol_index: index.into_immutable(),
            file_deps,
            inheritance_closure: GlobalContext::close_inheritance(&direct_inherits),
            package_index,
            external_nodes: externals.into_iter().collect(),
        }
    }

    fn rewrite_document(
        doc: &Arc<IRDocument>,
        index: &SymbolIndex,
        import_tables: &DashMap<String, ImportTable>,
        externals: &DashMap<String, Node>,
    ) -> Arc<IRDocument> {
        let module_fqn = doc
            .file_node()
            .map(|n| n.fqn.clone())
            .unwrap_or_default();
        let table = import_tables
            .get(&doc.file_path)
            .map(|t| t.clone())
            .unwrap_or_default();

        let mut new_doc = (**doc).clone();

        for edge in &mut new_doc.edges {
            let target = edge.target_id.clone();
            let resolution = if let Some(path) = target.strip_prefix(UNRESOLVED_IMPORT) {
                Self::resolve_path(path, &module_fqn, index)
            } else if let Some(path) = target.strip_prefix(UNRESOLVED_CALL) {
                Self::resolve_name(path, &module_fqn, &table, index)
            } else if let Some(path) = target.strip_prefix(UNRESOLVED_TYPE) {
                Self::resolve_name(path, &module_fqn, &table, index)
            } else {
                continue;
            };

            match resolution {
                Resolution::Unique(symbol) => {
                    edge.target_id = symbol.node_id.clone();
                }
                Resolution::Ambiguous(symbol, count) => {
                    edge.target_id = symbol.node_id.clone();
                    edge.attrs.insert("ambiguous".into(), Value::Bool(true));
                    edge.attrs
                        .insert("candidates".into(), Value::from(count as u64));
                }
                Resolution::External(path) => {
                    let node = externals
                        .entry(path.clone())
                        .or_insert_with(|| Self::external_node(&path))
                        .clone();
                    edge.target_id = node.id;
                }
            }
        }

        new_doc.normalize();
        Arc::new(new_doc)
    }

    /// One External node per unresolved path; the id prefix keeps
    /// invariant checks aware that the endpoint lives outside the
    /// snapshot.
    fn external_node(path: &str) -> Node {
        let hex = blake3::hash(path.as_bytes()).to_hex();
        Node::new(
            format!("external:{}", &hex.as_str()[..16]),
            NodeKind::External,
            path,
            "<external>",
            Span::zero(),
        )
    }

    /// Resolve an explicit dotted path (import target)
    fn resolve_path(path: &str, module_fqn: &str, index: &SymbolIndex) -> Resolution {
        if let Some(symbol) = index.get(path) {
            return Resolution::Unique(symbol);
        }
        // Relative import written against the importer's package
        if let Some(package) = module_fqn.rsplit_once('.').map(|(p, _)| p) {
            if let Some(symbol) = index.get(&format!("{}.{}", package, path)) {
                return Resolution::Unique(symbol);
            }
        }
        Resolution::External(path.to_string())
    }

    /// Resolve a name as written at a use site (call/type reference)
    fn resolve_name(
        written: &str,
        module_fqn: &str,
        table: &ImportTable,
        index: &SymbolIndex,
    ) -> Resolution {
        let (root, rest) = match written.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (written, None),
        };

        // Imported root: rewrite through the import table
        if let Some(target) = table.named.get(root) {
            let full = match rest {
                Some(rest) => format!("{}.{}", target, rest),
                None => target.clone(),
            };
            if let Some(symbol) = index.get(&full) {
                return Resolution::Unique(symbol);
            }
            return Resolution::External(full);
        }

        // Absolute path already
        if let Some(symbol) = index.get(written) {
            return Resolution::Unique(symbol);
        }

        // Same-module symbol
        if !module_fqn.is_empty() {
            if let Some(symbol) = index.get(&format!("{}.{}", module_fqn, written)) {
                return Resolution::Unique(symbol);
            }
        }

        // Wildcard imports: candidate per exporting module
        if rest.is_none() && !table.wildcard_modules.is_empty() {
            let mut candidates: Vec<Arc<Symbol>> = table
                .wildcard_modules
                .iter()
                .filter_map(|module| index.get(&format!("{}.{}", module, written)))
                .collect();
            candidates.sort_by(|a, b| a.fqn.cmp(&b.fqn));

            match candidates.len() {
                0 => {}
                1 => return Resolution::Unique(candidates.remove(0)),
                n => {
                    // Prefer the exporter whose package path prefixes
                    // the importer's module path
                    let preferred = candidates.iter().position(|c| {
                        let exporter_module =
                            c.fqn.rsplit_once('.').map(|(p, _)| p).unwrap_or("");
                        let package = exporter_module
                            .rsplit_once('.')
                            .map(|(p, _)| p)
                            .unwrap_or("");
                        !package.is_empty() && module_fqn.starts_with(package)
                    });
                    return match preferred {
                        Some(i) => Resolution::Unique(candidates.remove(i)),
                        None => Resolution::Ambiguous(candidates.remove(0), n),
                    };
                }
            }
        }

        Resolution::External(written.to_string())
    }
}

enum Resolution {
    Unique(Arc<Symbol>),
    /// Best candidate plus total candidate count
    Ambiguous(Arc<Symbol>, usize),
    External(String),
}
