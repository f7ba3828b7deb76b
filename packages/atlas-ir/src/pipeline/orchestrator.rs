//! Pipeline orchestration
//!
//! Stage order: parse → structural IR → cross-file resolve →
//! (semantic ∥ type enrich) → points-to → escape → taint → chunks.
//! Full and incremental builds run the same stages; the incremental
//! path restricts parsing/IR/resolve to the affected set and reuses
//! prior artifacts for everything else. Artifacts are normalized before
//! caching so equality is by value.

use crate::config::AnalysisConfig;
use crate::features::cache::{
    ArtifactKind, CacheKey, DependencyGraph, FileMetadata, Fingerprint, SubjectKey, TieredCache,
};
use crate::features::chunking::{ChunkBuilder, ChunkEmitter, LexicalStore, VectorStore};
use crate::features::cross_file::{CallGraph, CrossFileResolver, ResolveOutput};
use crate::features::heap_analysis::EscapeAnalysis;
use crate::features::incremental::{
    ChangeSet, FileManifest, ImpactClassifier, ImpactLevel, IncrementalController,
};
use crate::features::ir_build::domain::IRDocument;
use crate::features::ir_build::{IrBuilder, IrStore};
use crate::features::parsing::{SourceParser, TreeSitterParser};
use crate::features::points_to::{AndersenSolver, PointsToGraph};
use crate::features::semantic::{build_semantic_irs, SemanticIr};
use crate::features::ssa::SsaBuilder;
use crate::features::taint::{RuleCatalog, TaintAnalysis};
use crate::features::type_enrich::TypeEnricher;
use crate::pipeline::cancellation::CancellationToken;
use crate::pipeline::result::{BuildResult, BuildStats, ErrorSummary};
use crate::shared::models::{AtlasError, RepoSnapshot, Result, SourceFile};
use prometheus::Registry;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

pub struct PipelineOrchestrator {
    config: AnalysisConfig,
    config_hash: String,
    catalog: RuleCatalog,
    parser: TreeSitterParser,

    ir_cache: Option<TieredCache<IRDocument>>,
    #[allow(dead_code)]
    registry: Registry,

    enricher: Option<TypeEnricher>,
    ir_store: Option<Arc<dyn IrStore>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    lexical_store: Option<Arc<dyn LexicalStore>>,
}

impl PipelineOrchestrator {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        crate::init_rayon(config.parallel.effective_workers());

        let registry = Registry::new();
        let ir_cache = if config.cache.l0.enabled || config.cache.l1.enabled || config.cache.l2.enabled
        {
            Some(
                TieredCache::new(&config.cache, &registry)
                    .map_err(crate::shared::models::AtlasError::from)?,
            )
        } else {
            None
        };

        let config_hash = config.config_hash();
        Ok(Self {
            config,
            config_hash,
            catalog: RuleCatalog::default(),
            parser: TreeSitterParser::new(),
            ir_cache,
            registry,
            enricher: None,
            ir_store: None,
            vector_store: None,
            lexical_store: None,
        })
    }

    pub fn with_rule_catalog(mut self, catalog: RuleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_type_enricher(mut self, enricher: TypeEnricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_ir_store(mut self, store: Arc<dyn IrStore>) -> Self {
        self.ir_store = Some(store);
        self
    }

    pub fn with_index_stores(
        mut self,
        vector: Arc<dyn VectorStore>,
        lexical: Arc<dyn LexicalStore>,
    ) -> Self {
        self.vector_store = Some(vector);
        self.lexical_store = Some(lexical);
        self
    }

    // ────────────────────────────────────────────────────────────────
    // Full build
    // ────────────────────────────────────────────────────────────────

    pub fn build_full(
        &self,
        snapshot: &RepoSnapshot,
        files: Vec<SourceFile>,
        token: &CancellationToken,
    ) -> Result<BuildResult> {
        let started = Instant::now();
        let mut errors = ErrorSummary::default();
        let mut stats = BuildStats {
            files_total: files.len(),
            ..Default::default()
        };

        token.checkpoint()?;

        // C1 + C2 (cache-wrapped, embarrassingly parallel)
        let raw_docs = self.build_documents(snapshot, &files, &mut errors, &mut stats, token)?;

        token.checkpoint()?;

        // C3
        let resolved = CrossFileResolver::resolve(raw_docs);

        self.finish(snapshot, files, resolved, ChangeSet::default(), None, errors, stats, started, token)
    }

    // ────────────────────────────────────────────────────────────────
    // Incremental build
    // ────────────────────────────────────────────────────────────────

    pub fn build_incremental(
        &self,
        previous: &BuildResult,
        files: Vec<SourceFile>,
        token: &CancellationToken,
    ) -> Result<BuildResult> {
        let started = Instant::now();
        let mut errors = ErrorSummary::default();
        let mut stats = BuildStats {
            files_total: files.len(),
            ..Default::default()
        };

        token.checkpoint()?;

        let change_set = previous.manifest.diff(&files);
        if change_set.is_empty() {
            let mut result = previous.clone_artifacts(&previous.snapshot);
            result.stats.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(result);
        }

        let files_by_path: HashMap<&str, &SourceFile> =
            files.iter().map(|f| (f.path.as_str(), f)).collect();

        // Classify impact per changed file (parse once, reuse below)
        let mut fresh_raw: HashMap<String, Arc<IRDocument>> = HashMap::new();
        let mut impacts: HashMap<String, ImpactLevel> = HashMap::new();
        for path in change_set.modified.iter() {
            token.checkpoint()?;
            let Some(file) = files_by_path.get(path.as_str()) else {
                continue;
            };
            match self.build_one(&previous.snapshot, file) {
                Ok(doc) => {
                    if let Some(old) = previous.documents.get(path) {
                        impacts.insert(path.clone(), ImpactClassifier::classify(old, &doc));
                    }
                    fresh_raw.insert(path.clone(), doc);
                }
                Err(err) => errors.record_file_error(path.clone(), err.to_string()),
            }
        }

        // Reverse dependency graph from the previous context
        let mut dep_graph = DependencyGraph::new();
        for (path, entry) in &previous.manifest.entries {
            let deps: Vec<String> = previous
                .context
                .dependencies_of(path)
                .map(|d| d.iter().cloned().collect())
                .unwrap_or_default();
            let fp = Fingerprint::from_hex(&entry.content_hash)
                .unwrap_or_else(|_| Fingerprint::zero());
            dep_graph.register_file(path, fp, &deps);
        }

        let controller = IncrementalController::new(self.config.incremental.clone());
        let plan = controller.plan(change_set, &impacts, &dep_graph);
        tracing::info!(
            "incremental plan: {} affected files (mode {:?})",
            plan.affected.len(),
            plan.mode_used
        );

        // Build raw documents for the affected set
        let mut fresh: Vec<Arc<IRDocument>> = Vec::new();
        for path in &plan.affected {
            token.checkpoint()?;
            if let Some(doc) = fresh_raw.remove(path) {
                fresh.push(doc);
                continue;
            }
            let Some(file) = files_by_path.get(path.as_str()) else {
                continue;
            };
            match self.build_one(&previous.snapshot, file) {
                Ok(doc) => fresh.push(doc),
                Err(err) => errors.record_file_error(path.clone(), err.to_string()),
            }
        }
        stats.files_analyzed = fresh.len();
        stats.files_from_cache = files.len().saturating_sub(fresh.len());

        // Untouched documents pass through by pointer
        let gone: HashSet<&String> = plan
            .change_set
            .deleted
            .iter()
            .chain(plan.change_set.renamed.keys())
            .collect();
        let base: Vec<Arc<IRDocument>> = previous
            .documents
            .iter()
            .filter(|(path, _)| !plan.affected.contains(path.as_str()) && !gone.contains(path))
            .map(|(_, doc)| Arc::clone(doc))
            .collect();

        token.checkpoint()?;

        let resolved = CrossFileResolver::resolve_incremental(
            base,
            fresh,
            &previous.context.external_nodes,
        );

        self.finish(
            &previous.snapshot,
            files,
            resolved,
            plan.change_set,
            Some(previous),
            errors,
            stats,
            started,
            token,
        )
    }

    // ────────────────────────────────────────────────────────────────
    // Shared tail: semantics, heap, taint, chunks
    // ────────────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        snapshot: &RepoSnapshot,
        files: Vec<SourceFile>,
        resolved: ResolveOutput,
        change_set: ChangeSet,
        previous: Option<&BuildResult>,
        mut errors: ErrorSummary,
        mut stats: BuildStats,
        started: Instant,
        token: &CancellationToken,
    ) -> Result<BuildResult> {
        // P4: structural invariants after resolution are fatal
        for doc in &resolved.documents {
            doc.validate()?;
            if doc.degraded {
                errors.record_degraded(doc.file_path.clone());
            }
        }
        CrossFileResolver::validate_snapshot(&resolved.documents, &resolved.context)?;

        token.checkpoint()?;

        // C5 runs beside C4; type info is optional for everything below
        let documents = match &self.enricher {
            Some(enricher) if enricher.has_adapters() => {
                enricher.enrich_blocking(resolved.documents)?
            }
            _ => resolved.documents,
        };

        // C4 (per-function, parallel), reusing unaffected functions
        let mut semantic: HashMap<String, Arc<SemanticIr>> = HashMap::new();
        let reusable: HashSet<&str> = match previous {
            Some(prev) => documents
                .iter()
                .filter(|d| {
                    prev.documents
                        .get(&d.file_path)
                        .map(|old| Arc::ptr_eq(old, d))
                        .unwrap_or(false)
                })
                .flat_map(|d| d.bodies.iter().map(|b| b.function_id.as_str()))
                .collect(),
            None => HashSet::new(),
        };
        if let Some(prev) = previous {
            for (id, ir) in &prev.semantic {
                if reusable.contains(id.as_str()) {
                    semantic.insert(id.clone(), Arc::clone(ir));
                }
            }
        }
        let to_compute: Vec<Arc<IRDocument>> = documents
            .iter()
            .filter(|d| {
                d.bodies
                    .iter()
                    .any(|b| !semantic.contains_key(&b.function_id))
            })
            .cloned()
            .collect();
        let computed = build_semantic_irs(&to_compute);
        stats.functions_analyzed = computed.len();
        semantic.extend(computed);

        // I4 on every freshly built SSA
        for ir in semantic.values() {
            SsaBuilder::validate(&ir.ssa, &ir.dominators)?;
        }

        token.checkpoint()?;

        // C6: points-to + escape
        let bodies: Vec<_> = documents
            .iter()
            .flat_map(|d| d.bodies.iter().cloned())
            .collect();
        let mut solver = AndersenSolver::new();
        {
            let refs: Vec<&crate::features::ir_build::domain::FunctionBody> =
                bodies.iter().collect();
            let by_fqn: HashMap<String, &crate::features::ir_build::domain::FunctionBody> =
                bodies.iter().map(|b| (b.function_fqn.clone(), b)).collect();
            solver.add_bodies(&refs, &by_fqn);
        }
        let points_to = Arc::new(solver.solve());

        let call_graph = CallGraph::build(&documents);
        let escape = if self.config.heap.enable_escape {
            EscapeAnalysis::analyze(&bodies, &call_graph)
        } else {
            HashMap::new()
        };

        token.checkpoint()?;

        // C7
        let (findings, summaries) = TaintAnalysis::run(
            &documents,
            &call_graph,
            &self.catalog,
            &self.config.taint,
        );
        stats.findings = findings.len();

        token.checkpoint()?;

        // C10: chunk stream
        let chunks = ChunkBuilder::new(
            &snapshot.repo_id,
            &snapshot.snapshot_id,
            self.config.chunk.granularity,
        )
        .build(&documents);
        stats.chunks_emitted = chunks.len();
        if let (Some(vector), Some(lexical)) = (&self.vector_store, &self.lexical_store) {
            let emitter = ChunkEmitter::new(
                Arc::clone(vector),
                Arc::clone(lexical),
                self.config.vector.clone(),
            );
            self.with_retries("chunk emission", || emitter.emit(chunks.iter().cloned()))?;
        }

        // Storage ports (content-addressed IR documents)
        if let Some(store) = &self.ir_store {
            for doc in &documents {
                self.with_retries("ir store put", || store.put(Arc::clone(doc)))?;
            }
        }

        // Purge orphaned L0 entries for files that left the snapshot
        if let Some(cache) = &self.ir_cache {
            let current: HashSet<SubjectKey> = documents
                .iter()
                .map(|d| SubjectKey::new(ArtifactKind::IrDocument, d.file_path.clone()))
                .collect();
            cache.purge_orphans(&current);
        }

        let document_map: HashMap<String, Arc<IRDocument>> = documents
            .into_iter()
            .map(|d| (d.file_path.clone(), d))
            .collect();

        stats.duration_ms = started.elapsed().as_millis() as u64;

        Ok(BuildResult {
            snapshot: snapshot.clone(),
            documents: document_map,
            context: resolved.context,
            semantic,
            points_to,
            escape,
            findings,
            summaries,
            manifest: FileManifest::from_sources(&files),
            change_set,
            errors,
            stats,
        })
    }

    // ────────────────────────────────────────────────────────────────
    // Per-file build (cache-wrapped)
    // ────────────────────────────────────────────────────────────────

    fn build_documents(
        &self,
        snapshot: &RepoSnapshot,
        files: &[SourceFile],
        errors: &mut ErrorSummary,
        stats: &mut BuildStats,
        token: &CancellationToken,
    ) -> Result<Vec<Arc<IRDocument>>> {
        token.checkpoint()?;

        let results: Vec<(String, Result<(Arc<IRDocument>, bool)>)> = files
            .par_iter()
            .map(|file| {
                if token.is_cancelled() {
                    return (file.path.clone(), Err(AtlasError::cancelled()));
                }
                (
                    file.path.clone(),
                    self.build_one_cached(snapshot, file),
                )
            })
            .collect();

        let mut documents = Vec::with_capacity(results.len());
        for (path, result) in results {
            match result {
                Ok((doc, from_cache)) => {
                    if from_cache {
                        stats.files_from_cache += 1;
                    } else {
                        stats.files_analyzed += 1;
                    }
                    documents.push(doc);
                }
                Err(err) if err.kind == crate::shared::models::ErrorKind::Cancelled => {
                    return Err(err);
                }
                Err(err) => errors.record_file_error(path, err.to_string()),
            }
        }

        documents.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(documents)
    }

    fn build_one(&self, snapshot: &RepoSnapshot, file: &SourceFile) -> Result<Arc<IRDocument>> {
        self.build_one_cached(snapshot, file).map(|(doc, _)| doc)
    }

    fn build_one_cached(
        &self,
        snapshot: &RepoSnapshot,
        file: &SourceFile,
    ) -> Result<(Arc<IRDocument>, bool)> {
        let fingerprint = Fingerprint::from_hex(&file.content_hash)
            .unwrap_or_else(|_| Fingerprint::compute(file.content.as_bytes()));
        let key = CacheKey::new(
            ArtifactKind::IrDocument,
            file.path.clone(),
            fingerprint,
            self.config_hash.clone(),
        );
        let metadata = FileMetadata::new(0, file.size_bytes(), fingerprint);

        if let Some(cache) = &self.ir_cache {
            // I5: a hit is value-equal to a fresh computation
            if let Ok(Some(doc)) = cache.get(&key, &metadata) {
                return Ok((doc, true));
            }
        }

        let tree = self.parser.parse(file)?;
        let builder = IrBuilder::new(&snapshot.repo_id, &snapshot.snapshot_id);
        let doc = Arc::new(builder.build(file, &tree));

        if let Some(cache) = &self.ir_cache {
            if let Err(err) = cache.set(&key, Arc::clone(&doc), &metadata) {
                tracing::warn!("cache write failed for {}: {}", file.path, err);
            }
        }

        Ok((doc, false))
    }

    fn with_retries<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        const ATTEMPTS: usize = 3;
        let mut last_err = None;
        for attempt in 0..ATTEMPTS {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!("{} failed (attempt {}): {}", what, attempt + 1, err);
                    last_err = Some(err);
                    std::thread::sleep(std::time::Duration::from_millis(
                        10 * (attempt as u64 + 1),
                    ));
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AtlasError::storage("retries exhausted")))
    }
}

impl BuildResult {
    /// Shallow artifact copy (everything is Arc-shared or cheap)
    pub fn clone_artifacts(&self, snapshot: &RepoSnapshot) -> BuildResult {
        BuildResult {
            snapshot: snapshot.clone(),
            documents: self.documents.clone(),
            context: Arc::clone(&self.context),
            semantic: self.semantic.clone(),
            points_to: Arc::clone(&self.points_to),
            escape: self.escape.clone(),
            findings: self.findings.clone(),
            summaries: self.summaries.clone(),
            manifest: self.manifest.clone(),
            change_set: self.change_set.clone(),
            errors: ErrorSummary::default(),
            stats: BuildStats::default(),
        }
    }
}
