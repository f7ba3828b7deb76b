//! Type enrichment use case (C5)
//!
//! The only async stage. Concurrency is semaphore-bounded, every
//! adapter call carries a timeout, and failures demote to warnings:
//! the document is marked `typed=false` and the pipeline continues.

use crate::config::TypeEnrichConfig;
use crate::features::ir_build::domain::IRDocument;
use crate::features::type_enrich::ports::{LanguageServerPort, TypeInfo};
use crate::shared::models::{AtlasError, LanguageId, Result, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub struct TypeEnricher {
    adapters: HashMap<LanguageId, Arc<dyn LanguageServerPort>>,
    config: TypeEnrichConfig,
}

impl TypeEnricher {
    pub fn new(config: TypeEnrichConfig) -> Self {
        Self {
            adapters: HashMap::new(),
            config,
        }
    }

    pub fn register(&mut self, language: LanguageId, adapter: Arc<dyn LanguageServerPort>) {
        self.adapters.insert(language, adapter);
    }

    pub fn has_adapters(&self) -> bool {
        !self.adapters.is_empty()
    }

    /// Enrich documents with inferred types.
    ///
    /// Returns new documents in input order; inputs stay untouched
    /// (IRDocuments are immutable aggregates).
    pub async fn enrich(&self, documents: Vec<Arc<IRDocument>>) -> Result<Vec<Arc<IRDocument>>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let timeout = Duration::from_secs(self.config.timeout_s.max(1));

        enum Task {
            Passthrough(Arc<IRDocument>),
            Running(tokio::task::JoinHandle<(Arc<IRDocument>, Option<AtlasError>)>),
        }

        let mut tasks = Vec::with_capacity(documents.len());
        for doc in documents {
            let adapter = doc.language.and_then(|l| self.adapters.get(&l)).cloned();
            let Some(adapter) = adapter else {
                tasks.push(Task::Passthrough(doc));
                continue;
            };

            let semaphore = Arc::clone(&semaphore);
            tasks.push(Task::Running(tokio::spawn(async move {
                let types: Result<Vec<TypeInfo>> = async {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|_| AtlasError::type_enrichment("semaphore closed"))?;

                    let span = doc.file_node().map(|n| n.span).unwrap_or_default();
                    tokio::time::timeout(timeout, adapter.types_for(&doc.file_path, span))
                        .await
                        .map_err(|_| {
                            AtlasError::type_enrichment("adapter timeout")
                                .with_file(&doc.file_path)
                        })?
                }
                .await;

                match types {
                    Ok(types) => {
                        let mut enriched = (*doc).clone();
                        for node in &mut enriched.nodes {
                            let matching = types
                                .iter()
                                .find(|t| node.span.contains(&t.span) && node.kind.is_symbol());
                            if let Some(info) = matching {
                                node.attrs.insert(
                                    "inferred_type".into(),
                                    Value::String(info.type_name.clone()),
                                );
                            }
                        }
                        (Arc::new(enriched), None)
                    }
                    Err(err) => {
                        // Type info is optional: keep the document,
                        // flag it untyped
                        let mut degraded = (*doc).clone();
                        for node in &mut degraded.nodes {
                            if node.kind == crate::shared::models::NodeKind::File {
                                node.attrs.insert("typed".into(), Value::Bool(false));
                            }
                        }
                        (Arc::new(degraded), Some(err))
                    }
                }
            })));
        }

        let mut out = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task {
                Task::Passthrough(doc) => out.push(doc),
                Task::Running(handle) => {
                    let (doc, err) = handle
                        .await
                        .map_err(|e| AtlasError::type_enrichment(e.to_string()))?;
                    if let Some(err) = err {
                        if self.config.fail_fast {
                            return Err(err);
                        }
                        tracing::warn!("type enrichment degraded: {}", err);
                    }
                    out.push(doc);
                }
            }
        }

        Ok(out)
    }

    /// Synchronous wrapper for the synchronous pipeline
    pub fn enrich_blocking(&self, documents: Vec<Arc<IRDocument>>) -> Result<Vec<Arc<IRDocument>>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| AtlasError::type_enrichment(e.to_string()))?;
        runtime.block_on(self.enrich(documents))
    }
}
