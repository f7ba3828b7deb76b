//! L0 session cache: lock-free in-memory cache with a metadata fast path

use crate::config::CacheTierConfig;
use crate::features::cache::{
    bloom::BloomFilter, metrics::SessionCacheMetrics, CacheKey, FileMetadata, SubjectKey,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use prometheus::Registry;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache entry with access tracking
#[derive(Clone)]
struct CacheEntry<T> {
    value: Arc<T>,
    /// Fingerprint + config hash the value was built under
    key: CacheKey,
    access_count: Arc<AtomicU64>,
    size_bytes: usize,
}

impl<T> CacheEntry<T> {
    fn new(value: Arc<T>, key: CacheKey, size_bytes: usize) -> Self {
        Self {
            value,
            key,
            access_count: Arc::new(AtomicU64::new(1)),
            size_bytes,
        }
    }

    fn touch(&self) {
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// L0 session cache
///
/// Lock-free concurrent map keyed by (artifact-kind, subject) with:
/// - fast path check (mtime + size, no content hash)
/// - optional Bloom filter in front of the fast path
/// - orphan purging after each build
pub struct SessionCache<T> {
    store: DashMap<SubjectKey, CacheEntry<T>>,

    /// Metadata for the fast path
    metadata: DashMap<SubjectKey, FileMetadata>,

    bloom: Option<Arc<RwLock<BloomFilter<SubjectKey>>>>,

    config: CacheTierConfig,

    metrics: Arc<SessionCacheMetrics>,
}

impl<T> SessionCache<T> {
    pub fn new(config: CacheTierConfig, registry: &Registry) -> Self {
        let bloom = if config.enabled {
            Some(Arc::new(RwLock::new(BloomFilter::new(
                (config.max_size as usize).max(1024),
                0.01,
            ))))
        } else {
            None
        };

        Self {
            store: DashMap::new(),
            metadata: DashMap::new(),
            bloom,
            config,
            metrics: Arc::new(SessionCacheMetrics::new(registry)),
        }
    }

    /// Fast path check (mtime + size only, no content hash).
    ///
    /// Probabilistic - confirm with `get` when the caller needs
    /// fingerprint-exact equality.
    pub fn check_fast_path(
        &self,
        subject: &SubjectKey,
        mtime_ns: u64,
        size_bytes: u64,
    ) -> Option<Arc<T>> {
        if !self.config.enabled {
            return None;
        }
        // mtime 0 marks in-memory sources with no filesystem identity;
        // mtime+size alone cannot distinguish same-length edits there
        if mtime_ns == 0 {
            return None;
        }

        if let Some(bloom) = &self.bloom {
            if !bloom.read().contains(subject) {
                return None;
            }
        }

        if let Some(meta) = self.metadata.get(subject) {
            if meta.matches_fast(mtime_ns, size_bytes) {
                if let Some(entry) = self.store.get(subject) {
                    entry.touch();
                    self.metrics.fast_path_hits.inc();
                    self.metrics.hits.inc();
                    return Some(Arc::clone(&entry.value));
                }
            }
        }

        None
    }

    /// Get with full fingerprint + config-hash verification
    pub fn get(&self, key: &CacheKey) -> Option<Arc<T>> {
        if !self.config.enabled {
            return None;
        }

        let subject = key.subject_key();
        if let Some(entry) = self.store.get(&subject) {
            if entry.key == *key {
                entry.touch();
                self.metrics.hits.inc();
                return Some(Arc::clone(&entry.value));
            }
        }

        self.metrics.misses.inc();
        None
    }

    pub fn insert(&self, key: CacheKey, value: Arc<T>, metadata: FileMetadata, size_bytes: usize) {
        if !self.config.enabled {
            return;
        }

        let subject = key.subject_key();
        let entry = CacheEntry::new(value, key, size_bytes);

        self.store.insert(subject.clone(), entry);
        self.metadata.insert(subject.clone(), metadata);

        if let Some(bloom) = &self.bloom {
            bloom.write().insert(&subject);
        }

        self.metrics.entries.set(self.store.len() as i64);
    }

    pub fn invalidate(&self, subject: &SubjectKey) {
        self.store.remove(subject);
        self.metadata.remove(subject);
        self.metrics.entries.set(self.store.len() as i64);
    }

    /// Purge entries whose subject is no longer in the current set
    pub fn purge_orphans(&self, current: &HashSet<SubjectKey>) {
        let mut purged = 0u64;

        self.store.retain(|subject, _| {
            if current.contains(subject) {
                true
            } else {
                purged += 1;
                self.metadata.remove(subject);
                false
            }
        });

        if purged > 0 {
            tracing::debug!("L0 purged {} orphan entries", purged);
            self.metrics.purged.inc_by(purged);
            self.metrics.entries.set(self.store.len() as i64);
        }
    }

    pub fn clear(&self) {
        self.store.clear();
        self.metadata.clear();

        if let Some(bloom) = &self.bloom {
            bloom.write().clear();
        }

        self.metrics.entries.set(0);
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn hit_rate(&self) -> f64 {
        self.metrics.hit_rate()
    }

    pub fn metrics(&self) -> Arc<SessionCacheMetrics> {
        Arc::clone(&self.metrics)
    }
}
