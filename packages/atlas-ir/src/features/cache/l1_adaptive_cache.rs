//! L1 adaptive cache: ARC-style eviction with TTL (moka)

use crate::config::CacheTierConfig;
use crate::features::cache::{metrics::AdaptiveCacheMetrics, CacheKey};
use moka::sync::Cache;
use prometheus::Registry;
use std::sync::Arc;

/// Trait for estimating object size (weigher input)
pub trait EstimateSize {
    fn estimated_size_bytes(&self) -> usize;
}

/// L1 adaptive cache
///
/// moka's TinyLFU admission with TTL expiry and a size-based weigher.
pub struct AdaptiveCache<T: EstimateSize + Send + Sync + 'static> {
    cache: Cache<CacheKey, Arc<T>>,
    enabled: bool,
    metrics: Arc<AdaptiveCacheMetrics>,
}

impl<T: EstimateSize + Send + Sync + 'static> AdaptiveCache<T> {
    pub fn new(config: CacheTierConfig, registry: &Registry) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_size)
            .weigher(|_key: &CacheKey, value: &Arc<T>| {
                let kb = (value.estimated_size_bytes() / 1024).max(1);
                kb.min(u32::MAX as usize) as u32
            })
            .time_to_live(config.ttl())
            .build();

        Self {
            cache,
            enabled: config.enabled,
            metrics: Arc::new(AdaptiveCacheMetrics::new(registry)),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<T>> {
        if !self.enabled {
            return None;
        }

        let result = self.cache.get(key);

        if result.is_some() {
            self.metrics.hits.inc();
        } else {
            self.metrics.misses.inc();
        }
        self.metrics.entries.set(self.cache.entry_count() as i64);

        result
    }

    pub fn insert(&self, key: CacheKey, value: Arc<T>) {
        if !self.enabled {
            return;
        }

        self.cache.insert(key, value);
        self.metrics.entries.set(self.cache.entry_count() as i64);
        self.metrics
            .bytes
            .set(self.cache.weighted_size() as i64 * 1024);
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key);
        self.metrics.entries.set(self.cache.entry_count() as i64);
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
        self.metrics.entries.set(0);
        self.metrics.bytes.set(0);
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn hit_rate(&self) -> f64 {
        self.metrics.hit_rate()
    }

    pub fn metrics(&self) -> Arc<AdaptiveCacheMetrics> {
        Arc::clone(&self.metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cache::{ArtifactKind, Fingerprint};

    #[derive(Debug, Clone)]
    struct TestDoc {
        content: String,
    }

    impl EstimateSize for TestDoc {
        fn estimated_size_bytes(&self) -> usize {
            self.content.len()
        }
    }

    fn test_key(path: &str, content: &str) -> CacheKey {
        CacheKey::new(
            ArtifactKind::IrDocument,
            path,
            Fingerprint::compute(content.as_bytes()),
            "cfg",
        )
    }

    #[test]
    fn test_adaptive_cache_basic() {
        let registry = Registry::new();
        let cache = AdaptiveCache::new(CacheTierConfig::default(), &registry);

        let key = test_key("a.py", "code");
        cache.insert(
            key.clone(),
            Arc::new(TestDoc {
                content: "code".into(),
            }),
        );

        assert!(cache.get(&key).is_some());
        assert!(cache.get(&test_key("b.py", "other")).is_none());
        assert!((cache.hit_rate() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_adaptive_cache_invalidate() {
        let registry = Registry::new();
        let cache = AdaptiveCache::new(CacheTierConfig::default(), &registry);

        let key = test_key("a.py", "code");
        cache.insert(
            key.clone(),
            Arc::new(TestDoc {
                content: "code".into(),
            }),
        );
        cache.invalidate(&key);
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_adaptive_cache_disabled() {
        let registry = Registry::new();
        let config = CacheTierConfig {
            enabled: false,
            ..CacheTierConfig::default()
        };
        let cache = AdaptiveCache::new(config, &registry);

        let key = test_key("a.py", "code");
        cache.insert(
            key.clone(),
            Arc::new(TestDoc {
                content: "code".into(),
            }),
        );
        assert!(cache.get(&key).is_none());
    }
}
