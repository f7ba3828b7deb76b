//! Prometheus metrics for the cache tiers

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry,
};

/// L0 session cache metrics
#[derive(Clone)]
pub struct SessionCacheMetrics {
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub fast_path_hits: IntCounter,
    pub entries: IntGauge,
    pub purged: IntCounter,
}

impl SessionCacheMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            hits: register_int_counter_with_registry!(
                Opts::new("cache_l0_hits_total", "L0 cache hits"),
                registry
            )
            .unwrap(),
            misses: register_int_counter_with_registry!(
                Opts::new("cache_l0_misses_total", "L0 cache misses"),
                registry
            )
            .unwrap(),
            fast_path_hits: register_int_counter_with_registry!(
                Opts::new(
                    "cache_l0_fast_path_hits_total",
                    "L0 fast path hits (mtime+size)"
                ),
                registry
            )
            .unwrap(),
            entries: register_int_gauge_with_registry!(
                Opts::new("cache_l0_entries", "L0 cache entry count"),
                registry
            )
            .unwrap(),
            purged: register_int_counter_with_registry!(
                Opts::new("cache_l0_purged_total", "L0 purged orphan entries"),
                registry
            )
            .unwrap(),
        }
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.get() as f64;
        let total = hits + self.misses.get() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// L1 adaptive cache metrics
#[derive(Clone)]
pub struct AdaptiveCacheMetrics {
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub entries: IntGauge,
    pub bytes: IntGauge,
}

impl AdaptiveCacheMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            hits: register_int_counter_with_registry!(
                Opts::new("cache_l1_hits_total", "L1 cache hits"),
                registry
            )
            .unwrap(),
            misses: register_int_counter_with_registry!(
                Opts::new("cache_l1_misses_total", "L1 cache misses"),
                registry
            )
            .unwrap(),
            entries: register_int_gauge_with_registry!(
                Opts::new("cache_l1_entries", "L1 cache entry count"),
                registry
            )
            .unwrap(),
            bytes: register_int_gauge_with_registry!(
                Opts::new("cache_l1_bytes", "L1 cache memory usage"),
                registry
            )
            .unwrap(),
        }
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.get() as f64;
        let total = hits + self.misses.get() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// L2 disk cache metrics
#[derive(Clone)]
pub struct DiskCacheMetrics {
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub writes: IntCounter,
    pub quarantined: IntCounter,
    pub read_latency: Histogram,
    pub write_latency: Histogram,
}

impl DiskCacheMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            hits: register_int_counter_with_registry!(
                Opts::new("cache_l2_hits_total", "L2 cache hits"),
                registry
            )
            .unwrap(),
            misses: register_int_counter_with_registry!(
                Opts::new("cache_l2_misses_total", "L2 cache misses"),
                registry
            )
            .unwrap(),
            writes: register_int_counter_with_registry!(
                Opts::new("cache_l2_writes_total", "L2 cache writes"),
                registry
            )
            .unwrap(),
            quarantined: register_int_counter_with_registry!(
                Opts::new("cache_l2_quarantined_total", "L2 quarantined entries"),
                registry
            )
            .unwrap(),
            read_latency: register_histogram_with_registry!(
                HistogramOpts::new("cache_l2_read_seconds", "L2 read latency"),
                registry
            )
            .unwrap(),
            write_latency: register_histogram_with_registry!(
                HistogramOpts::new("cache_l2_write_seconds", "L2 write latency"),
                registry
            )
            .unwrap(),
        }
    }
}

/// Tier-spanning metrics
#[derive(Clone)]
pub struct TieredCacheMetrics {
    pub l0_hits: IntCounter,
    pub l1_hits: IntCounter,
    pub l2_hits: IntCounter,
    pub misses: IntCounter,
    pub total_latency: Histogram,
}

impl TieredCacheMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            l0_hits: register_int_counter_with_registry!(
                Opts::new("cache_tiered_l0_hits_total", "Tiered lookups served by L0"),
                registry
            )
            .unwrap(),
            l1_hits: register_int_counter_with_registry!(
                Opts::new("cache_tiered_l1_hits_total", "Tiered lookups served by L1"),
                registry
            )
            .unwrap(),
            l2_hits: register_int_counter_with_registry!(
                Opts::new("cache_tiered_l2_hits_total", "Tiered lookups served by L2"),
                registry
            )
            .unwrap(),
            misses: register_int_counter_with_registry!(
                Opts::new("cache_tiered_misses_total", "Tiered lookups missing all tiers"),
                registry
            )
            .unwrap(),
            total_latency: register_histogram_with_registry!(
                HistogramOpts::new("cache_tiered_lookup_seconds", "Tiered lookup latency"),
                registry
            )
            .unwrap(),
        }
    }

    pub fn overall_hit_rate(&self) -> f64 {
        let hits = (self.l0_hits.get() + self.l1_hits.get() + self.l2_hits.get()) as f64;
        let total = hits + self.misses.get() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}
