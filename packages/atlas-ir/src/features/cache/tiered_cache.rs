//! Tiered cache: L0 → L1 → L2 facade with promotion and background sync
//!
//! Read path: L0 fast-path → L0 → L1 → L2 (promote on hit).
//! Write path: synchronous into L0/L1, background thread into L2.
//! Readers always tolerate a miss; every miss falls through to the
//! caller's recompute.

use crate::config::CacheConfig;
use crate::features::cache::{
    l1_adaptive_cache::EstimateSize, metrics::TieredCacheMetrics, AdaptiveCache, CacheError,
    CacheKey, CacheResult, DiskCache, FileMetadata, SessionCache, SubjectKey,
};
use prometheus::Registry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

enum WriteOp {
    Set(CacheKey, Vec<u8>),
    Invalidate(CacheKey),
    Flush(mpsc::Sender<()>),
    Shutdown,
}

/// Tiered cache (L0 + L1 + L2)
pub struct TieredCache<T: EstimateSize + Send + Sync + 'static> {
    pub l0: SessionCache<T>,
    pub l1: AdaptiveCache<T>,
    pub l2: Arc<DiskCache>,
    metrics: Arc<TieredCacheMetrics>,

    l2_writer: Option<mpsc::Sender<WriteOp>>,
    l2_writer_handle: Option<JoinHandle<()>>,
}

impl<T> TieredCache<T>
where
    T: EstimateSize + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(config: &CacheConfig, registry: &Registry) -> CacheResult<Self> {
        Self::with_background_writes(config, registry, true)
    }

    pub fn with_background_writes(
        config: &CacheConfig,
        registry: &Registry,
        background: bool,
    ) -> CacheResult<Self> {
        let l0 = SessionCache::new(config.l0.clone(), registry);
        let l1 = AdaptiveCache::new(config.l1.clone(), registry);
        let l2 = Arc::new(DiskCache::new(&config.l2, registry)?);

        let metrics = Arc::new(TieredCacheMetrics::new(registry));

        let (l2_writer, l2_writer_handle) = if background && config.l2.enabled {
            let (tx, rx) = mpsc::channel::<WriteOp>();
            let l2_clone = Arc::clone(&l2);

            let handle = std::thread::Builder::new()
                .name("atlas-l2-writer".into())
                .spawn(move || {
                    while let Ok(op) = rx.recv() {
                        match op {
                            WriteOp::Set(key, bytes) => {
                                if let Err(e) = l2_clone.set_bytes(&key, &bytes) {
                                    tracing::warn!("L2 background write failed: {}", e);
                                }
                            }
                            WriteOp::Invalidate(key) => {
                                let _ = l2_clone.invalidate(&key);
                            }
                            WriteOp::Flush(ack) => {
                                let _ = ack.send(());
                            }
                            WriteOp::Shutdown => break,
                        }
                    }
                })
                .map_err(|e| CacheError::Internal(e.to_string()))?;

            (Some(tx), Some(handle))
        } else {
            (None, None)
        };

        Ok(Self {
            l0,
            l1,
            l2,
            metrics,
            l2_writer,
            l2_writer_handle,
        })
    }

    /// Get with tiered lookup and promotion
    pub fn get(&self, key: &CacheKey, metadata: &FileMetadata) -> CacheResult<Option<Arc<T>>> {
        let start = Instant::now();

        // L0 fast path (mtime + size)
        let subject = key.subject_key();
        if let Some(value) =
            self.l0
                .check_fast_path(&subject, metadata.mtime_ns, metadata.size_bytes)
        {
            self.metrics.l0_hits.inc();
            self.observe(start);
            return Ok(Some(value));
        }

        // L0 full check
        if let Some(value) = self.l0.get(key) {
            self.metrics.l0_hits.inc();
            self.observe(start);
            return Ok(Some(value));
        }

        // L1
        if let Some(value) = self.l1.get(key) {
            let size_bytes = value.estimated_size_bytes();
            self.l0
                .insert(key.clone(), Arc::clone(&value), metadata.clone(), size_bytes);
            self.metrics.l1_hits.inc();
            self.observe(start);
            return Ok(Some(value));
        }

        // L2 (deserialize straight off the mapping)
        let decoded: Option<T> = self.l2.get_with(key, |bytes| {
            serde_json::from_slice(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
        })?;

        if let Some(value) = decoded {
            let value = Arc::new(value);
            let size_bytes = value.estimated_size_bytes();
            self.l1.insert(key.clone(), Arc::clone(&value));
            self.l0
                .insert(key.clone(), Arc::clone(&value), metadata.clone(), size_bytes);
            self.metrics.l2_hits.inc();
            self.observe(start);
            return Ok(Some(value));
        }

        self.metrics.misses.inc();
        self.observe(start);
        Ok(None)
    }

    /// Set across all tiers
    pub fn set(&self, key: &CacheKey, value: Arc<T>, metadata: &FileMetadata) -> CacheResult<()> {
        let size_bytes = value.estimated_size_bytes();

        self.l0
            .insert(key.clone(), Arc::clone(&value), metadata.clone(), size_bytes);
        self.l1.insert(key.clone(), Arc::clone(&value));

        let bytes = serde_json::to_vec(&*value)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        if let Some(writer) = &self.l2_writer {
            writer
                .send(WriteOp::Set(key.clone(), bytes))
                .map_err(|_| CacheError::Internal("L2 writer channel closed".into()))?;
        } else {
            self.l2.set_bytes(key, &bytes)?;
        }

        Ok(())
    }

    /// Invalidate across all tiers
    pub fn invalidate(&self, key: &CacheKey) -> CacheResult<()> {
        self.l0.invalidate(&key.subject_key());
        self.l1.invalidate(key);

        if let Some(writer) = &self.l2_writer {
            writer
                .send(WriteOp::Invalidate(key.clone()))
                .map_err(|_| CacheError::Internal("L2 writer channel closed".into()))?;
        } else {
            self.l2.invalidate(key)?;
        }

        Ok(())
    }

    pub fn clear(&self) -> CacheResult<()> {
        self.l0.clear();
        self.l1.clear();
        self.l2.clear()?;
        Ok(())
    }

    /// Purge L0 entries whose subject left the current file set
    pub fn purge_orphans(&self, current: &std::collections::HashSet<SubjectKey>) {
        self.l0.purge_orphans(current);
    }

    /// Block until queued background writes are flushed.
    ///
    /// The channel preserves order, so the ack arrives only after every
    /// previously queued write was processed.
    pub fn flush(&self) {
        if let Some(writer) = &self.l2_writer {
            let (ack_tx, ack_rx) = mpsc::channel();
            if writer.send(WriteOp::Flush(ack_tx)).is_ok() {
                let _ = ack_rx.recv();
            }
        }
    }

    pub fn hit_rate(&self) -> f64 {
        self.metrics.overall_hit_rate()
    }

    fn observe(&self, start: Instant) {
        self.metrics
            .total_latency
            .observe(start.elapsed().as_secs_f64());
    }
}

impl<T: EstimateSize + Send + Sync + 'static> Drop for TieredCache<T> {
    fn drop(&mut self) {
        if let Some(writer) = self.l2_writer.take() {
            let _ = writer.send(WriteOp::Shutdown);
        }
        if let Some(handle) = self.l2_writer_handle.take() {
            let _ = handle.join();
        }
    }
}
