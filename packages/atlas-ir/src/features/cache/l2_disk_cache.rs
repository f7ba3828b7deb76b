//! L2 disk cache: content-addressed persistent storage
//!
//! Entries live at `{cache_dir}/data/{blake3(key)}.rkyv` as an rkyv
//! envelope around the serialized artifact bytes. Reads are mmap'd and
//! validated (byte-check + blake3 checksum) before the payload is
//! handed to the deserializer; corrupted entries are quarantined and
//! reported as a miss. Writes are atomic (tmp file + rename).

use crate::config::CacheTierConfig;
use crate::features::cache::{metrics::DiskCacheMetrics, CacheError, CacheKey, CacheResult};
use memmap2::Mmap;
use prometheus::Registry;
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// On-disk envelope
#[derive(Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
struct DiskEntry {
    version: u32,
    /// Blake3 of payload
    checksum: [u8; 32],
    created_ns: u64,
    payload: Vec<u8>,
}

/// L2 disk cache
pub struct DiskCache {
    cache_dir: PathBuf,
    enabled: bool,
    metrics: Arc<DiskCacheMetrics>,
}

impl DiskCache {
    const VERSION: u32 = 1;

    pub fn new(config: &CacheTierConfig, registry: &Registry) -> CacheResult<Self> {
        let cache_dir = config
            .path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("atlas-ir-cache"));

        let enabled = config.enabled;
        if enabled {
            fs::create_dir_all(cache_dir.join("data"))?;
        }

        Ok(Self {
            cache_dir,
            enabled,
            metrics: Arc::new(DiskCacheMetrics::new(registry)),
        })
    }

    fn key_to_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join("data")
            .join(format!("{}.rkyv", key.file_stem()))
    }

    /// Read the payload for key and apply `f` to the mapped bytes.
    ///
    /// The closure runs while the mmap is alive, so deserializers can
    /// parse directly from the page cache.
    pub fn get_with<R>(
        &self,
        key: &CacheKey,
        f: impl FnOnce(&[u8]) -> CacheResult<R>,
    ) -> CacheResult<Option<R>> {
        if !self.enabled {
            return Ok(None);
        }

        let start = Instant::now();
        let path = self.key_to_path(key);

        if !path.exists() {
            self.metrics.misses.inc();
            return Ok(None);
        }

        let file = File::open(&path)?;
        // SAFETY: the mapping is read-only and lives only for this call;
        // concurrent writers replace the file via rename, never in place.
        let mmap = unsafe { Mmap::map(&file)? };

        let archived = match rkyv::check_archived_root::<DiskEntry>(&mmap[..]) {
            Ok(a) => a,
            Err(_) => {
                self.quarantine(&path);
                return Ok(None);
            }
        };

        if archived.version != Self::VERSION {
            self.quarantine(&path);
            return Ok(None);
        }

        let payload: &[u8] = archived.payload.as_slice();
        if blake3::hash(payload).as_bytes() != &archived.checksum {
            self.quarantine(&path);
            return Ok(None);
        }

        let result = f(payload)?;

        self.metrics.hits.inc();
        self.metrics
            .read_latency
            .observe(start.elapsed().as_secs_f64());

        Ok(Some(result))
    }

    /// Read the payload as owned bytes
    pub fn get_bytes(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        self.get_with(key, |bytes| Ok(bytes.to_vec()))
    }

    /// Write payload atomically
    pub fn set_bytes(&self, key: &CacheKey, payload: &[u8]) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let start = Instant::now();

        let entry = DiskEntry {
            version: Self::VERSION,
            checksum: *blake3::hash(payload).as_bytes(),
            created_ns: unix_now_ns(),
            payload: payload.to_vec(),
        };

        let bytes = rkyv::to_bytes::<_, 1024>(&entry)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        let file_path = self.key_to_path(key);
        let tmp_path = file_path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &file_path)?;

        self.metrics.writes.inc();
        self.metrics
            .write_latency
            .observe(start.elapsed().as_secs_f64());

        Ok(())
    }

    pub fn invalidate(&self, key: &CacheKey) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.key_to_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let data_dir = self.cache_dir.join("data");
        if data_dir.exists() {
            fs::remove_dir_all(&data_dir)?;
            fs::create_dir_all(&data_dir)?;
        }
        Ok(())
    }

    fn quarantine(&self, path: &std::path::Path) {
        let quarantined = path.with_extension("quarantine");
        if fs::rename(path, &quarantined).is_ok() {
            tracing::warn!("quarantined corrupted cache entry {}", path.display());
            self.metrics.quarantined.inc();
        }
        self.metrics.misses.inc();
    }

    pub fn metrics(&self) -> Arc<DiskCacheMetrics> {
        Arc::clone(&self.metrics)
    }
}

fn unix_now_ns() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cache::{ArtifactKind, Fingerprint};
    use tempfile::TempDir;

    fn disk_cache() -> (DiskCache, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = CacheTierConfig {
            enabled: true,
            path: Some(temp.path().to_path_buf()),
            ..CacheTierConfig::default()
        };
        let registry = Registry::new();
        (DiskCache::new(&config, &registry).unwrap(), temp)
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
    fn test_disk_cache_roundtrip() {
        let (cache, _temp) = disk_cache();
        let key = test_key("a.py", "code");

        cache.set_bytes(&key, b"payload bytes").unwrap();

        let result = cache.get_bytes(&key).unwrap();
        assert_eq!(result.as_deref(), Some(&b"payload bytes"[..]));
    }

    #[test]
    fn test_disk_cache_miss() {
        let (cache, _temp) = disk_cache();
        assert!(cache.get_bytes(&test_key("a.py", "code")).unwrap().is_none());
    }

    #[test]
    fn test_disk_cache_invalidate() {
        let (cache, _temp) = disk_cache();
        let key = test_key("a.py", "code");
        cache.set_bytes(&key, b"payload").unwrap();
        cache.invalidate(&key).unwrap();
        assert!(cache.get_bytes(&key).unwrap().is_none());
    }

    #[test]
    fn test_disk_cache_quarantines_corruption() {
        let (cache, temp) = disk_cache();
        let key = test_key("a.py", "code");
        cache.set_bytes(&key, b"payload").unwrap();

        // Truncate the entry on disk
        let path = temp
            .path()
            .join("data")
            .join(format!("{}.rkyv", key.file_stem()));
        fs::write(&path, b"garbage").unwrap();

        // Corruption is a miss, not an error
        assert!(cache.get_bytes(&key).unwrap().is_none());
        assert!(!path.exists());
        assert!(path.with_extension("quarantine").exists());
    }

    #[test]
    fn test_disk_cache_survives_reopen() {
        let (cache, temp) = disk_cache();
        let key = test_key("a.py", "code");
        cache.set_bytes(&key, b"persistent").unwrap();
        drop(cache);

        let config = CacheTierConfig {
            enabled: true,
            path: Some(temp.path().to_path_buf()),
            ..CacheTierConfig::default()
        };
        let registry = Registry::new();
        let reopened = DiskCache::new(&config, &registry).unwrap();
        assert_eq!(
            reopened.get_bytes(&key).unwrap().as_deref(),
            Some(&b"persistent"[..])
        );
    }
}
