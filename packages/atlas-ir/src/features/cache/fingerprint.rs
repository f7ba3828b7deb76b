//! Fingerprint file helpers

use crate::features::cache::{CacheError, CacheResult, Fingerprint};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;

impl Fingerprint {
    /// Compute from a file on disk (streamed)
    pub fn from_file(path: impl AsRef<Path>) -> CacheResult<Self> {
        let mut file = File::open(path.as_ref())?;
        let mut hasher = blake3::Hasher::new();

        let mut buffer = [0u8; 8192];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(Self(hasher.finalize()))
    }

    /// Compute content hash plus (mtime_ns, size_bytes) in one pass
    pub fn from_file_with_metadata(path: impl AsRef<Path>) -> CacheResult<(Self, u64, u64)> {
        let path = path.as_ref();
        let metadata = path.metadata()?;

        let mtime_ns = metadata
            .modified()?
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(|e| CacheError::Other(format!("Invalid mtime: {}", e)))?
            .as_nanos() as u64;

        let size_bytes = metadata.len();
        let fingerprint = Self::from_file(path)?;

        Ok((fingerprint, mtime_ns, size_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fingerprint_from_file() -> CacheResult<()> {
        let mut temp = NamedTempFile::new()?;
        temp.write_all(b"test content")?;
        temp.flush()?;

        let fp1 = Fingerprint::from_file(temp.path())?;
        let fp2 = Fingerprint::from_file(temp.path())?;
        assert_eq!(fp1, fp2);
        assert_eq!(fp1, Fingerprint::compute(b"test content"));

        Ok(())
    }

    #[test]
    fn test_fingerprint_from_file_with_metadata() -> CacheResult<()> {
        let mut temp = NamedTempFile::new()?;
        temp.write_all(b"test content")?;
        temp.flush()?;

        let (fp, mtime, size) = Fingerprint::from_file_with_metadata(temp.path())?;
        assert!(mtime > 0);
        assert_eq!(size, 12);
        assert_eq!(fp, Fingerprint::compute(b"test content"));

        Ok(())
    }

    #[test]
    fn test_fingerprint_metadata_fast_path() {
        let fp1 = Fingerprint::from_metadata(1_234, 42);
        let fp2 = Fingerprint::from_metadata(1_234, 42);
        assert_eq!(fp1, fp2);
        assert_ne!(fp1, Fingerprint::from_metadata(1_235, 42));
        assert_ne!(fp1, Fingerprint::from_metadata(1_234, 43));
    }
}
