//! File-backed cache

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::CacheEntry;
use crate::error::{CheckError, CheckResult};

/// One JSON file per key under a directory.
///
/// File names are the SHA-256 hex digest of the key, so arbitrary keys map to
/// safe names and the directory can be shared between processes.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    pub async fn get(&self, key: &str) -> CheckResult<Option<CacheEntry>> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckError::CacheError(format!("{}: {e}", path.display()))),
        };
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.is_expired() => {
                let _ = tokio::fs::remove_file(&path).await;
                Ok(None)
            }
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                log::warn!("Discarding corrupt cache file {}: {e}", path.display());
                let _ = tokio::fs::remove_file(&path).await;
                Ok(None)
            }
        }
    }

    pub async fn set(&self, entry: &CacheEntry) -> CheckResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CheckError::CacheError(format!("{}: {e}", self.dir.display())))?;
        let raw = serde_json::to_string(entry)?;
        let path = self.path_for(&entry.key);
        tokio::fs::write(&path, raw)
            .await
            .map_err(|e| CheckError::CacheError(format!("{}: {e}", path.display())))
    }

    /// Remove every cache file in the directory.
    pub async fn clear(&self) -> CheckResult<()> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CheckError::CacheError(e.to_string())),
        };
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| CheckError::CacheError(e.to_string()))?
        {
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| CheckError::CacheError(e.to_string()))?;
            }
        }
        Ok(())
    }
}
