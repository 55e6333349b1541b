//! Cache backends
//!
//! [`CacheBackend`] is chosen once at construction. Every backend stores
//! [`CacheEntry`] values and checks expiry on read.

mod bounded;
mod file;
mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{CacheDriver, EngineConfig};
use crate::error::CheckResult;
use crate::traits::ExternalCacheStore;

pub use bounded::BoundedCache;
pub use file::FileCache;
pub use memory::MemoryCache;

/// A cached value with its storage time and time-to-live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    /// Unix timestamp (seconds) of the write.
    pub stored_at: i64,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: serde_json::Value, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            stored_at: chrono::Utc::now().timestamp(),
            ttl_secs: ttl.as_secs(),
        }
    }

    /// Whether the entry is past its TTL at `now` (unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        let ttl = i64::try_from(self.ttl_secs).unwrap_or(i64::MAX);
        now >= self.stored_at.saturating_add(ttl)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}

/// Storage behind the DNS cache.
#[derive(Clone)]
pub enum CacheBackend {
    /// In-process map.
    Memory(MemoryCache),
    /// JSON files under a directory.
    File(FileCache),
    /// Caller-provided shared store.
    External(Arc<dyn ExternalCacheStore>),
    /// Never stores anything.
    Disabled,
}

impl fmt::Debug for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.driver_name())
    }
}

impl CacheBackend {
    /// Pick the backend named by `dns_cache_driver`.
    ///
    /// `External` without a store falls back to memory with a warning.
    pub fn from_config(
        config: &EngineConfig,
        external: Option<Arc<dyn ExternalCacheStore>>,
    ) -> Self {
        match config.dns_cache_driver {
            CacheDriver::Memory => {
                Self::Memory(MemoryCache::with_capacity(config.dns_cache_max_entries))
            }
            CacheDriver::File => Self::File(FileCache::new(config.dns_cache_dir.clone())),
            CacheDriver::External => match external {
                Some(store) => Self::External(store),
                None => {
                    log::warn!(
                        "External cache driver selected without a store, falling back to memory"
                    );
                    Self::Memory(MemoryCache::with_capacity(config.dns_cache_max_entries))
                }
            },
            CacheDriver::Null => Self::Disabled,
        }
    }

    /// Label used in telemetry and in `cacheDriver` fields.
    pub fn driver_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
            Self::External(_) => "external",
            Self::Disabled => "null",
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Read and decode a live entry.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CheckResult<Option<T>> {
        let entry = match self {
            Self::Memory(cache) => cache.get(key).await,
            Self::File(cache) => cache.get(key).await?,
            Self::External(store) => match store.get(key).await? {
                Some(raw) => Some(serde_json::from_str::<CacheEntry>(&raw)?),
                None => None,
            },
            Self::Disabled => None,
        };
        match entry {
            Some(entry) if !entry.is_expired() => Ok(Some(serde_json::from_value(entry.value)?)),
            _ => Ok(None),
        }
    }

    /// Encode and store `value` for `ttl`.
    pub async fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CheckResult<()> {
        let value = serde_json::to_value(value)?;
        let entry = CacheEntry::new(key, value, ttl);
        match self {
            Self::Memory(cache) => {
                cache.set(entry).await;
                Ok(())
            }
            Self::File(cache) => cache.set(&entry).await,
            Self::External(store) => {
                let raw = serde_json::to_string(&entry)?;
                store.set(key, raw, ttl).await
            }
            Self::Disabled => Ok(()),
        }
    }

    /// Drop every entry.
    pub async fn clear(&self) -> CheckResult<()> {
        match self {
            Self::Memory(cache) => {
                cache.clear().await;
                Ok(())
            }
            Self::File(cache) => cache.clear().await,
            Self::External(store) => store.clear().await,
            Self::Disabled => Ok(()),
        }
    }
}
