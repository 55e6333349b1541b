//! In-process cache map

use std::sync::Arc;

use tokio::sync::RwLock;

use super::{BoundedCache, CacheEntry};

/// Entry cap used by [`MemoryCache::new`].
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// In-memory cache
///
/// Cloning shares the underlying map. Expired entries are dropped on read, and
/// the oldest quarter is evicted once the map outgrows its cap.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<BoundedCache<String, CacheEntry>>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(BoundedCache::new(max_entries))),
        }
    }

    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let key = key.to_string();
        {
            let entries = self.entries.read().await;
            let entry = entries.get(&key)?;
            if !entry.is_expired() {
                return Some(entry.clone());
            }
        }
        // Re-check under the write lock; a concurrent `set` may have refreshed it.
        let mut entries = self.entries.write().await;
        match entries.get(&key) {
            Some(entry) if !entry.is_expired() => Some(entry.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub async fn set(&self, entry: CacheEntry) {
        self.entries.write().await.insert(entry.key.clone(), entry);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(key: &str) -> CacheEntry {
        CacheEntry::new(key, serde_json::json!(key), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted_on_read() {
        let cache = MemoryCache::new();
        let mut entry = CacheEntry::new("a", serde_json::json!("x"), Duration::from_secs(5));
        entry.stored_at -= 10;
        cache.set(entry).await;
        assert_eq!(cache.len().await, 1);

        assert!(cache.get("a").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_fresh_write_replaces_expired_entry() {
        let cache = MemoryCache::new();
        let mut stale = entry("a");
        stale.stored_at -= 120;
        cache.set(stale).await;
        cache.set(entry("a")).await;

        assert!(cache.get("a").await.is_some());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let cache = MemoryCache::with_capacity(4);
        for key in ["a", "b", "c", "d", "e"] {
            cache.set(entry(key)).await;
        }
        assert_eq!(cache.len().await, 4);
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("e").await.is_some());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cache = MemoryCache::new();
        let other = cache.clone();
        cache
            .set(CacheEntry::new("k", serde_json::json!(1), Duration::from_secs(60)))
            .await;
        assert!(other.get("k").await.is_some());
        other.clear().await;
        assert!(cache.get("k").await.is_none());
    }
}
