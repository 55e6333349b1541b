//! External cache store abstract Trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CheckResult;

/// Shared key/value store (Redis, memcached, a database table).
///
/// Values are opaque JSON strings; expiry is the store's responsibility when it
/// supports it, and is also checked by the cache layer on read.
#[async_trait]
pub trait ExternalCacheStore: Send + Sync {
    /// Fetch a value, `None` when absent or expired.
    async fn get(&self, key: &str) -> CheckResult<Option<String>>;

    /// Store a value with a time-to-live.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> CheckResult<()>;

    /// Drop every entry owned by this cache.
    async fn clear(&self) -> CheckResult<()>;
}
