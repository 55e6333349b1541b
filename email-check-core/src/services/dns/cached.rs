//! Caching wrapper around any [`DnsChecker`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::CacheBackend;
use crate::config::EngineConfig;
use crate::error::{CheckResult, DnsResult};
use crate::traits::{DnsChecker, ExternalCacheStore};
use crate::types::{round2, CacheTelemetry, DomainCheckResult, MxHost};
use crate::utils::normalize_domain;

const KEY_PREFIX: &str = "email_check:dns";

/// Memoizes the composite domain check and each sub-check under its own key.
///
/// Successful answers (including "no records") are cached for the TTL; lookup
/// failures are not. A backend failure is counted in telemetry and the lookup
/// goes straight to the wrapped checker.
pub struct CachedDnsChecker {
    inner: Arc<dyn DnsChecker>,
    backend: CacheBackend,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl CachedDnsChecker {
    pub fn new(inner: Arc<dyn DnsChecker>, backend: CacheBackend, ttl: Duration) -> Self {
        log::debug!(
            "DNS cache using {} backend, ttl {}s",
            backend.driver_name(),
            ttl.as_secs()
        );
        Self {
            inner,
            backend,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Wrap `inner` with the backend and TTL named in `config`.
    pub fn from_config(
        inner: Arc<dyn DnsChecker>,
        config: &EngineConfig,
        external: Option<Arc<dyn ExternalCacheStore>>,
    ) -> Self {
        Self::new(
            inner,
            CacheBackend::from_config(config, external),
            config.dns_cache_ttl(),
        )
    }

    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }

    fn key(kind: &str, domain: &str) -> String {
        format!("{KEY_PREFIX}:{kind}:{domain}")
    }

    async fn lookup_cached<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        if !self.backend.is_enabled() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        match self.backend.get::<T>(key).await {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("DNS cache read failed for {key}: {e}");
                None
            }
        }
    }

    async fn store<T>(&self, key: &str, value: &T)
    where
        T: Serialize + Sync,
    {
        if let Err(e) = self.backend.set(key, value, self.ttl).await {
            self.errors.fetch_add(1, Ordering::Relaxed);
            log::warn!("DNS cache write failed for {key}: {e}");
        }
    }

    /// Serve `kind` for `domain` from cache, or run `load` and cache a success.
    async fn cached<T, F>(&self, kind: &str, domain: &str, load: F) -> DnsResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: Future<Output = DnsResult<T>> + Send,
    {
        let key = Self::key(kind, domain);
        if let Some(value) = self.lookup_cached::<T>(&key).await {
            return Ok(value);
        }
        let value = load.await?;
        self.store(&key, &value).await;
        Ok(value)
    }

    /// Current hit/miss counters.
    pub fn telemetry(&self) -> CacheTelemetry {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        #[allow(clippy::cast_precision_loss)] // counters stay far below 2^52
        let hit_rate = if total == 0 {
            0.0
        } else {
            round2(hits as f64 / total as f64 * 100.0)
        };
        CacheTelemetry {
            hits,
            misses,
            errors: self.errors.load(Ordering::Relaxed),
            total_requests: total,
            hit_rate,
            cache_driver: self.backend.driver_name().to_string(),
            cache_ttl: self.ttl.as_secs(),
        }
    }

    pub fn reset_telemetry(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }

    pub async fn clear_cache(&self) -> CheckResult<()> {
        self.backend.clear().await
    }
}

#[async_trait]
impl DnsChecker for CachedDnsChecker {
    async fn check_domain(&self, domain: &str) -> DomainCheckResult {
        let domain = normalize_domain(domain);
        let key = Self::key("domain", &domain);
        let driver = Some(self.backend.driver_name().to_string());

        if let Some(mut result) = self.lookup_cached::<DomainCheckResult>(&key).await {
            result.from_cache = true;
            result.cache_driver = driver;
            return result;
        }

        let mut result = self.inner.check_domain(&domain).await;
        result.from_cache = false;
        result.cache_driver = driver;
        if result.errors.is_empty() {
            self.store(&key, &result).await;
            // An empty list may mean MX was never queried, so only a hit is reused.
            if result.has_mx {
                self.store(&Self::key("mx", &domain), &result.mx_hosts).await;
            }
        }
        result
    }

    async fn mx_hosts(&self, domain: &str) -> DnsResult<Vec<MxHost>> {
        let domain = normalize_domain(domain);
        self.cached("mx", &domain, self.inner.mx_hosts(&domain)).await
    }

    async fn has_a_record(&self, domain: &str) -> DnsResult<bool> {
        let domain = normalize_domain(domain);
        self.cached("a", &domain, self.inner.has_a_record(&domain))
            .await
    }

    async fn has_spf_record(&self, domain: &str) -> DnsResult<bool> {
        let domain = normalize_domain(domain);
        self.cached("spf", &domain, self.inner.has_spf_record(&domain))
            .await
    }

    async fn has_dmarc_record(&self, domain: &str) -> DnsResult<bool> {
        let domain = normalize_domain(domain);
        self.cached("dmarc", &domain, self.inner.has_dmarc_record(&domain))
            .await
    }

    fn name(&self) -> &'static str {
        "cached"
    }
}
