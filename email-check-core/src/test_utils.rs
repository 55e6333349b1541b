//! Test helpers
//!
//! Mock collaborators with call counters and settable failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CheckError, CheckResult, DnsLookupError, DnsResult};
use crate::services::dns::{compose_domain_check, DnsCheckFlags};
use crate::traits::{DnsChecker, ExternalCacheStore, SmtpProber};
use crate::types::{DomainCheckResult, MxHost, ProbeStats, SmtpProbeResult, SmtpStatus};
use crate::utils::domain_of;

// ===== MockDnsChecker =====

/// Canned DNS answers for one domain.
#[derive(Debug, Clone, Default)]
pub struct MockDomain {
    pub mx: Vec<MxHost>,
    pub a: bool,
    pub spf: bool,
    pub dmarc: bool,
    /// If Some, MX lookups fail with this error.
    pub mx_error: Option<DnsLookupError>,
}

#[derive(Default)]
pub struct MockDnsChecker {
    domains: RwLock<HashMap<String, MockDomain>>,
    /// If Some, every `check_domain` sleeps this long first.
    delay: RwLock<Option<Duration>>,
    /// `check_domain` panics for this domain.
    panic_domain: RwLock<Option<String>>,
    check_calls: AtomicUsize,
    mx_calls: AtomicUsize,
    a_calls: AtomicUsize,
    spf_calls: AtomicUsize,
    dmarc_calls: AtomicUsize,
}

impl MockDnsChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, domain: &str, answers: MockDomain) {
        self.domains.write().await.insert(domain.to_string(), answers);
    }

    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    pub async fn set_panic_domain(&self, domain: &str) {
        *self.panic_domain.write().await = Some(domain.to_string());
    }

    async fn answers(&self, domain: &str) -> MockDomain {
        self.domains
            .read()
            .await
            .get(domain)
            .cloned()
            .unwrap_or_default()
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn mx_calls(&self) -> usize {
        self.mx_calls.load(Ordering::SeqCst)
    }

    pub fn a_calls(&self) -> usize {
        self.a_calls.load(Ordering::SeqCst)
    }

    pub fn dmarc_calls(&self) -> usize {
        self.dmarc_calls.load(Ordering::SeqCst)
    }

    /// Every lookup of any kind.
    pub fn total_calls(&self) -> usize {
        self.check_calls()
            + self.mx_calls()
            + self.a_calls()
            + self.spf_calls.load(Ordering::SeqCst)
            + self.dmarc_calls()
    }
}

#[async_trait]
impl DnsChecker for MockDnsChecker {
    #[allow(clippy::panic)]
    async fn check_domain(&self, domain: &str) -> DomainCheckResult {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_domain.read().await.as_deref() == Some(domain) {
            panic!("resolver exploded for {domain}");
        }
        if let Some(delay) = *self.delay.read().await {
            tokio::time::sleep(delay).await;
        }
        compose_domain_check(self, domain, DnsCheckFlags::default()).await
    }

    async fn mx_hosts(&self, domain: &str) -> DnsResult<Vec<MxHost>> {
        self.mx_calls.fetch_add(1, Ordering::SeqCst);
        let answers = self.answers(domain).await;
        match answers.mx_error {
            Some(e) => Err(e),
            None => Ok(answers.mx),
        }
    }

    async fn has_a_record(&self, domain: &str) -> DnsResult<bool> {
        self.a_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answers(domain).await.a)
    }

    async fn has_spf_record(&self, domain: &str) -> DnsResult<bool> {
        self.spf_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answers(domain).await.spf)
    }

    async fn has_dmarc_record(&self, domain: &str) -> DnsResult<bool> {
        self.dmarc_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answers(domain).await.dmarc)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ===== MockSmtpProber =====

/// Returns a scripted result per domain and counts probes.
#[derive(Default)]
pub struct MockSmtpProber {
    results: RwLock<HashMap<String, SmtpProbeResult>>,
    /// Result for domains without a script.
    fallback: RwLock<Option<SmtpProbeResult>>,
    probes: RwLock<Vec<String>>,
}

impl MockSmtpProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_result(&self, domain: &str, result: SmtpProbeResult) {
        self.results.write().await.insert(domain.to_string(), result);
    }

    pub async fn set_fallback(&self, result: SmtpProbeResult) {
        *self.fallback.write().await = Some(result);
    }

    pub async fn probed(&self) -> Vec<String> {
        self.probes.read().await.clone()
    }

    pub async fn probe_count(&self) -> usize {
        self.probes.read().await.len()
    }
}

/// A conclusive probe result with `status`.
pub fn probe_result(status: SmtpStatus, raw: &str) -> SmtpProbeResult {
    SmtpProbeResult {
        attempted: !matches!(status, SmtpStatus::RateLimited | SmtpStatus::Disabled),
        valid: match status {
            SmtpStatus::Success | SmtpStatus::CatchAll => Some(true),
            SmtpStatus::MailboxNotFound => Some(false),
            _ => None,
        },
        status_code: status,
        raw_response: Some(raw.to_string()),
        server_tried: Some("mx.mock".to_string()),
        error: None,
    }
}

#[async_trait]
impl SmtpProber for MockSmtpProber {
    async fn probe(&self, email: &str) -> SmtpProbeResult {
        self.probes.write().await.push(email.to_string());
        let domain = domain_of(email).unwrap_or_default().to_ascii_lowercase();
        if let Some(result) = self.results.read().await.get(&domain) {
            return result.clone();
        }
        self.fallback
            .read()
            .await
            .clone()
            .unwrap_or_else(|| probe_result(SmtpStatus::Success, "250 OK"))
    }

    async fn stats(&self) -> ProbeStats {
        ProbeStats {
            probes_attempted: self.probes.read().await.len() as u64,
            ..ProbeStats::default()
        }
    }
}

// ===== FailingCacheStore =====

/// External store whose every call fails.
pub struct FailingCacheStore;

#[async_trait]
impl ExternalCacheStore for FailingCacheStore {
    async fn get(&self, _key: &str) -> CheckResult<Option<String>> {
        Err(CheckError::CacheError("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> CheckResult<()> {
        Err(CheckError::CacheError("connection refused".to_string()))
    }

    async fn clear(&self) -> CheckResult<()> {
        Err(CheckError::CacheError("connection refused".to_string()))
    }
}
