//! DNS checker abstract Trait

use async_trait::async_trait;

use crate::error::DnsResult;
use crate::types::{DomainCheckResult, MxHost};

/// DNS checker Trait
///
/// Answers the mail-related DNS questions for a domain. Implementations are
/// expected to receive normalized domains (see
/// [`normalize_domain`](crate::normalize_domain)).
#[async_trait]
pub trait DnsChecker: Send + Sync {
    /// Run every enabled sub-check and compose the result.
    ///
    /// Never fails: lookup errors are recorded in `errors` and the matching
    /// boolean stays `false`.
    async fn check_domain(&self, domain: &str) -> DomainCheckResult;

    /// MX hosts sorted by ascending priority. Empty when the domain has none.
    async fn mx_hosts(&self, domain: &str) -> DnsResult<Vec<MxHost>>;

    /// Whether at least one A record exists.
    async fn has_a_record(&self, domain: &str) -> DnsResult<bool>;

    /// Whether a `v=spf1` TXT record exists.
    async fn has_spf_record(&self, domain: &str) -> DnsResult<bool>;

    /// Whether a `v=DMARC1` TXT record exists at `_dmarc.<domain>`.
    async fn has_dmarc_record(&self, domain: &str) -> DnsResult<bool>;

    /// Backend label reported in telemetry and results.
    fn name(&self) -> &'static str {
        "direct"
    }
}
