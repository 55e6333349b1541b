//! DNS check result types

use serde::{Deserialize, Serialize};

/// A mail exchanger and its preference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MxHost {
    /// Exchange host name, without the trailing dot.
    pub host: String,
    /// MX preference; lower is tried first.
    pub priority: u16,
}

impl MxHost {
    pub fn new(host: impl Into<String>, priority: u16) -> Self {
        Self {
            host: host.into(),
            priority,
        }
    }
}

/// Outcome of checking one domain's mail-related DNS records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCheckResult {
    /// Normalized (lowercase, punycode) domain.
    pub domain: String,
    /// At least one MX record exists.
    pub has_mx: bool,
    /// At least one A record exists. Only looked up when MX is absent.
    pub has_a: bool,
    /// A `v=spf1` TXT record exists.
    pub has_spf: bool,
    /// A `v=DMARC1` TXT record exists at `_dmarc.<domain>`.
    pub has_dmarc: bool,
    /// MX hosts sorted by ascending priority.
    pub mx_hosts: Vec<MxHost>,
    /// Wall-clock time of the lookups in milliseconds.
    pub response_time_ms: f64,
    /// Non-fatal observations (missing SPF/DMARC).
    pub warnings: Vec<String>,
    /// Lookup failures; the matching boolean stays `false`.
    pub errors: Vec<String>,
    /// Whether this result was served from cache.
    pub from_cache: bool,
    /// Name of the cache backend that served or stored the result.
    pub cache_driver: Option<String>,
}

impl DomainCheckResult {
    /// Empty result for `domain` with every record absent.
    pub fn empty(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// Whether the domain can receive mail by its MX records alone.
    pub fn is_deliverable(&self) -> bool {
        self.has_mx
    }
}
