//! DNS checks: resolver-backed lookups and the caching layer.

mod cached;
mod hickory;
mod resolver;

use std::time::Instant;

pub use cached::CachedDnsChecker;
pub use hickory::HickoryDnsChecker;

use crate::config::EngineConfig;
use crate::traits::DnsChecker;
use crate::types::{round2, DomainCheckResult};

/// Which sub-checks [`compose_domain_check`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsCheckFlags {
    pub check_mx: bool,
    /// A records are only looked up when MX is absent.
    pub check_a: bool,
    pub check_spf: bool,
    pub check_dmarc: bool,
}

impl DnsCheckFlags {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            check_mx: config.check_mx,
            check_a: config.check_a,
            check_spf: config.check_spf,
            check_dmarc: config.check_dmarc,
        }
    }
}

impl Default for DnsCheckFlags {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Run the enabled sub-checks of `checker` and assemble a [`DomainCheckResult`].
///
/// MX, SPF and DMARC are queried concurrently; A follows only when MX came back
/// empty. Failed lookups are recorded in `errors` and leave the flag `false`.
pub async fn compose_domain_check(
    checker: &(impl DnsChecker + ?Sized),
    domain: &str,
    flags: DnsCheckFlags,
) -> DomainCheckResult {
    let started = Instant::now();
    let mut result = DomainCheckResult::empty(domain);

    let mx = async {
        if flags.check_mx {
            Some(checker.mx_hosts(domain).await)
        } else {
            None
        }
    };
    let spf = async {
        if flags.check_spf {
            Some(checker.has_spf_record(domain).await)
        } else {
            None
        }
    };
    let dmarc = async {
        if flags.check_dmarc {
            Some(checker.has_dmarc_record(domain).await)
        } else {
            None
        }
    };
    let (mx, spf, dmarc) = futures::join!(mx, spf, dmarc);

    match mx {
        Some(Ok(hosts)) => {
            result.has_mx = !hosts.is_empty();
            result.mx_hosts = hosts;
        }
        Some(Err(e)) => result.errors.push(format!("MX lookup failed: {e}")),
        None => {}
    }

    if flags.check_a && !result.has_mx {
        match checker.has_a_record(domain).await {
            Ok(found) => result.has_a = found,
            Err(e) => result.errors.push(format!("A lookup failed: {e}")),
        }
    }

    match spf {
        Some(Ok(true)) => result.has_spf = true,
        Some(Ok(false)) => result
            .warnings
            .push("No SPF record found for domain".to_string()),
        Some(Err(e)) => result.errors.push(format!("SPF lookup failed: {e}")),
        None => {}
    }

    match dmarc {
        Some(Ok(true)) => result.has_dmarc = true,
        Some(Ok(false)) => result
            .warnings
            .push("No DMARC record found for domain".to_string()),
        Some(Err(e)) => result.errors.push(format!("DMARC lookup failed: {e}")),
        None => {}
    }

    result.response_time_ms = round2(started.elapsed().as_secs_f64() * 1000.0);
    log::debug!(
        "DNS check {domain}: mx={} a={} spf={} dmarc={} ({}ms)",
        result.has_mx,
        result.has_a,
        result.has_spf,
        result.has_dmarc,
        result.response_time_ms
    );
    result
}
