//! DNS checker backed by hickory-resolver.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::{ResolveError, TokioResolver};
use tokio::time::timeout;

use super::resolver::{build_resolver, parse_nameservers};
use super::{compose_domain_check, DnsCheckFlags};
use crate::config::EngineConfig;
use crate::error::{DnsLookupError, DnsResult};
use crate::traits::DnsChecker;
use crate::types::{DomainCheckResult, MxHost};

/// Resolver-backed [`DnsChecker`].
#[derive(Clone)]
pub struct HickoryDnsChecker {
    resolver: TokioResolver,
    flags: DnsCheckFlags,
    timeout: Duration,
}

fn fqdn(domain: &str) -> String {
    if domain.ends_with('.') {
        domain.to_string()
    } else {
        format!("{domain}.")
    }
}

/// Concatenated character-strings of every TXT record at the name.
fn txt_strings(lookup: &hickory_resolver::lookup::TxtLookup) -> Vec<String> {
    lookup
        .iter()
        .map(|txt| {
            txt.iter()
                .map(|data| String::from_utf8_lossy(data))
                .collect::<String>()
        })
        .collect()
}

impl HickoryDnsChecker {
    pub fn new(config: &EngineConfig) -> Self {
        let timeout = config.dns_timeout();
        let nameservers = parse_nameservers(&config.dns_servers);
        Self {
            resolver: build_resolver(&nameservers, timeout),
            flags: DnsCheckFlags::from_config(config),
            timeout,
        }
    }

    /// Bound a query by the configured timeout and fold "no records" into `None`.
    async fn query<T>(
        &self,
        name: &str,
        lookup: impl Future<Output = Result<T, ResolveError>>,
    ) -> DnsResult<Option<T>> {
        match timeout(self.timeout, lookup).await {
            Err(_) => Err(DnsLookupError::Timeout(name.to_string())),
            Ok(Ok(answer)) => Ok(Some(answer)),
            Ok(Err(e)) if e.is_no_records_found() => Ok(None),
            Ok(Err(e)) => Err(DnsLookupError::Resolve(format!("{name}: {e}"))),
        }
    }

    async fn has_txt_prefix(&self, name: &str, prefix: &str) -> DnsResult<bool> {
        let Some(lookup) = self.query(name, self.resolver.txt_lookup(fqdn(name))).await? else {
            return Ok(false);
        };
        Ok(txt_strings(&lookup)
            .iter()
            .any(|txt| txt.trim_start().to_ascii_lowercase().starts_with(prefix)))
    }
}

#[async_trait]
impl DnsChecker for HickoryDnsChecker {
    async fn check_domain(&self, domain: &str) -> DomainCheckResult {
        compose_domain_check(self, domain, self.flags).await
    }

    async fn mx_hosts(&self, domain: &str) -> DnsResult<Vec<MxHost>> {
        let Some(lookup) = self.query(domain, self.resolver.mx_lookup(fqdn(domain))).await? else {
            return Ok(Vec::new());
        };
        let mut hosts: Vec<MxHost> = lookup
            .iter()
            .map(|mx| {
                MxHost::new(
                    mx.exchange().to_string().trim_end_matches('.'),
                    mx.preference(),
                )
            })
            // Null MX (RFC 7505) declares that the domain accepts no mail.
            .filter(|mx| !mx.host.is_empty())
            .collect();
        hosts.sort_by_key(|mx| mx.priority);
        Ok(hosts)
    }

    async fn has_a_record(&self, domain: &str) -> DnsResult<bool> {
        let lookup = self
            .query(domain, self.resolver.ipv4_lookup(fqdn(domain)))
            .await?;
        Ok(lookup.is_some_and(|answer| answer.iter().next().is_some()))
    }

    async fn has_spf_record(&self, domain: &str) -> DnsResult<bool> {
        self.has_txt_prefix(domain, "v=spf1").await
    }

    async fn has_dmarc_record(&self, domain: &str) -> DnsResult<bool> {
        self.has_txt_prefix(&format!("_dmarc.{domain}"), "v=dmarc1")
            .await
    }

    fn name(&self) -> &'static str {
        "hickory"
    }
}
