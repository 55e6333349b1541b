//! MX-walking SMTP prober.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;

use super::quota::ProbeQuota;
use super::reply::classify_rcpt_reply;
use super::session::{probe_recipient, Envelope};
use crate::cache::BoundedCache;
use crate::config::EngineConfig;
use crate::error::SmtpError;
use crate::traits::{DnsChecker, SmtpProber};
use crate::types::{MxHost, ProbeStats, SmtpProbeResult, SmtpStatus};
use crate::utils::normalize_domain;

fn mailbox_verdict(status: SmtpStatus) -> Option<bool> {
    match status {
        SmtpStatus::Success | SmtpStatus::CatchAll => Some(true),
        SmtpStatus::MailboxNotFound => Some(false),
        _ => None,
    }
}

/// Probes mailboxes by asking the domain's MX hosts about `RCPT TO`.
///
/// Hosts are tried in priority order until one gives an authoritative answer.
/// Authoritative results are cached per address; transient ones are probed
/// again next time. Hosts that refused a connection are skipped for the rest
/// of the prober's life.
pub struct MxSmtpProber {
    dns: Arc<dyn DnsChecker>,
    quota: Arc<ProbeQuota>,
    connections: Semaphore,
    results: Mutex<BoundedCache<String, SmtpProbeResult>>,
    unreachable: Mutex<BoundedCache<String, ()>>,
    port: u16,
    timeout: Duration,
    helo_name: String,
    from_email: String,
    mx_fallback: bool,
    attempted: AtomicU64,
    rate_limited: AtomicU64,
    cache_hits: AtomicU64,
    unreachable_skips: AtomicU64,
}

impl MxSmtpProber {
    pub fn new(config: &EngineConfig, dns: Arc<dyn DnsChecker>, quota: Arc<ProbeQuota>) -> Self {
        Self {
            dns,
            quota,
            connections: Semaphore::new(config.smtp_max_connections.max(1)),
            results: Mutex::new(BoundedCache::new(config.smtp_cache_max_entries)),
            unreachable: Mutex::new(BoundedCache::new(config.smtp_cache_max_entries)),
            port: config.smtp_port,
            timeout: config.smtp_timeout(),
            helo_name: config.smtp_helo_name.clone(),
            from_email: config.from_email.clone(),
            mx_fallback: config.smtp_mx_fallback,
            attempted: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            unreachable_skips: AtomicU64::new(0),
        }
    }

    /// Prober with the quota selected by `config.smtp_quota_scope`.
    pub fn from_config(config: &EngineConfig, dns: Arc<dyn DnsChecker>) -> Self {
        Self::new(config, dns, ProbeQuota::for_config(config))
    }

    pub fn quota(&self) -> &Arc<ProbeQuota> {
        &self.quota
    }

    /// Forget cached results and unreachable hosts.
    pub async fn clear_caches(&self) {
        self.results.lock().await.clear();
        self.unreachable.lock().await.clear();
    }

    async fn hosts_for(&self, domain: &str) -> Option<Vec<MxHost>> {
        let mut hosts = match self.dns.mx_hosts(domain).await {
            Ok(hosts) => hosts,
            Err(e) => {
                log::debug!("MX lookup for {domain} failed before probing: {e}");
                Vec::new()
            }
        };
        if hosts.is_empty() {
            if !self.mx_fallback {
                return None;
            }
            log::debug!("No MX for {domain}, probing the domain itself");
            hosts.push(MxHost::new(domain, u16::MAX));
        }
        hosts.sort_by_key(|mx| mx.priority);
        Some(hosts)
    }

    async fn connect(&self, host: &str) -> Option<TcpStream> {
        let outcome = timeout(self.timeout, TcpStream::connect((host, self.port))).await;
        let reason = match outcome {
            Ok(Ok(stream)) => return Some(stream),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}s", self.timeout.as_secs()),
        };
        log::debug!("SMTP connect to {host}:{} failed: {reason}", self.port);
        self.unreachable.lock().await.insert(host.to_string(), ());
        None
    }

    /// One host, one dialogue. `None` when the host could not be reached.
    async fn probe_host(&self, host: &str, email: &str) -> Option<SmtpProbeResult> {
        let _permit = self.connections.acquire().await.ok()?;
        let stream = self.connect(host).await?;

        let envelope = Envelope {
            helo_name: &self.helo_name,
            from_email: &self.from_email,
            recipient: email,
        };
        let mut result = SmtpProbeResult {
            attempted: true,
            server_tried: Some(host.to_string()),
            ..SmtpProbeResult::default()
        };
        match probe_recipient(stream, &envelope, self.timeout).await {
            Ok(reply) => {
                result.status_code = classify_rcpt_reply(&reply);
                result.raw_response = Some(reply.raw());
            }
            Err(SmtpError::Rejected { stage, reply }) => {
                result.status_code = SmtpStatus::ServerError;
                result.error = Some(format!("{stage} rejected"));
                result.raw_response = Some(reply);
            }
            Err(e @ SmtpError::UnsafeCommand(_)) => {
                result.status_code = SmtpStatus::InvalidFormat;
                result.error = Some(e.to_string());
            }
            Err(e @ SmtpError::MalformedReply(_)) => {
                result.status_code = SmtpStatus::Unknown;
                result.error = Some(e.to_string());
            }
            Err(e) => {
                result.status_code = SmtpStatus::ConnectionFailure;
                result.error = Some(e.to_string());
            }
        }
        result.valid = mailbox_verdict(result.status_code);
        log::debug!("SMTP probe {email} via {host}: {}", result.status_code);
        Some(result)
    }
}

#[async_trait]
impl SmtpProber for MxSmtpProber {
    async fn probe(&self, email: &str) -> SmtpProbeResult {
        let Some((local, domain)) = email.rsplit_once('@').filter(|(_, d)| !d.is_empty()) else {
            return SmtpProbeResult::skipped(SmtpStatus::InvalidFormat, "No domain in address");
        };
        if !local.is_ascii() {
            return SmtpProbeResult::skipped(
                SmtpStatus::InvalidFormat,
                "Non-ASCII local part requires SMTPUTF8",
            );
        }
        let domain = normalize_domain(domain);
        let recipient = format!("{local}@{domain}");
        let key = recipient.to_ascii_lowercase();

        if let Some(cached) = self.results.lock().await.get(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return cached.clone();
        }

        let Some(hosts) = self.hosts_for(&domain).await else {
            return SmtpProbeResult::skipped(SmtpStatus::NoMxRecords, "No MX records found");
        };

        if !self.quota.try_acquire() {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
            log::debug!("SMTP quota exhausted, skipping {email}");
            return SmtpProbeResult::skipped(SmtpStatus::RateLimited, "SMTP check quota exhausted");
        }
        self.attempted.fetch_add(1, Ordering::Relaxed);
        self.quota.pace().await;

        let mut last = None;
        for mx in &hosts {
            if self.unreachable.lock().await.contains(&mx.host) {
                self.unreachable_skips.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            let Some(result) = self.probe_host(&mx.host, &recipient).await else {
                continue;
            };
            let authoritative = result.status_code.is_authoritative();
            last = Some(result);
            if authoritative {
                break;
            }
        }

        let result = last.unwrap_or_else(|| SmtpProbeResult {
            attempted: true,
            status_code: SmtpStatus::ConnectionFailure,
            server_tried: hosts.last().map(|mx| mx.host.clone()),
            error: Some(format!("Could not connect to any mail server for {domain}")),
            ..SmtpProbeResult::default()
        });
        if result.status_code.is_authoritative() {
            self.results.lock().await.insert(key, result.clone());
        }
        result
    }

    async fn stats(&self) -> ProbeStats {
        ProbeStats {
            probes_attempted: self.attempted.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            unreachable_skips: self.unreachable_skips.load(Ordering::Relaxed),
            quota_remaining: self.quota.remaining(),
        }
    }
}
