//! Validation orchestrator
//!
//! [`EmailValidator`] runs one address through the pipeline
//! pattern filter → format gate → disposable check → DNS → SMTP and folds every
//! stage into a [`ValidationVerdict`]. Batches go through the task pool so a
//! slow or crashing validation only costs its own verdict.

use std::collections::HashMap;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use email_check_pool::Pool;
use futures::FutureExt;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};

use super::disposable::DisposableDetector;
use super::dns::{CachedDnsChecker, HickoryDnsChecker};
use super::format::is_well_formed;
use super::pattern::PatternFilter;
use super::smtp::{MxSmtpProber, ProbeQuota};
use crate::config::EngineConfig;
use crate::error::CheckResult;
use crate::traits::{DnsChecker, EmailSource, ExternalCacheStore, SmtpProber};
use crate::types::{
    BatchStats, CacheTelemetry, ProbeStats, RejectionKind, SmtpProbeResult, SmtpStatus,
    ValidationVerdict,
};
use crate::utils::{domain_of, normalize_domain};

/// Length of the random local part used for catch-all detection.
const CATCH_ALL_LOCAL_LEN: usize = 16;

/// Which optional stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub with_smtp: bool,
    pub with_disposable_check: bool,
    pub with_advanced_patterns: bool,
}

impl Capabilities {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            with_smtp: config.check_smtp,
            with_disposable_check: config.check_disposable,
            with_advanced_patterns: config.enable_pattern_filtering,
        }
    }
}

/// Builder for [`EmailValidator`]. Every collaborator defaults to the
/// implementation selected by the config.
pub struct EmailValidatorBuilder {
    config: EngineConfig,
    capabilities: Option<Capabilities>,
    dns_checker: Option<Arc<dyn DnsChecker>>,
    smtp_prober: Option<Arc<dyn SmtpProber>>,
    disposable_detector: Option<Arc<DisposableDetector>>,
    pattern_filter: Option<PatternFilter>,
    external_cache: Option<Arc<dyn ExternalCacheStore>>,
    probe_quota: Option<Arc<ProbeQuota>>,
}

impl EmailValidatorBuilder {
    /// Override the stages derived from the config.
    #[must_use]
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Uncached DNS checker; it is always wrapped in the DNS cache.
    #[must_use]
    pub fn dns_checker(mut self, checker: Arc<dyn DnsChecker>) -> Self {
        self.dns_checker = Some(checker);
        self
    }

    #[must_use]
    pub fn smtp_prober(mut self, prober: Arc<dyn SmtpProber>) -> Self {
        self.smtp_prober = Some(prober);
        self
    }

    #[must_use]
    pub fn disposable_detector(mut self, detector: Arc<DisposableDetector>) -> Self {
        self.disposable_detector = Some(detector);
        self
    }

    #[must_use]
    pub fn pattern_filter(mut self, filter: PatternFilter) -> Self {
        self.pattern_filter = Some(filter);
        self
    }

    /// Store used when `dns_cache_driver` is `external`.
    #[must_use]
    pub fn external_cache(mut self, store: Arc<dyn ExternalCacheStore>) -> Self {
        self.external_cache = Some(store);
        self
    }

    /// Quota for the default prober, e.g. one shared between several engines.
    #[must_use]
    pub fn probe_quota(mut self, quota: Arc<ProbeQuota>) -> Self {
        self.probe_quota = Some(quota);
        self
    }

    pub fn build(self) -> EmailValidator {
        let config = self.config;
        let capabilities = self
            .capabilities
            .unwrap_or_else(|| Capabilities::from_config(&config));

        let inner = self
            .dns_checker
            .unwrap_or_else(|| Arc::new(HickoryDnsChecker::new(&config)));
        let dns = Arc::new(CachedDnsChecker::from_config(
            inner,
            &config,
            self.external_cache,
        ));

        let smtp = capabilities.with_smtp.then(|| {
            self.smtp_prober.unwrap_or_else(|| {
                let quota = self
                    .probe_quota
                    .unwrap_or_else(|| ProbeQuota::for_config(&config));
                let dns: Arc<dyn DnsChecker> = dns.clone();
                Arc::new(MxSmtpProber::new(&config, dns, quota))
            })
        });

        let disposable = capabilities.with_disposable_check.then(|| {
            self.disposable_detector.unwrap_or_else(|| {
                Arc::new(match &config.disposable_list_path {
                    Some(path) => DisposableDetector::load_or_builtin(path),
                    None => DisposableDetector::builtin(),
                })
            })
        });

        let patterns = self.pattern_filter.unwrap_or_else(|| {
            PatternFilter::new(
                capabilities.with_advanced_patterns,
                config.pattern_strict_mode,
                config.pattern_strict_reject,
            )
        });

        log::debug!(
            "Email validator ready: dns={} smtp={} disposable={} patterns={}",
            dns.backend().driver_name(),
            smtp.is_some(),
            disposable.is_some(),
            patterns.is_enabled()
        );

        EmailValidator {
            config: Arc::new(config),
            capabilities,
            patterns: Arc::new(patterns),
            disposable,
            dns,
            smtp,
            catch_all_domains: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

/// Email validation engine
///
/// Cheap to clone; clones share caches, quota and collaborators.
#[derive(Clone)]
pub struct EmailValidator {
    config: Arc<EngineConfig>,
    capabilities: Capabilities,
    patterns: Arc<PatternFilter>,
    disposable: Option<Arc<DisposableDetector>>,
    dns: Arc<CachedDnsChecker>,
    smtp: Option<Arc<dyn SmtpProber>>,
    /// Catch-all verdict per domain, filled by conclusive detections.
    catch_all_domains: Arc<RwLock<HashMap<String, bool>>>,
}

impl EmailValidator {
    pub fn builder(config: EngineConfig) -> EmailValidatorBuilder {
        EmailValidatorBuilder {
            config,
            capabilities: None,
            dns_checker: None,
            smtp_prober: None,
            disposable_detector: None,
            pattern_filter: None,
            external_cache: None,
            probe_quota: None,
        }
    }

    /// Validator with default collaborators for `config`.
    pub fn new(config: EngineConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn disposable_detector(&self) -> Option<&Arc<DisposableDetector>> {
        self.disposable.as_ref()
    }

    /// Validate one address. Never fails; every outcome is in the verdict.
    pub async fn validate(&self, email: &str) -> ValidationVerdict {
        let mut verdict = ValidationVerdict::new(email);

        if self.capabilities.with_advanced_patterns {
            let check = self.patterns.check(email);
            verdict.pattern_status = check.status;
            verdict.warnings.extend(check.warnings);
            if !check.valid {
                verdict.reject(
                    RejectionKind::Format,
                    check
                        .reason
                        .unwrap_or_else(|| "Email matches invalid pattern".to_string()),
                );
                return verdict.finalize();
            }
        }

        let domain = match domain_of(email) {
            Some(domain) if is_well_formed(email) => domain,
            _ => {
                verdict.reject(RejectionKind::Format, "Invalid email format");
                return verdict.finalize();
            }
        };

        if let Some(detector) = &self.disposable {
            if detector.is_disposable_domain(domain) {
                verdict.is_disposable = true;
                if self.config.disposable_strict {
                    verdict.reject(
                        RejectionKind::Disposable,
                        "Disposable email address not allowed",
                    );
                    return verdict.finalize();
                }
                verdict
                    .warnings
                    .push("Disposable email address detected".to_string());
            }
        }

        self.apply_dns(&mut verdict, domain).await;
        if !verdict.domain_valid {
            return verdict.finalize();
        }
        verdict.is_valid = true;

        if let Some(prober) = &self.smtp {
            self.apply_smtp(&mut verdict, prober.as_ref(), email, domain)
                .await;
        }
        verdict.finalize()
    }

    async fn apply_dns(&self, verdict: &mut ValidationVerdict, domain: &str) {
        let dns = self.dns.check_domain(domain).await;
        verdict.warnings.extend(dns.warnings.iter().cloned());
        verdict.warnings.extend(dns.errors.iter().cloned());

        if dns.has_mx {
            verdict.domain_valid = true;
        } else if dns.has_a {
            if self.config.accept_a_fallback {
                verdict.domain_valid = true;
                verdict
                    .warnings
                    .push("Domain has no MX records, accepted on A record".to_string());
            } else {
                verdict.reject(RejectionKind::Dns, "Domain has no MX records (A record only)");
            }
        } else {
            verdict.reject(RejectionKind::Dns, "Domain has no valid MX or A records");
        }
        verdict.dns = Some(dns);
    }

    async fn apply_smtp(
        &self,
        verdict: &mut ValidationVerdict,
        prober: &dyn SmtpProber,
        email: &str,
        domain: &str,
    ) {
        let mut probe = prober.probe(email).await;
        let status = probe.status_code;
        match status {
            SmtpStatus::Success => {
                if self.config.detect_catch_all && self.is_catch_all(prober, domain).await {
                    probe.status_code = SmtpStatus::CatchAll;
                    verdict.warnings.push(
                        "Domain accepts any address (catch-all), mailbox existence not confirmed"
                            .to_string(),
                    );
                }
            }
            SmtpStatus::MailboxNotFound => {
                let reply = probe
                    .raw_response
                    .as_deref()
                    .or(probe.error.as_deref())
                    .unwrap_or("mailbox not found");
                verdict.reject(
                    RejectionKind::Smtp,
                    format!("SMTP validation failed: {reply}"),
                );
            }
            SmtpStatus::RateLimited => verdict
                .warnings
                .push("SMTP validation skipped (rate limited), using DNS result".to_string()),
            SmtpStatus::ConnectionFailure => verdict
                .warnings
                .push("SMTP connection failed, using DNS result".to_string()),
            other => verdict.warnings.push(format!(
                "SMTP validation inconclusive ({other}), using DNS result"
            )),
        }
        verdict.smtp = probe;
    }

    /// Probe an implausible address at `domain`; acceptance means catch-all.
    async fn is_catch_all(&self, prober: &dyn SmtpProber, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        if let Some(known) = self.catch_all_domains.read().await.get(&domain) {
            return *known;
        }

        let probe_address = format!("{}@{domain}", random_local_part());
        let SmtpProbeResult { status_code, .. } = prober.probe(&probe_address).await;
        let catch_all = match status_code {
            SmtpStatus::Success => true,
            SmtpStatus::MailboxNotFound => false,
            other => {
                log::debug!("Catch-all check for {domain} inconclusive: {other}");
                return false;
            }
        };
        log::debug!("Catch-all check for {domain}: {catch_all}");
        self.catch_all_domains
            .write()
            .await
            .insert(domain, catch_all);
        catch_all
    }

    /// Validate `emails` concurrently through the task pool.
    ///
    /// Results come back in input order. A task that fails or exceeds
    /// `task_timeout` yields a verdict with `rejection = internal`.
    pub async fn validate_batch<S: AsRef<str>>(&self, emails: &[S]) -> Vec<ValidationVerdict> {
        if emails.is_empty() {
            return Vec::new();
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, ValidationVerdict)>();
        let mut pool = Pool::create()
            .concurrency(self.config.max_concurrent)
            .timeout(self.config.task_timeout())
            .poll_interval(self.config.pool_poll_interval());

        for (index, email) in emails.iter().enumerate() {
            let email = email.as_ref().to_string();
            let validator = self.clone();
            let work_email = email.clone();
            let success_tx = tx.clone();
            let failure_tx = tx.clone();
            pool.add(async move { Ok::<_, Infallible>(validator.validate(&work_email).await) })
                .on_success(move |verdict| {
                    let _ = success_tx.send((index, verdict));
                })
                .on_failure(move |failure| {
                    log::warn!("Validation of {email} failed: {failure}");
                    let verdict = ValidationVerdict::task_failure(email, &failure.to_string());
                    let _ = failure_tx.send((index, verdict));
                });
        }
        drop(tx);

        let report = pool.wait().await;
        log::info!(
            "Validated batch of {}: {} completed, {} failed, {} timed out",
            report.total(),
            report.succeeded(),
            report.failed(),
            report.timed_out()
        );

        let mut slots: Vec<Option<ValidationVerdict>> = vec![None; emails.len()];
        while let Ok((index, verdict)) = rx.try_recv() {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(verdict);
            }
        }
        slots
            .into_iter()
            .zip(emails)
            .map(|(slot, email)| {
                slot.unwrap_or_else(|| {
                    ValidationVerdict::task_failure(email.as_ref(), "no result reported")
                })
            })
            .collect()
    }

    /// Validate `emails` one at a time. A panicking validation becomes a
    /// failure verdict instead of unwinding through the caller.
    pub async fn validate_batch_sequential<S: AsRef<str>>(
        &self,
        emails: &[S],
    ) -> Vec<ValidationVerdict> {
        let mut verdicts = Vec::with_capacity(emails.len());
        for email in emails {
            let email = email.as_ref();
            let verdict = match AssertUnwindSafe(self.validate(email)).catch_unwind().await {
                Ok(verdict) => verdict,
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    log::error!("Validation of {email} panicked: {reason}");
                    ValidationVerdict::task_failure(email, &reason)
                }
            };
            verdicts.push(verdict);
        }
        verdicts
    }

    /// Page through `source` and validate every record, in source order.
    pub async fn validate_source(
        &self,
        source: &dyn EmailSource,
        page_size: usize,
    ) -> CheckResult<Vec<ValidationVerdict>> {
        let total = source.count().await?;
        let page_size = page_size.max(1);
        let mut verdicts = Vec::with_capacity(total);
        let mut offset = 0;
        while offset < total {
            let page = source.fetch(page_size, offset).await?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            let emails: Vec<String> = page.into_iter().map(|record| record.email).collect();
            verdicts.extend(self.validate_batch(&emails).await);
            log::info!("Validated {offset}/{total} addresses from source");
        }
        Ok(verdicts)
    }

    /// Aggregate counters over `verdicts`.
    pub fn stats(verdicts: &[ValidationVerdict]) -> BatchStats {
        BatchStats::from_verdicts(verdicts)
    }

    pub fn dns_cache_telemetry(&self) -> CacheTelemetry {
        self.dns.telemetry()
    }

    pub async fn clear_dns_cache(&self) -> CheckResult<()> {
        self.dns.clear_cache().await
    }

    /// Prober counters, when SMTP probing is enabled.
    pub async fn smtp_stats(&self) -> Option<ProbeStats> {
        match &self.smtp {
            Some(prober) => Some(prober.stats().await),
            None => None,
        }
    }
}

fn random_local_part() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(CATCH_ALL_LOCAL_LEN)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
