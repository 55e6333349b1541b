//! Engine configuration
//!
//! A single [`EngineConfig`] value is built once (from defaults, a flat key/value
//! map, the process environment or a `.env` file) and handed to
//! [`EmailValidator::builder`](crate::EmailValidator::builder).

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CheckError, CheckResult};

/// Prefix of environment variables read by [`EngineConfig::from_env`].
pub const ENV_PREFIX: &str = "EMAIL_CHECK_";

/// DNS cache backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDriver {
    /// In-process map.
    #[default]
    Memory,
    /// One JSON file per key under `dns_cache_dir`.
    File,
    /// Caller-provided [`ExternalCacheStore`](crate::traits::ExternalCacheStore).
    External,
    /// No caching.
    Null,
}

impl fmt::Display for CacheDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File => write!(f, "file"),
            Self::External => write!(f, "external"),
            Self::Null => write!(f, "null"),
        }
    }
}

impl FromStr for CacheDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "array" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "external" | "redis" => Ok(Self::External),
            "null" | "none" => Ok(Self::Null),
            _ => Err(format!("Unknown cache driver: {s}")),
        }
    }
}

/// Who shares the SMTP probe quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    /// One quota per engine, shared by all of its concurrent tasks.
    #[default]
    Engine,
    /// One quota for every engine in the process.
    Process,
}

impl FromStr for QuotaScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "engine" | "worker" | "per_worker" => Ok(Self::Engine),
            "process" | "global" | "shared" => Ok(Self::Process),
            _ => Err(format!("Unknown quota scope: {s}")),
        }
    }
}

/// Flat engine configuration.
///
/// Time values are in seconds unless the field name says otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub check_mx: bool,
    pub check_a: bool,
    pub check_spf: bool,
    pub check_dmarc: bool,
    pub check_smtp: bool,
    pub check_disposable: bool,
    /// Reject disposable addresses instead of warning.
    pub disposable_strict: bool,
    /// JSON dataset of disposable domains; the built-in list is used when unset.
    pub disposable_list_path: Option<PathBuf>,
    pub enable_pattern_filtering: bool,
    /// Evaluate the strict rule set (warnings).
    pub pattern_strict_mode: bool,
    /// Turn strict-rule matches into rejections.
    pub pattern_strict_reject: bool,
    /// Accept A-only domains with a warning.
    pub accept_a_fallback: bool,
    /// Custom nameserver IPs; the system resolver is used when empty.
    pub dns_servers: Vec<String>,
    /// Per DNS query timeout.
    pub timeout: u64,
    /// SMTP connect and per-reply read timeout.
    pub smtp_timeout: u64,
    pub smtp_port: u16,
    /// Cap on concurrent SMTP sessions per engine.
    pub smtp_max_connections: usize,
    /// Probe quota.
    pub smtp_max_checks: u64,
    /// Minimum spacing between probe starts (fractional seconds allowed).
    pub smtp_rate_limit_delay: f64,
    /// Probe the bare domain when it has no MX records.
    pub smtp_mx_fallback: bool,
    pub smtp_quota_scope: QuotaScope,
    /// Size bound of the per-address probe cache.
    pub smtp_cache_max_entries: usize,
    /// Name announced in EHLO/HELO.
    pub smtp_helo_name: String,
    /// Probe a random local part after a success to spot catch-all domains.
    pub detect_catch_all: bool,
    pub from_email: String,
    pub from_name: String,
    pub dns_cache_driver: CacheDriver,
    /// Entry cap of the in-memory DNS cache.
    pub dns_cache_max_entries: usize,
    pub dns_cache_ttl: u64,
    /// Directory of the file cache backend.
    pub dns_cache_dir: PathBuf,
    /// Pool concurrency for batch validation.
    pub max_concurrent: usize,
    /// Wall-clock limit for one address in a batch.
    pub task_timeout: u64,
    pub pool_poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_mx: true,
            check_a: true,
            check_spf: true,
            check_dmarc: true,
            check_smtp: false,
            check_disposable: true,
            disposable_strict: false,
            disposable_list_path: None,
            enable_pattern_filtering: true,
            pattern_strict_mode: false,
            pattern_strict_reject: false,
            accept_a_fallback: false,
            dns_servers: Vec::new(),
            timeout: 5,
            smtp_timeout: 10,
            smtp_port: 25,
            smtp_max_connections: 3,
            smtp_max_checks: 50,
            smtp_rate_limit_delay: 3.0,
            smtp_mx_fallback: true,
            smtp_quota_scope: QuotaScope::Engine,
            smtp_cache_max_entries: 50_000,
            smtp_helo_name: "localhost".to_string(),
            detect_catch_all: false,
            from_email: "test@example.com".to_string(),
            from_name: "Email Validator".to_string(),
            dns_cache_driver: CacheDriver::Memory,
            dns_cache_max_entries: 10_000,
            dns_cache_ttl: 3600,
            dns_cache_dir: std::env::temp_dir().join("email-check-dns-cache"),
            max_concurrent: 10,
            task_timeout: 60,
            pool_poll_interval_ms: 50,
        }
    }
}

/// Parse a boolean flag the way `.env` files spell them.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Assign `raw` into `slot` or keep the default with a warning.
fn assign<T: FromStr>(slot: &mut T, key: &str, raw: &str) {
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => log::warn!("Ignoring invalid value for {key}: {raw:?}"),
    }
}

fn assign_bool(slot: &mut bool, key: &str, raw: &str) {
    match parse_bool(raw) {
        Some(value) => *slot = value,
        None => log::warn!("Ignoring invalid boolean for {key}: {raw:?}"),
    }
}

impl EngineConfig {
    /// Build a configuration from flat `key = value` pairs over the defaults.
    ///
    /// Unknown keys are ignored; unparsable values keep their default. An
    /// unknown cache driver falls back to the in-memory backend.
    pub fn from_map(values: &HashMap<String, String>) -> Self {
        let mut config = Self::default();
        for (key, raw) in values {
            config.apply(&key.to_ascii_lowercase(), raw);
        }
        config
    }

    /// Read `EMAIL_CHECK_<KEY>` variables, plus the legacy
    /// `EMAIL_DNS_CACHE_DRIVER` / `EMAIL_DNS_CACHE_TTL` names.
    pub fn from_env() -> Self {
        Self::from_map(&Self::collect_env(std::env::vars()))
    }

    /// Parse a `.env` style file (`KEY=VALUE`, `#` comments, optional quotes)
    /// and apply the same key mapping as [`from_env`](Self::from_env).
    pub fn from_env_file(path: impl AsRef<Path>) -> CheckResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CheckError::ConfigError(format!(
                "Cannot read env file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let pairs = parse_env_file(&content);
        Ok(Self::from_map(&Self::collect_env(pairs.into_iter())))
    }

    /// Map environment-style variable names onto config keys.
    fn collect_env(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for (name, value) in vars {
            let key = match name.as_str() {
                "EMAIL_DNS_CACHE_DRIVER" => "dns_cache_driver".to_string(),
                "EMAIL_DNS_CACHE_TTL" => "dns_cache_ttl".to_string(),
                _ => match name.strip_prefix(ENV_PREFIX) {
                    Some(rest) => rest.to_ascii_lowercase(),
                    None => continue,
                },
            };
            map.insert(key, value);
        }
        map
    }

    fn apply(&mut self, key: &str, raw: &str) {
        match key {
            "check_mx" => assign_bool(&mut self.check_mx, key, raw),
            "check_a" => assign_bool(&mut self.check_a, key, raw),
            "check_spf" => assign_bool(&mut self.check_spf, key, raw),
            "check_dmarc" => assign_bool(&mut self.check_dmarc, key, raw),
            "check_smtp" => assign_bool(&mut self.check_smtp, key, raw),
            "check_disposable" => assign_bool(&mut self.check_disposable, key, raw),
            "disposable_strict" => assign_bool(&mut self.disposable_strict, key, raw),
            "disposable_list_path" => {
                self.disposable_list_path =
                    Some(raw.trim()).filter(|p| !p.is_empty()).map(PathBuf::from);
            }
            "enable_pattern_filtering" => {
                assign_bool(&mut self.enable_pattern_filtering, key, raw);
            }
            "pattern_strict_mode" => assign_bool(&mut self.pattern_strict_mode, key, raw),
            "pattern_strict_reject" => assign_bool(&mut self.pattern_strict_reject, key, raw),
            "accept_a_fallback" => assign_bool(&mut self.accept_a_fallback, key, raw),
            "dns_servers" => {
                self.dns_servers = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
            }
            "timeout" => assign(&mut self.timeout, key, raw),
            "smtp_timeout" => assign(&mut self.smtp_timeout, key, raw),
            "smtp_port" => assign(&mut self.smtp_port, key, raw),
            "smtp_max_connections" => assign(&mut self.smtp_max_connections, key, raw),
            "smtp_max_checks" => assign(&mut self.smtp_max_checks, key, raw),
            "smtp_rate_limit_delay" => assign(&mut self.smtp_rate_limit_delay, key, raw),
            "smtp_mx_fallback" => assign_bool(&mut self.smtp_mx_fallback, key, raw),
            "smtp_quota_scope" => assign(&mut self.smtp_quota_scope, key, raw),
            "smtp_cache_max_entries" => assign(&mut self.smtp_cache_max_entries, key, raw),
            "smtp_helo_name" => self.smtp_helo_name = raw.trim().to_string(),
            "detect_catch_all" => assign_bool(&mut self.detect_catch_all, key, raw),
            "from_email" | "smtp_from_email" => self.from_email = raw.trim().to_string(),
            "from_name" | "smtp_from_name" => self.from_name = raw.trim().to_string(),
            "dns_cache_driver" => match raw.parse::<CacheDriver>() {
                Ok(driver) => self.dns_cache_driver = driver,
                Err(e) => {
                    log::warn!("{e}, falling back to the in-memory cache");
                    self.dns_cache_driver = CacheDriver::Memory;
                }
            },
            "dns_cache_ttl" => assign(&mut self.dns_cache_ttl, key, raw),
            "dns_cache_max_entries" => assign(&mut self.dns_cache_max_entries, key, raw),
            "dns_cache_dir" => self.dns_cache_dir = PathBuf::from(raw.trim()),
            "max_concurrent" => assign(&mut self.max_concurrent, key, raw),
            "task_timeout" => assign(&mut self.task_timeout, key, raw),
            "pool_poll_interval_ms" => assign(&mut self.pool_poll_interval_ms, key, raw),
            _ => log::debug!("Ignoring unknown config key: {key}"),
        }
    }

    /// DNS query timeout.
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }

    /// SMTP connect/read timeout.
    pub fn smtp_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_timeout.max(1))
    }

    /// Minimum spacing between probe starts.
    pub fn smtp_rate_limit_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.smtp_rate_limit_delay).unwrap_or(Duration::ZERO)
    }

    /// Cache TTL.
    pub fn dns_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dns_cache_ttl)
    }

    /// Per-address limit inside a batch.
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout)
    }

    /// Pool poll interval.
    pub fn pool_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pool_poll_interval_ms)
    }
}

/// Split `.env` content into key/value pairs.
pub fn parse_env_file(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}
