//! Probe budget and pacing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::{EngineConfig, QuotaScope};

/// Shared by every engine configured with [`QuotaScope::Process`].
static PROCESS_QUOTA: OnceLock<Arc<ProbeQuota>> = OnceLock::new();

/// Caps the number of probes and spaces their starts.
#[derive(Debug)]
pub struct ProbeQuota {
    max_checks: u64,
    used: AtomicU64,
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl ProbeQuota {
    pub fn new(max_checks: u64, min_interval: Duration) -> Self {
        Self {
            max_checks,
            used: AtomicU64::new(0),
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    /// Quota for `config`: a fresh one, or the process-wide one.
    ///
    /// The process-wide quota takes its limits from the first config that asks
    /// for it and keeps them for the life of the process.
    pub fn for_config(config: &EngineConfig) -> Arc<Self> {
        let fresh = || Arc::new(Self::new(config.smtp_max_checks, config.smtp_rate_limit_delay()));
        match config.smtp_quota_scope {
            QuotaScope::Engine => fresh(),
            QuotaScope::Process => Arc::clone(PROCESS_QUOTA.get_or_init(fresh)),
        }
    }

    /// Take one probe from the budget. `false` once exhausted.
    pub fn try_acquire(&self) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.max_checks).then_some(used + 1)
            })
            .is_ok()
    }

    /// Wait until at least `min_interval` has passed since the previous start.
    /// Concurrent callers queue on the lock.
    pub async fn pace(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.last_start.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u64 {
        self.max_checks.saturating_sub(self.used())
    }

    /// Restore the full budget.
    pub fn reset(&self) {
        self.used.store(0, Ordering::SeqCst);
    }
}
