//! SMTP prober abstract Trait

use async_trait::async_trait;

use crate::types::{ProbeStats, SmtpProbeResult};

/// SMTP mailbox prober Trait
#[async_trait]
pub trait SmtpProber: Send + Sync {
    /// Ask the domain's mail servers whether they accept `email` as a recipient.
    ///
    /// Never fails; every outcome is classified into the result's status.
    async fn probe(&self, email: &str) -> SmtpProbeResult;

    /// Prober counters. Implementations without counters return defaults.
    async fn stats(&self) -> ProbeStats {
        ProbeStats::default()
    }
}
