//! Public data types

mod dns;
mod smtp;
mod stats;
mod verdict;

pub use dns::{DomainCheckResult, MxHost};
pub use smtp::{ProbeStats, SmtpProbeResult, SmtpStatus};
pub use stats::{BatchStats, CacheTelemetry};
pub(crate) use stats::round2;
pub use verdict::{EmailRecord, PatternStatus, RejectionKind, ValidationVerdict};
