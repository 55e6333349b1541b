//! SMTP probe result types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Classification of an SMTP probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpStatus {
    /// The server accepted the recipient.
    Success,
    /// The server rejected the recipient as unknown.
    MailboxNotFound,
    /// The server accepts any recipient at this domain.
    CatchAll,
    /// Transient or policy rejection; not authoritative for the mailbox.
    ServerError,
    /// No MX host could be reached.
    ConnectionFailure,
    /// The address has no usable domain part.
    InvalidFormat,
    /// The domain has no MX records and bare-domain fallback is off.
    NoMxRecords,
    /// The probe quota is exhausted; nothing was sent.
    RateLimited,
    /// The reply could not be classified.
    Unknown,
    /// SMTP probing is not enabled.
    #[default]
    Disabled,
}

impl SmtpStatus {
    /// Whether this status settles the mailbox question on its own.
    pub fn is_authoritative(self) -> bool {
        matches!(self, Self::Success | Self::MailboxNotFound)
    }
}

impl fmt::Display for SmtpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::MailboxNotFound => "mailbox_not_found",
            Self::CatchAll => "catch_all",
            Self::ServerError => "server_error",
            Self::ConnectionFailure => "connection_failure",
            Self::InvalidFormat => "invalid_format",
            Self::NoMxRecords => "no_mx_records",
            Self::RateLimited => "rate_limited",
            Self::Unknown => "unknown",
            Self::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

impl FromStr for SmtpStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "mailbox_not_found" => Ok(Self::MailboxNotFound),
            "catch_all" => Ok(Self::CatchAll),
            "server_error" => Ok(Self::ServerError),
            "connection_failure" => Ok(Self::ConnectionFailure),
            "invalid_format" => Ok(Self::InvalidFormat),
            "no_mx_records" => Ok(Self::NoMxRecords),
            "rate_limited" => Ok(Self::RateLimited),
            "unknown" => Ok(Self::Unknown),
            "disabled" => Ok(Self::Disabled),
            _ => Err(format!("Unknown SMTP status: {s}")),
        }
    }
}

/// Result of probing one mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpProbeResult {
    /// Whether a connection to a mail server was attempted.
    pub attempted: bool,
    /// Mailbox verdict when the probe was conclusive.
    pub valid: Option<bool>,
    /// Classified outcome.
    pub status_code: SmtpStatus,
    /// Last reply text relevant to the outcome.
    pub raw_response: Option<String>,
    /// Host of the last server contacted.
    pub server_tried: Option<String>,
    /// Error description, if any.
    pub error: Option<String>,
}

impl SmtpProbeResult {
    /// A probe that never touched the network.
    pub fn skipped(status: SmtpStatus, error: impl Into<String>) -> Self {
        Self {
            attempted: false,
            valid: None,
            status_code: status,
            raw_response: None,
            server_tried: None,
            error: Some(error.into()),
        }
    }
}

/// Counters kept by the SMTP prober.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeStats {
    /// Probes that consumed quota.
    pub probes_attempted: u64,
    /// Probes refused because the quota was exhausted.
    pub rate_limited: u64,
    /// Probes answered from the per-address result cache.
    pub cache_hits: u64,
    /// MX hosts skipped because they were already unreachable.
    pub unreachable_skips: u64,
    /// Remaining quota.
    pub quota_remaining: u64,
}
