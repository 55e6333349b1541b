//! Validation verdict types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dns::DomainCheckResult;
use super::smtp::SmtpProbeResult;

/// Outcome of the pattern filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    /// No rule matched.
    #[default]
    Passed,
    /// A rejection rule matched.
    Rejected,
    /// Only strict rules matched.
    Warning,
}

impl fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Rejected => write!(f, "rejected"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// Which stage made a verdict invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Pattern filter or format gate.
    Format,
    /// Disposable domain in strict mode.
    Disposable,
    /// No usable MX (or A) records.
    Dns,
    /// The mail server rejected the mailbox.
    Smtp,
    /// The validation task itself failed (timeout, panic).
    Internal,
}

/// Final decision for one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub email: String,
    pub is_valid: bool,
    pub domain_valid: bool,
    pub is_disposable: bool,
    pub pattern_status: PatternStatus,
    pub smtp: SmtpProbeResult,
    pub dns: Option<DomainCheckResult>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Stage responsible for an invalid verdict.
    pub rejection: Option<RejectionKind>,
    pub timestamp: DateTime<Utc>,
}

impl ValidationVerdict {
    /// A fresh, not-yet-valid verdict for `email`.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_valid: false,
            domain_valid: false,
            is_disposable: false,
            pattern_status: PatternStatus::Passed,
            smtp: SmtpProbeResult::default(),
            dns: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            rejection: None,
            timestamp: Utc::now(),
        }
    }

    /// Mark the verdict invalid with `error` attributed to `kind`.
    pub fn reject(&mut self, kind: RejectionKind, error: impl Into<String>) {
        self.is_valid = false;
        self.rejection.get_or_insert(kind);
        self.errors.push(error.into());
    }

    /// Verdict for an address whose validation task did not complete.
    pub fn task_failure(email: impl Into<String>, reason: &str) -> Self {
        let mut verdict = Self::new(email);
        verdict.reject(
            RejectionKind::Internal,
            format!("Validation task failed: {reason}"),
        );
        verdict
    }

    /// Enforce `is_valid ⇒ domain_valid` and the rejection invariant.
    pub(crate) fn finalize(mut self) -> Self {
        if self.rejection.is_some() || !self.domain_valid {
            self.is_valid = false;
        }
        self
    }
}

/// One row handed out by an [`EmailSource`](crate::traits::EmailSource).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    pub email: String,
}

impl EmailRecord {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}
