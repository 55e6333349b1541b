//! Email verification engine
//!
//! Decides whether an address is worth sending to, without sending anything:
//! a pattern filter, a structural format gate, disposable-domain detection,
//! cached DNS checks (MX, A, SPF, DMARC) and an optional SMTP `RCPT TO` probe.
//! Batches run through the bounded task pool in `email-check-pool`.
//!
//! ```rust,no_run
//! use email_check_core::{EmailValidator, EngineConfig};
//!
//! # async fn demo() {
//! let validator = EmailValidator::new(EngineConfig::from_env());
//! let verdict = validator.validate("someone@example.com").await;
//! println!("{}: valid={}", verdict.email, verdict.is_valid);
//! # }
//! ```

pub mod cache;
pub mod config;
mod error;
pub mod services;
pub mod traits;
pub mod types;
mod utils;

#[cfg(test)]
mod test_utils;

pub use config::{CacheDriver, EngineConfig, QuotaScope};
pub use error::{CheckError, CheckResult, DnsLookupError, DnsResult, SmtpError};
pub use services::{Capabilities, EmailValidator, EmailValidatorBuilder};
pub use utils::{domain_of, normalize_domain};
