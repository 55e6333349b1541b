//! Validation services
//!
//! Each stage of the pipeline lives in its own module; [`EmailValidator`] wires
//! them together.

pub mod disposable;
pub mod dns;
pub mod format;
pub mod pattern;
pub mod smtp;
mod validator;

pub use disposable::{DisposableDetector, DisposableListMetadata, DisposableListSource};
pub use dns::{compose_domain_check, CachedDnsChecker, DnsCheckFlags, HickoryDnsChecker};
pub use pattern::{PatternBulkStats, PatternCheck, PatternFilter, PatternRule};
pub use smtp::{MxSmtpProber, ProbeQuota};
pub use validator::{Capabilities, EmailValidator, EmailValidatorBuilder};
