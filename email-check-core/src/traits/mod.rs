//! Collaborator traits
//!
//! The engine talks to the network and to storage only through these traits, so
//! each capability can be swapped (or mocked) independently.

mod cache_store;
mod dns_checker;
mod email_source;
mod smtp_prober;

pub use cache_store::ExternalCacheStore;
pub use dns_checker::DnsChecker;
pub use email_source::{EmailSource, StaticEmailSource};
pub use smtp_prober::SmtpProber;
