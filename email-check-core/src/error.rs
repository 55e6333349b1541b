//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Engine error type
///
/// Per-address outcomes never surface as errors; they are carried by
/// [`ValidationVerdict`](crate::types::ValidationVerdict). These variants cover
/// configuration, caching and data-source plumbing.
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CheckError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Cache backend failure
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Email source failure
    #[error("Source error: {0}")]
    SourceError(String),

    /// serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Filesystem error
    #[error("IO error: {0}")]
    IoError(String),
}

impl CheckError {
    /// Whether the error stems from caller input rather than an internal fault.
    ///
    /// Level `warn` should be used when returning `true` and level `error` otherwise.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::ValidationError(_) | Self::ConfigError(_))
    }
}

impl From<serde_json::Error> for CheckError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for CheckError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

/// Engine Result type alias
pub type CheckResult<T> = std::result::Result<T, CheckError>;

/// A DNS query that could not be answered.
///
/// "No records" and NXDOMAIN are not errors; they come back as empty answers.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum DnsLookupError {
    /// The query did not complete in time.
    #[error("DNS query for {0} timed out")]
    Timeout(String),

    /// Resolver failure (network, SERVFAIL, malformed answer).
    #[error("DNS query failed: {0}")]
    Resolve(String),
}

/// DNS lookup Result type alias
pub type DnsResult<T> = std::result::Result<T, DnsLookupError>;

/// Failure of an SMTP dialogue before the RCPT TO reply was obtained.
#[derive(Error, Debug)]
pub enum SmtpError {
    /// A connect or read exceeded the SMTP timeout.
    #[error("SMTP timeout during {0}")]
    Timeout(&'static str),

    /// Socket failure.
    #[error("SMTP IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the connection mid-dialogue.
    #[error("SMTP connection closed by server")]
    ConnectionClosed,

    /// A reply line without a three digit code.
    #[error("Malformed SMTP reply: {0}")]
    MalformedReply(String),

    /// A command line that would carry a line break onto the wire.
    #[error("Refusing to send SMTP command containing a line break: {0:?}")]
    UnsafeCommand(String),

    /// The server refused a handshake step.
    #[error("SMTP {stage} rejected: {reply}")]
    Rejected { stage: &'static str, reply: String },
}

impl SmtpError {
    /// Whether the failure happened at the transport level rather than as a reply.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Io(_) | Self::ConnectionClosed)
    }
}
