//! Structural sanity check applied after the pattern filter.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum address length (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_LOCAL_LENGTH: usize = 64;
pub const MAX_DOMAIN_LENGTH: usize = 253;

static TLD_RE: LazyLock<Option<Regex>> = LazyLock::new(|| match Regex::new(r"\.[a-zA-Z]{2,}$") {
    Ok(re) => Some(re),
    Err(e) => {
        log::error!("TLD pattern failed to compile: {e}");
        None
    }
});

/// Whether `email` has a plausible `local@domain.tld` shape.
pub fn is_well_formed(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
        return false;
    }
    if email.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return false;
    }
    if email.contains(['<', '>']) || email.contains("..") {
        return false;
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || local.len() > MAX_LOCAL_LENGTH {
        return false;
    }
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LENGTH {
        return false;
    }
    TLD_RE.as_ref().is_some_and(|re| re.is_match(domain))
}
