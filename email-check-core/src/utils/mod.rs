//! Address and domain helpers.

/// Domain part of `email`, if it has a non-empty one.
pub fn domain_of(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

/// Normalize a domain for lookups and cache keys.
///
/// Trims whitespace and a trailing dot, lowercases, and converts
/// internationalised labels to ASCII (punycode). IP literals pass through. When
/// IDNA conversion fails the lowercased input is returned, so the caller's
/// lookup simply finds nothing.
pub fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('.');
    if domain.parse::<std::net::IpAddr>().is_ok() {
        return domain.to_string();
    }
    match idna::domain_to_ascii(domain) {
        Ok(ascii) => ascii,
        Err(_) => {
            log::debug!("IDNA conversion failed for {domain}");
            domain.to_lowercase()
        }
    }
}
