//! Regex-based fast rejection of malformed addresses.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CheckError, CheckResult};
use crate::types::PatternStatus;

/// How a rule inspects an address.
#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    /// Local part longer than N bytes.
    LocalLongerThan(usize),
    /// Domain part longer than N bytes.
    DomainLongerThan(usize),
    /// Whole address longer than N bytes.
    LongerThan(usize),
}

/// A named rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    matcher: Matcher,
    description: String,
}

impl PatternRule {
    /// Compile a regex rule.
    pub fn regex(pattern: &str, description: impl Into<String>) -> CheckResult<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| CheckError::ConfigError(format!("Invalid pattern {pattern:?}: {e}")))?;
        Ok(Self {
            matcher: Matcher::Regex(regex),
            description: description.into(),
        })
    }

    fn builtin(pattern: &str, description: &str) -> Option<Self> {
        match Self::regex(pattern, description) {
            Ok(rule) => Some(rule),
            Err(e) => {
                log::error!("Built-in pattern failed to compile: {e}");
                None
            }
        }
    }

    fn length(matcher: Matcher, description: &str) -> Self {
        Self {
            matcher,
            description: description.to_string(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn matches(&self, email: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(regex) => regex.is_match(email),
            Matcher::LocalLongerThan(max) => email
                .find('@')
                .is_some_and(|at| at > *max),
            Matcher::DomainLongerThan(max) => email
                .rfind('@')
                .is_some_and(|at| email.len() - at - 1 > *max),
            Matcher::LongerThan(max) => email.len() > *max,
        }
    }
}

/// Rejection rules, evaluated in order.
static INVALID_RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| {
    let mut rules: Vec<PatternRule> = [
        (r"^[^@]*$", "Missing @ symbol"),
        (r"@.*@", "Multiple @ symbols"),
        (r"\.{2,}", "Multiple consecutive dots"),
        (r"^\.|\.@|@\.|\.$", "Starts or ends with dot"),
        (r"^@|@$", "Starts or ends with @"),
        (r"\s", "Contains spaces"),
        (r#"[<>"\[\]\\]"#, "Contains invalid characters"),
        (r"@\d+$", "Domain with only numbers"),
        (r"@.*\.\d+$", "TLD with numbers"),
    ]
    .into_iter()
    .filter_map(|(pattern, description)| PatternRule::builtin(pattern, description))
    .collect();
    rules.push(PatternRule::length(
        Matcher::LocalLongerThan(64),
        "Local part too long (over 64 chars)",
    ));
    rules.push(PatternRule::length(
        Matcher::DomainLongerThan(253),
        "Domain part too long (over 253 chars)",
    ));
    rules.push(PatternRule::length(
        Matcher::LongerThan(254),
        "Email too long (over 254 chars)",
    ));
    rules
});

/// Rules that only warn, unless strict rejection is enabled.
static STRICT_RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| {
    [
        (r"^[^@]*[^a-zA-Z0-9._+\-@][^@]*@", "Invalid characters in local part"),
        (r"@.*[^a-zA-Z0-9.\-]", "Invalid characters in domain"),
        (r"@[^.]*$", "Domain without TLD"),
        (r"@.*\.[a-zA-Z0-9]$", "TLD too short"),
        (r"@.*\.\w{64,}$", "TLD too long"),
        (r"@.*\.[^.]*[^a-zA-Z.][^.]*$", "Invalid TLD characters"),
        (r"[._+\-]{2,}", "Consecutive special characters"),
        (r"^[._+\-]", "Starts with special character"),
        (r"[._+\-]@", "Ends with special character"),
    ]
    .into_iter()
    .filter_map(|(pattern, description)| PatternRule::builtin(pattern, description))
    .collect()
});

/// Result of checking one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternCheck {
    pub valid: bool,
    pub status: PatternStatus,
    /// Description of the rule that rejected the address.
    pub matched_rule: Option<String>,
    /// `Email matches invalid pattern: <description>`.
    pub reason: Option<String>,
    pub warnings: Vec<String>,
}

impl PatternCheck {
    fn passed(warnings: Vec<String>) -> Self {
        let status = if warnings.is_empty() {
            PatternStatus::Passed
        } else {
            PatternStatus::Warning
        };
        Self {
            valid: true,
            status,
            matched_rule: None,
            reason: None,
            warnings,
        }
    }

    fn rejected(description: &str, prefix: &str, warnings: Vec<String>) -> Self {
        Self {
            valid: false,
            status: PatternStatus::Rejected,
            matched_rule: Some(description.to_string()),
            reason: Some(format!("{prefix}: {description}")),
            warnings,
        }
    }
}

/// Counters of [`PatternFilter::check_bulk`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternBulkStats {
    pub total: usize,
    pub passed: usize,
    pub rejected: usize,
    pub warnings: usize,
}

/// Pattern filter
#[derive(Debug, Clone)]
pub struct PatternFilter {
    enabled: bool,
    strict_mode: bool,
    strict_reject: bool,
    custom_rules: Vec<PatternRule>,
}

impl Default for PatternFilter {
    fn default() -> Self {
        Self::new(true, false, false)
    }
}

impl PatternFilter {
    pub fn new(enabled: bool, strict_mode: bool, strict_reject: bool) -> Self {
        Self {
            enabled,
            strict_mode,
            strict_reject,
            custom_rules: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append a rejection rule evaluated after the built-in ones.
    pub fn add_custom_rule(&mut self, pattern: &str, description: &str) -> CheckResult<()> {
        self.custom_rules.push(PatternRule::regex(pattern, description)?);
        Ok(())
    }

    /// Check one address. Pure; no I/O.
    pub fn check(&self, email: &str) -> PatternCheck {
        if !self.enabled {
            return PatternCheck::passed(Vec::new());
        }

        if let Some(rule) = INVALID_RULES
            .iter()
            .chain(self.custom_rules.iter())
            .find(|rule| rule.matches(email))
        {
            return PatternCheck::rejected(
                rule.description(),
                "Email matches invalid pattern",
                Vec::new(),
            );
        }

        let mut warnings = Vec::new();
        if self.strict_mode {
            for rule in STRICT_RULES.iter().filter(|rule| rule.matches(email)) {
                if self.strict_reject {
                    return PatternCheck::rejected(
                        rule.description(),
                        "Email matches strict pattern",
                        warnings,
                    );
                }
                warnings.push(format!(
                    "Email matches strict pattern: {}",
                    rule.description()
                ));
            }
        }
        PatternCheck::passed(warnings)
    }

    /// Check many addresses, keeping input order.
    pub fn check_bulk<S: AsRef<str>>(&self, emails: &[S]) -> (Vec<PatternCheck>, PatternBulkStats) {
        let mut stats = PatternBulkStats {
            total: emails.len(),
            ..PatternBulkStats::default()
        };
        let results = emails
            .iter()
            .map(|email| {
                let check = self.check(email.as_ref());
                match check.status {
                    PatternStatus::Passed => stats.passed += 1,
                    PatternStatus::Rejected => stats.rejected += 1,
                    PatternStatus::Warning => {
                        stats.passed += 1;
                        stats.warnings += 1;
                    }
                }
                check
            })
            .collect();
        (results, stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rule_for(email: &str) -> Option<String> {
        PatternFilter::default().check(email).matched_rule
    }

    #[test]
    fn test_valid_address_passes() {
        let check = PatternFilter::default().check("john.doe+news@example.co.uk");
        assert!(check.valid);
        assert_eq!(check.status, PatternStatus::Passed);
        assert!(check.reason.is_none());
    }

    #[test]
    fn test_trailing_at_is_rejected() {
        let check = PatternFilter::default().check("test@");
        assert!(!check.valid);
        assert_eq!(check.status, PatternStatus::Rejected);
        assert_eq!(
            check.reason.as_deref(),
            Some("Email matches invalid pattern: Starts or ends with @")
        );
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(rule_for("plainaddress").as_deref(), Some("Missing @ symbol"));
        assert_eq!(rule_for("a@b@c.com").as_deref(), Some("Multiple @ symbols"));
        assert_eq!(rule_for("a..b@c.com").as_deref(), Some("Multiple consecutive dots"));
        assert_eq!(rule_for(".a@c.com").as_deref(), Some("Starts or ends with dot"));
        assert_eq!(rule_for("a.@c.com").as_deref(), Some("Starts or ends with dot"));
        assert_eq!(rule_for("@c.com").as_deref(), Some("Starts or ends with @"));
        assert_eq!(rule_for("a b@c.com").as_deref(), Some("Contains spaces"));
        assert_eq!(rule_for("a<b@c.com").as_deref(), Some("Contains invalid characters"));
        assert_eq!(rule_for("a@123").as_deref(), Some("Domain with only numbers"));
        assert_eq!(rule_for("a@c.123").as_deref(), Some("TLD with numbers"));
    }

    #[test]
    fn test_length_rules() {
        let long_local = format!("{}@example.com", "a".repeat(65));
        assert_eq!(
            rule_for(&long_local).as_deref(),
            Some("Local part too long (over 64 chars)")
        );
        let ok_local = format!("{}@example.com", "a".repeat(64));
        assert!(rule_for(&ok_local).is_none());

        let long_domain = format!("a@{}.com", "b".repeat(250));
        assert_eq!(
            rule_for(&long_domain).as_deref(),
            Some("Domain part too long (over 253 chars)")
        );
    }

    #[test]
    fn test_disabled_filter_passes_everything() {
        let filter = PatternFilter::new(false, true, true);
        assert!(filter.check("test@").valid);
    }

    #[test]
    fn test_strict_mode_warns() {
        let filter = PatternFilter::new(true, true, false);
        let check = filter.check("a_-b@localhost");
        assert!(check.valid);
        assert_eq!(check.status, PatternStatus::Warning);
        assert!(check
            .warnings
            .contains(&"Email matches strict pattern: Domain without TLD".to_string()));
        assert!(check
            .warnings
            .contains(&"Email matches strict pattern: Consecutive special characters".to_string()));
    }

    #[test]
    fn test_strict_reject() {
        let filter = PatternFilter::new(true, true, true);
        let check = filter.check("user@localhost");
        assert!(!check.valid);
        assert_eq!(check.matched_rule.as_deref(), Some("Domain without TLD"));
    }

    #[test]
    fn test_strict_mode_clean_address() {
        let filter = PatternFilter::new(true, true, false);
        let check = filter.check("user.name@example.com");
        assert_eq!(check.status, PatternStatus::Passed);
        assert!(check.warnings.is_empty());
    }

    #[test]
    fn test_custom_rule() {
        let mut filter = PatternFilter::default();
        filter.add_custom_rule(r"^noreply@", "No-reply mailbox").unwrap();
        let check = filter.check("noreply@example.com");
        assert_eq!(check.matched_rule.as_deref(), Some("No-reply mailbox"));

        assert!(matches!(
            filter.add_custom_rule("(", "broken"),
            Err(CheckError::ConfigError(_))
        ));
    }

    #[test]
    fn test_bulk_counts() {
        let filter = PatternFilter::new(true, true, false);
        let (results, stats) = filter.check_bulk(&["ok@example.com", "bad@", "x@localhost"]);
        assert_eq!(results.len(), 3);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.warnings, 1);
    }
}
