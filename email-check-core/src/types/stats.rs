//! Batch statistics and cache telemetry

use serde::{Deserialize, Serialize};

use super::verdict::{RejectionKind, ValidationVerdict};

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part` as a percentage of `whole`, rounded to two decimals.
#[allow(clippy::cast_precision_loss)] // batch sizes stay far below 2^52
pub(crate) fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

/// Aggregate counts over a list of verdicts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total: usize,
    pub valid: usize,
    pub domain_valid: usize,
    pub invalid: usize,
    pub disposable: usize,
    pub format_errors: usize,
    pub dns_errors: usize,
    pub smtp_errors: usize,
    pub advanced_errors: usize,
    pub valid_percentage: f64,
    pub domain_valid_percentage: f64,
    pub invalid_percentage: f64,
}

impl BatchStats {
    /// Bucket every invalid verdict once, by precedence format > SMTP > advanced > DNS.
    pub fn from_verdicts(verdicts: &[ValidationVerdict]) -> Self {
        let mut stats = Self {
            total: verdicts.len(),
            ..Self::default()
        };
        for verdict in verdicts {
            if verdict.domain_valid {
                stats.domain_valid += 1;
            }
            if verdict.is_disposable {
                stats.disposable += 1;
            }
            if verdict.is_valid {
                stats.valid += 1;
                continue;
            }
            stats.invalid += 1;
            match verdict.rejection {
                Some(RejectionKind::Format) => stats.format_errors += 1,
                Some(RejectionKind::Smtp) => stats.smtp_errors += 1,
                Some(RejectionKind::Disposable | RejectionKind::Internal) => {
                    stats.advanced_errors += 1;
                }
                Some(RejectionKind::Dns) | None => stats.dns_errors += 1,
            }
        }
        stats.valid_percentage = percentage(stats.valid, stats.total);
        stats.domain_valid_percentage = percentage(stats.domain_valid, stats.total);
        stats.invalid_percentage = percentage(stats.invalid, stats.total);
        stats
    }
}

/// Hit/miss counters of the DNS cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheTelemetry {
    pub hits: u64,
    pub misses: u64,
    /// Backend failures that fell through to direct resolution.
    pub errors: u64,
    pub total_requests: u64,
    /// Hits as a percentage of hits + misses.
    pub hit_rate: f64,
    pub cache_driver: String,
    /// TTL in seconds.
    pub cache_ttl: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(valid: bool, domain_valid: bool, kind: Option<RejectionKind>) -> ValidationVerdict {
        let mut v = ValidationVerdict::new("x@example.com");
        v.is_valid = valid;
        v.domain_valid = domain_valid;
        v.rejection = kind;
        v
    }

    #[test]
    fn test_buckets_and_percentages() {
        let verdicts = vec![
            verdict(true, true, None),
            verdict(false, false, Some(RejectionKind::Format)),
            verdict(false, true, Some(RejectionKind::Smtp)),
            verdict(false, false, Some(RejectionKind::Dns)),
            verdict(false, false, Some(RejectionKind::Internal)),
            verdict(false, false, None),
        ];
        let stats = BatchStats::from_verdicts(&verdicts);

        assert_eq!(stats.total, 6);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.invalid, 5);
        assert_eq!(stats.domain_valid, 2);
        assert_eq!(stats.format_errors, 1);
        assert_eq!(stats.smtp_errors, 1);
        assert_eq!(stats.advanced_errors, 1);
        assert_eq!(stats.dns_errors, 2);
        assert!((stats.valid_percentage - 16.67).abs() < f64::EPSILON);
        assert!((stats.invalid_percentage - 83.33).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_batch() {
        let stats = BatchStats::from_verdicts(&[]);
        assert_eq!(stats.total, 0);
        assert!(stats.valid_percentage.abs() < f64::EPSILON);
    }
}
