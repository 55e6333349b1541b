//! End-to-end validation against a local fake SMTP server.
//!
//! ```bash
//! cargo test -p email-check-core --test smtp_probe
//! ```

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{smtp_config, spawn_smtp_server, ServerScript, StaticDns};
use email_check_core::services::ProbeQuota;
use email_check_core::types::{RejectionKind, SmtpStatus};
use email_check_core::{EmailValidator, EngineConfig};

fn validator(config: EngineConfig, dns: StaticDns) -> EmailValidator {
    EmailValidator::builder(config)
        .dns_checker(Arc::new(dns))
        .build()
}

#[tokio::test]
async fn test_existing_and_unknown_mailboxes() {
    let (port, transcript) = spawn_smtp_server(ServerScript::default()).await;
    let dns = StaticDns::new().with_mx("example.com", "127.0.0.1", 10);
    let validator = validator(smtp_config(port), dns);

    let alice = validator.validate("alice@example.com").await;
    assert!(alice.is_valid, "{alice:?}");
    assert_eq!(alice.smtp.status_code, SmtpStatus::Success);
    assert_eq!(alice.smtp.server_tried.as_deref(), Some("127.0.0.1"));

    let ghost = validator.validate("ghost@example.com").await;
    assert!(!ghost.is_valid);
    assert!(ghost.domain_valid);
    assert_eq!(ghost.rejection, Some(RejectionKind::Smtp));
    assert!(ghost.errors[0].starts_with("SMTP validation failed: 550 5.1.1"));

    let seen = transcript.lock().await.clone();
    assert!(seen.contains(&"EHLO localhost".to_string()));
    assert!(seen.contains(&"MAIL FROM:<test@example.com>".to_string()));
    assert!(seen.contains(&"RCPT TO:<ghost@example.com>".to_string()));
    assert_eq!(seen.iter().filter(|line| *line == "QUIT").count(), 2);
}

#[tokio::test]
async fn test_helo_fallback() {
    let script = ServerScript {
        ehlo_supported: false,
        ..ServerScript::default()
    };
    let (port, transcript) = spawn_smtp_server(script).await;
    let dns = StaticDns::new().with_mx("old.example", "127.0.0.1", 10);
    let validator = validator(smtp_config(port), dns);

    let verdict = validator.validate("bob@old.example").await;
    assert!(verdict.is_valid);
    assert_eq!(verdict.smtp.status_code, SmtpStatus::Success);
    assert!(transcript
        .lock()
        .await
        .contains(&"HELO localhost".to_string()));
}

#[tokio::test]
async fn test_catch_all_domain_is_flagged() {
    let script = ServerScript {
        catch_all: true,
        ..ServerScript::default()
    };
    let (port, _) = spawn_smtp_server(script).await;
    let dns = StaticDns::new().with_mx("accept-all.example", "127.0.0.1", 10);
    let config = EngineConfig {
        detect_catch_all: true,
        ..smtp_config(port)
    };
    let validator = validator(config, dns);

    let verdict = validator.validate("anyone@accept-all.example").await;
    assert!(verdict.is_valid);
    assert_eq!(verdict.smtp.status_code, SmtpStatus::CatchAll);
    assert!(verdict.warnings.iter().any(|w| w.contains("catch-all")));
}

#[tokio::test]
async fn test_strict_server_is_not_catch_all() {
    let (port, _) = spawn_smtp_server(ServerScript::default()).await;
    let dns = StaticDns::new().with_mx("example.com", "127.0.0.1", 10);
    let config = EngineConfig {
        detect_catch_all: true,
        ..smtp_config(port)
    };
    let validator = validator(config, dns);

    let verdict = validator.validate("carol@example.com").await;
    assert_eq!(verdict.smtp.status_code, SmtpStatus::Success);
    assert!(verdict.warnings.is_empty());
}

#[tokio::test]
async fn test_shared_quota_degrades_to_dns() {
    let (port, _) = spawn_smtp_server(ServerScript::default()).await;
    let quota = Arc::new(ProbeQuota::new(1, Duration::ZERO));
    let first = EmailValidator::builder(smtp_config(port))
        .dns_checker(Arc::new(
            StaticDns::new().with_mx("example.com", "127.0.0.1", 10),
        ))
        .probe_quota(Arc::clone(&quota))
        .build();
    let second = EmailValidator::builder(smtp_config(port))
        .dns_checker(Arc::new(
            StaticDns::new().with_mx("example.com", "127.0.0.1", 10),
        ))
        .probe_quota(Arc::clone(&quota))
        .build();

    let probed = first.validate("alice@example.com").await;
    assert_eq!(probed.smtp.status_code, SmtpStatus::Success);

    // Unknown mailbox, but the budget is gone: the DNS result stands.
    let skipped = second.validate("ghost@example.com").await;
    assert!(skipped.is_valid);
    assert_eq!(skipped.smtp.status_code, SmtpStatus::RateLimited);
    assert!(!skipped.smtp.attempted);
    assert_eq!(quota.remaining(), 0);

    let stats = require_ok!(second.smtp_stats().await.ok_or("smtp disabled"));
    assert_eq!(stats.rate_limited, 1);
}

#[tokio::test]
async fn test_unreachable_mx_falls_back_to_dns() {
    let (port, _) = spawn_smtp_server(ServerScript::default()).await;
    let dns = StaticDns::new().with_mx("dark.example", "127.0.0.2", 10);
    let validator = validator(smtp_config(port), dns);

    let verdict = validator.validate("alice@dark.example").await;
    assert!(verdict.is_valid);
    assert_eq!(verdict.smtp.status_code, SmtpStatus::ConnectionFailure);
    assert!(verdict
        .warnings
        .contains(&"SMTP connection failed, using DNS result".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_through_pool() {
    let (port, _) = spawn_smtp_server(ServerScript::default()).await;
    let dns = StaticDns::new().with_mx("example.com", "127.0.0.1", 10);
    let config = EngineConfig {
        max_concurrent: 3,
        smtp_max_connections: 2,
        ..smtp_config(port)
    };
    let validator = validator(config, dns);
    let emails = [
        "alice@example.com",
        "ghost@example.com",
        "bob@example.com",
        "not-an-email",
        "carol@example.com",
        "nobody@example.com",
    ];

    let verdicts = validator.validate_batch(&emails).await;
    let order: Vec<&str> = verdicts.iter().map(|v| v.email.as_str()).collect();
    assert_eq!(order, emails);
    let valid: Vec<bool> = verdicts.iter().map(|v| v.is_valid).collect();
    assert_eq!(valid, vec![true, false, true, false, true, false]);

    let stats = EmailValidator::stats(&verdicts);
    assert_eq!(stats.smtp_errors, 2);
    assert_eq!(stats.format_errors, 1);

    let probe_stats = require_ok!(validator.smtp_stats().await.ok_or("smtp disabled"));
    assert_eq!(probe_stats.probes_attempted, 5);
    assert!(validator.dns_cache_telemetry().hits >= 4);
}
