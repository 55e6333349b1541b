//! Shared fixtures: a static DNS table and a scripted SMTP server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use email_check_core::services::{compose_domain_check, DnsCheckFlags};
use email_check_core::traits::DnsChecker;
use email_check_core::types::{DomainCheckResult, MxHost};
use email_check_core::{DnsResult, EngineConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Assert that a `Result` is `Ok` and unwrap it (fails the test otherwise).
#[macro_export]
macro_rules! require_ok {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_ok(), "expected Ok(..), got {res:?}");
        let Ok(val) = res else {
            return;
        };
        val
    }};
}

/// Answers MX queries from a fixed table; every domain has SPF and DMARC.
#[derive(Default)]
pub struct StaticDns {
    mx: HashMap<String, Vec<MxHost>>,
}

impl StaticDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mx(mut self, domain: &str, host: &str, priority: u16) -> Self {
        self.mx
            .entry(domain.to_string())
            .or_default()
            .push(MxHost::new(host, priority));
        self
    }
}

#[async_trait]
impl DnsChecker for StaticDns {
    async fn check_domain(&self, domain: &str) -> DomainCheckResult {
        compose_domain_check(self, domain, DnsCheckFlags::default()).await
    }

    async fn mx_hosts(&self, domain: &str) -> DnsResult<Vec<MxHost>> {
        Ok(self.mx.get(domain).cloned().unwrap_or_default())
    }

    async fn has_a_record(&self, _domain: &str) -> DnsResult<bool> {
        Ok(false)
    }

    async fn has_spf_record(&self, domain: &str) -> DnsResult<bool> {
        Ok(self.mx.contains_key(domain))
    }

    async fn has_dmarc_record(&self, domain: &str) -> DnsResult<bool> {
        Ok(self.mx.contains_key(domain))
    }
}

/// Behaviour of the fake mail server.
#[derive(Debug, Clone)]
pub struct ServerScript {
    pub ehlo_supported: bool,
    /// Local parts that exist.
    pub mailboxes: Vec<&'static str>,
    /// Accept every recipient.
    pub catch_all: bool,
}

impl Default for ServerScript {
    fn default() -> Self {
        Self {
            ehlo_supported: true,
            mailboxes: vec!["alice", "bob", "carol", "dave"],
            catch_all: false,
        }
    }
}

/// Every command line the server received, across sessions.
pub type Transcript = Arc<Mutex<Vec<String>>>;

fn reply_to(script: &ServerScript, line: &str) -> String {
    let upper = line.to_ascii_uppercase();
    if upper.starts_with("EHLO") {
        if script.ehlo_supported {
            "250-fake.test\r\n250-SIZE 10240000\r\n250 8BITMIME\r\n".to_string()
        } else {
            "502 5.5.2 Error: command not recognized\r\n".to_string()
        }
    } else if upper.starts_with("HELO") {
        "250 fake.test\r\n".to_string()
    } else if upper.starts_with("MAIL FROM") {
        "250 2.1.0 Ok\r\n".to_string()
    } else if upper.starts_with("RCPT TO") {
        let address = line
            .split_once('<')
            .and_then(|(_, rest)| rest.split_once('>'))
            .map(|(address, _)| address)
            .unwrap_or_default();
        let local = address.split('@').next().unwrap_or_default();
        if script.catch_all || script.mailboxes.contains(&local) {
            "250 2.1.5 Ok\r\n".to_string()
        } else {
            format!(
                "550 5.1.1 <{address}>: Recipient address rejected: User unknown in virtual mailbox table\r\n"
            )
        }
    } else if upper.starts_with("QUIT") {
        "221 2.0.0 Bye\r\n".to_string()
    } else {
        "500 5.5.2 Error: bad syntax\r\n".to_string()
    }
}

/// Start a fake SMTP server on 127.0.0.1; returns its port and transcript.
pub async fn spawn_smtp_server(script: ServerScript) -> (u16, Transcript) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake SMTP server");
    let port = listener.local_addr().expect("local addr").port();
    let transcript: Transcript = Arc::default();
    let seen = Arc::clone(&transcript);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let script = script.clone();
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let (reader, mut writer) = stream.into_split();
                let mut reader = BufReader::new(reader);
                if writer.write_all(b"220 fake.test ESMTP\r\n").await.is_err() {
                    return;
                }
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    let line = line.trim_end().to_string();
                    let reply = reply_to(&script, &line);
                    let quit = line.eq_ignore_ascii_case("QUIT");
                    seen.lock().await.push(line);
                    if writer.write_all(reply.as_bytes()).await.is_err() || quit {
                        break;
                    }
                }
            });
        }
    });

    (port, transcript)
}

/// SMTP-enabled config aimed at `port`, without pacing.
pub fn smtp_config(port: u16) -> EngineConfig {
    EngineConfig {
        check_smtp: true,
        smtp_port: port,
        smtp_timeout: 2,
        smtp_rate_limit_delay: 0.0,
        pool_poll_interval_ms: 5,
        ..EngineConfig::default()
    }
}
