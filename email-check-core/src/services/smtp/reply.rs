//! SMTP reply parsing and RCPT classification.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::time::timeout;

use crate::error::SmtpError;
use crate::types::SmtpStatus;

/// Longest reply line accepted, CRLF included (RFC 5321 4.5.3.1.5).
pub const MAX_REPLY_LINE: usize = 512;

/// Most lines accepted in one multi-line reply.
pub const MAX_REPLY_LINES: usize = 64;

/// Phrases servers use when a 550 means "this mailbox does not exist".
const UNKNOWN_USER_MARKERS: &[&str] = &[
    "nosuchuser",
    "does not exist",
    "user unknown",
    "invalid recipient",
    "no such user",
    "recipient not found",
    "invalid mailbox",
];

/// A complete (possibly multi-line) server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    /// Text of each line with the code and separator stripped.
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Reply as it appeared on the wire, lines joined by a space.
    pub fn raw(&self) -> String {
        let text = self.lines.join(" ");
        if text.is_empty() {
            self.code.to_string()
        } else {
            format!("{} {text}", self.code)
        }
    }
}

/// Split one reply line into its code, whether it is the last line, and its text.
fn parse_line(line: &str) -> Result<(u16, bool, &str), SmtpError> {
    let code = line
        .get(..3)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse::<u16>().ok())
        .ok_or_else(|| SmtpError::MalformedReply(line.to_string()))?;
    // "250-..." continues; "250 ..." or a bare "250" ends the reply.
    let last = line.as_bytes().get(3) != Some(&b'-');
    let text = line.get(4..).unwrap_or_default().trim();
    Ok((code, last, text))
}

/// Read one full reply, each line bounded by `limit`.
///
/// Lines longer than [`MAX_REPLY_LINE`] octets and replies with more than
/// [`MAX_REPLY_LINES`] lines are malformed.
pub async fn read_reply<R>(
    reader: &mut R,
    limit: Duration,
    stage: &'static str,
) -> Result<SmtpReply, SmtpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let mut buf = String::new();
        let mut bounded = (&mut *reader).take(MAX_REPLY_LINE as u64);
        let read = timeout(limit, bounded.read_line(&mut buf))
            .await
            .map_err(|_| SmtpError::Timeout(stage))??;
        if read == 0 {
            return Err(SmtpError::ConnectionClosed);
        }
        if !buf.ends_with('\n') {
            if read >= MAX_REPLY_LINE {
                return Err(SmtpError::MalformedReply(format!(
                    "reply line longer than {MAX_REPLY_LINE} octets"
                )));
            }
            return Err(SmtpError::ConnectionClosed);
        }
        let line = buf.trim_end_matches(['\r', '\n']);
        let (code, last, text) = parse_line(line)?;
        lines.push(text.to_string());
        if last {
            return Ok(SmtpReply { code, lines });
        }
        if lines.len() >= MAX_REPLY_LINES {
            return Err(SmtpError::MalformedReply(format!(
                "reply longer than {MAX_REPLY_LINES} lines"
            )));
        }
    }
}

/// Map a RCPT TO reply onto a probe status.
pub fn classify_rcpt_reply(reply: &SmtpReply) -> SmtpStatus {
    match reply.code {
        200..=299 => SmtpStatus::Success,
        550 => {
            let text = reply.lines.join(" ").to_ascii_lowercase();
            if UNKNOWN_USER_MARKERS.iter().any(|marker| text.contains(marker)) {
                SmtpStatus::MailboxNotFound
            } else {
                SmtpStatus::ServerError
            }
        }
        400..=599 => SmtpStatus::ServerError,
        _ => SmtpStatus::Unknown,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn reply(code: u16, text: &str) -> SmtpReply {
        SmtpReply {
            code,
            lines: vec![text.to_string()],
        }
    }

    #[tokio::test]
    async fn test_reads_multiline_reply() {
        let wire = b"250-mx.example.com Hello\r\n250-SIZE 1000\r\n250 HELP\r\n".as_slice();
        let mut reader = BufReader::new(wire);
        let reply = read_reply(&mut reader, Duration::from_secs(1), "EHLO")
            .await
            .unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(reply.lines, vec!["mx.example.com Hello", "SIZE 1000", "HELP"]);
    }

    #[tokio::test]
    async fn test_bare_code_ends_reply() {
        let mut reader = BufReader::new(b"354\r\n".as_slice());
        let reply = read_reply(&mut reader, Duration::from_secs(1), "DATA")
            .await
            .unwrap();
        assert_eq!(reply.raw(), "354");
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let mut reader = BufReader::new(b"250-first\r\n".as_slice());
        let err = read_reply(&mut reader, Duration::from_secs(1), "EHLO")
            .await
            .unwrap_err();
        assert!(matches!(err, SmtpError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_garbage_is_malformed() {
        let mut reader = BufReader::new(b"hello there\r\n".as_slice());
        let err = read_reply(&mut reader, Duration::from_secs(1), "greeting")
            .await
            .unwrap_err();
        assert!(matches!(err, SmtpError::MalformedReply(_)));
    }

    #[tokio::test]
    async fn test_overlong_line_is_malformed() {
        let wire = format!("250 {}\r\n", "x".repeat(MAX_REPLY_LINE));
        let mut reader = BufReader::new(wire.as_bytes());
        let err = read_reply(&mut reader, Duration::from_secs(1), "EHLO")
            .await
            .unwrap_err();
        assert!(matches!(err, SmtpError::MalformedReply(_)));
    }

    #[tokio::test]
    async fn test_endless_continuation_is_malformed() {
        let wire = "250-more\r\n".repeat(MAX_REPLY_LINES + 10);
        let mut reader = BufReader::new(wire.as_bytes());
        let err = read_reply(&mut reader, Duration::from_secs(1), "EHLO")
            .await
            .unwrap_err();
        assert!(matches!(err, SmtpError::MalformedReply(ref m) if m.contains("lines")));
    }

    #[test]
    fn test_classify_rcpt() {
        assert_eq!(classify_rcpt_reply(&reply(250, "OK")), SmtpStatus::Success);
        assert_eq!(classify_rcpt_reply(&reply(252, "Cannot VRFY")), SmtpStatus::Success);
        assert_eq!(
            classify_rcpt_reply(&reply(550, "5.1.1 User Unknown")),
            SmtpStatus::MailboxNotFound
        );
        assert_eq!(
            classify_rcpt_reply(&reply(550, "5.1.1 <x@y>: NoSuchUser")),
            SmtpStatus::MailboxNotFound
        );
        assert_eq!(
            classify_rcpt_reply(&reply(550, "5.7.1 Relaying denied")),
            SmtpStatus::ServerError
        );
        assert_eq!(classify_rcpt_reply(&reply(451, "Try again later")), SmtpStatus::ServerError);
        assert_eq!(classify_rcpt_reply(&reply(553, "no such user")), SmtpStatus::ServerError);
        assert_eq!(classify_rcpt_reply(&reply(199, "?")), SmtpStatus::Unknown);
    }
}
