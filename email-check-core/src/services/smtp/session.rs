//! One SMTP dialogue over an established stream.

use std::time::Duration;

use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::time::timeout;

use super::reply::{read_reply, SmtpReply};
use crate::error::SmtpError;

/// Round trips in the longest dialogue: greeting, EHLO, HELO, MAIL FROM, RCPT TO.
const DIALOGUE_STEPS: u32 = 5;

/// Envelope used for the RCPT check.
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    pub helo_name: &'a str,
    pub from_email: &'a str,
    pub recipient: &'a str,
}

struct SmtpSession<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    limit: Duration,
}

impl<S: AsyncRead + AsyncWrite> SmtpSession<S> {
    fn new(stream: S, limit: Duration) -> Self {
        let (reader, writer) = split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
            limit,
        }
    }

    async fn send(&mut self, line: &str, stage: &'static str) -> Result<(), SmtpError> {
        if line.contains(['\r', '\n']) {
            return Err(SmtpError::UnsafeCommand(line.to_string()));
        }
        let wire = format!("{line}\r\n");
        timeout(self.limit, async {
            self.writer.write_all(wire.as_bytes()).await?;
            self.writer.flush().await
        })
        .await
        .map_err(|_| SmtpError::Timeout(stage))??;
        Ok(())
    }

    async fn command(&mut self, line: &str, stage: &'static str) -> Result<SmtpReply, SmtpError> {
        self.send(line, stage).await?;
        read_reply(&mut self.reader, self.limit, stage).await
    }

    async fn expect_positive(
        &mut self,
        line: &str,
        stage: &'static str,
    ) -> Result<SmtpReply, SmtpError> {
        let reply = self.command(line, stage).await?;
        if reply.is_positive() {
            Ok(reply)
        } else {
            Err(SmtpError::Rejected {
                stage,
                reply: reply.raw(),
            })
        }
    }

    /// Greeting, EHLO (or HELO), MAIL FROM, then RCPT TO. Returns the RCPT reply.
    async fn check_recipient(&mut self, envelope: &Envelope<'_>) -> Result<SmtpReply, SmtpError> {
        let greeting = read_reply(&mut self.reader, self.limit, "greeting").await?;
        if !greeting.is_positive() {
            return Err(SmtpError::Rejected {
                stage: "greeting",
                reply: greeting.raw(),
            });
        }

        let ehlo = self
            .command(&format!("EHLO {}", envelope.helo_name), "EHLO")
            .await?;
        if !ehlo.is_positive() {
            log::debug!("EHLO refused ({}), retrying with HELO", ehlo.raw());
            self.expect_positive(&format!("HELO {}", envelope.helo_name), "HELO")
                .await?;
        }

        self.expect_positive(&format!("MAIL FROM:<{}>", envelope.from_email), "MAIL FROM")
            .await?;
        self.command(&format!("RCPT TO:<{}>", envelope.recipient), "RCPT TO")
            .await
    }

    /// Best effort; the server may already be gone. Bounded by one `limit`.
    async fn quit(mut self) {
        let limit = self.limit;
        let _ = timeout(limit, async {
            if self.send("QUIT", "QUIT").await.is_ok() {
                let _ = read_reply(&mut self.reader, limit, "QUIT").await;
            }
            let _ = self.writer.shutdown().await;
        })
        .await;
    }
}

/// Run the RCPT check for `envelope` over `stream`.
///
/// `limit` bounds every read and write; the whole dialogue up to the RCPT reply
/// is bounded by `limit` once per round trip. `QUIT` is attempted whatever the
/// outcome, and the stream is dropped on return.
pub async fn probe_recipient<S>(
    stream: S,
    envelope: &Envelope<'_>,
    limit: Duration,
) -> Result<SmtpReply, SmtpError>
where
    S: AsyncRead + AsyncWrite,
{
    let mut session = SmtpSession::new(stream, limit);
    let deadline = limit.saturating_mul(DIALOGUE_STEPS);
    let outcome = timeout(deadline, session.check_recipient(envelope))
        .await
        .unwrap_or(Err(SmtpError::Timeout("dialogue")));
    session.quit().await;
    outcome
}
