//! SMTP mailbox probing: reply parsing, the dialogue, quota and the MX walker.

mod prober;
mod quota;
mod reply;
mod session;

pub use prober::MxSmtpProber;
pub use quota::ProbeQuota;
pub use reply::{classify_rcpt_reply, SmtpReply};
pub use session::{probe_recipient, Envelope};
