//! Outbound reply composition.
//!
//! Builds the outbound payload (plain text + HTML alternative + threading
//! header) from the agent's output, or decides to suppress it when the
//! agent declined to reply.

use serde::Serialize;

use crate::inbound::InboundEmail;

/// Reserved agent output meaning "do not send a reply". Exact match after
/// trimming — not a substring check.
pub const NO_REPLY_SENTINEL: &str = "NO_REPLY";

/// Fixed acknowledgment sent after a successful session reset.
pub const RESET_ACK_TEXT: &str = "Session has been reset.";

/// Subject prefix for replies.
const REPLY_PREFIX: &str = "Re:";

/// A composed outbound reply, ready for the mail sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundReply {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    /// Original message id for the In-Reply-To threading header.
    pub in_reply_to: Option<String>,
}

/// Compose a reply to `original` from the agent's output.
///
/// Returns `None` (suppressed) when the trimmed text is empty or exactly
/// the no-reply sentinel. Otherwise the plain body keeps the agent's
/// newlines verbatim with the signature appended, and the HTML body maps
/// each literal newline to exactly one `<br>`.
pub fn compose(
    original: &InboundEmail,
    reply_text: &str,
    signature: Option<&str>,
) -> Option<OutboundReply> {
    let trimmed = reply_text.trim();
    if trimmed.is_empty() || trimmed == NO_REPLY_SENTINEL {
        return None;
    }
    Some(build_reply(original, reply_text, signature))
}

/// Compose the fixed reset acknowledgment. Never suppressed.
pub fn compose_reset_ack(original: &InboundEmail, signature: Option<&str>) -> OutboundReply {
    build_reply(original, RESET_ACK_TEXT, signature)
}

fn build_reply(
    original: &InboundEmail,
    text: &str,
    signature: Option<&str>,
) -> OutboundReply {
    let plain = match signature {
        Some(sig) => format!("{text}\n\n{sig}"),
        None => text.to_string(),
    };

    let mut html = format!("<p>{}</p>", text.replace('\n', "<br>"));
    if let Some(sig) = signature {
        html.push_str(&format!("<p>{sig}</p>"));
    }

    OutboundReply {
        to: original.sender.address.clone(),
        subject: reply_subject(&original.subject),
        text: plain,
        html,
        in_reply_to: original.message_id.clone(),
    }
}

/// Prefix the subject with `Re:` unless it already is.
fn reply_subject(subject: &str) -> String {
    if subject.starts_with(REPLY_PREFIX) {
        subject.to_string()
    } else {
        format!("{REPLY_PREFIX} {subject}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::Sender;
    use chrono::Utc;

    fn original() -> InboundEmail {
        InboundEmail {
            message_id: Some("<msg-1@mail.example>".into()),
            in_reply_to: None,
            sender: Sender {
                address: "alice@example.com".into(),
                name: "Alice".into(),
            },
            subject: "Weekend plans".into(),
            text: Some("Are you free Saturday?".into()),
            preview: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn empty_reply_is_suppressed() {
        assert!(compose(&original(), "", None).is_none());
        assert!(compose(&original(), "   \n\t ", None).is_none());
    }

    #[test]
    fn sentinel_is_suppressed_after_trim() {
        assert!(compose(&original(), "NO_REPLY", None).is_none());
        assert!(compose(&original(), "  NO_REPLY\n", None).is_none());
    }

    #[test]
    fn sentinel_substring_is_not_suppressed() {
        // Exact match only — content mentioning the token still goes out.
        let reply = compose(&original(), "I would say NO_REPLY here", None).unwrap();
        assert!(reply.text.contains("NO_REPLY"));
    }

    #[test]
    fn subject_gets_reply_prefix_once() {
        let reply = compose(&original(), "Sure!", None).unwrap();
        assert_eq!(reply.subject, "Re: Weekend plans");

        let mut threaded = original();
        threaded.subject = "Re: Weekend plans".into();
        let reply = compose(&threaded, "Sure!", None).unwrap();
        assert_eq!(reply.subject, "Re: Weekend plans");
    }

    #[test]
    fn html_maps_each_newline_to_one_break() {
        let reply = compose(&original(), "line one\nline two\nline three", None).unwrap();
        assert_eq!(reply.html, "<p>line one<br>line two<br>line three</p>");
        assert_eq!(reply.html.matches("<br>").count(), 2);
        // Plain body keeps the newlines verbatim.
        assert_eq!(reply.text, "line one\nline two\nline three");
    }

    #[test]
    fn signature_appended_to_both_bodies() {
        let reply = compose(&original(), "Sure!", Some("— Bridge")).unwrap();
        assert_eq!(reply.text, "Sure!\n\n— Bridge");
        assert_eq!(reply.html, "<p>Sure!</p><p>— Bridge</p>");
    }

    #[test]
    fn threading_uses_original_message_id() {
        let reply = compose(&original(), "Sure!", None).unwrap();
        assert_eq!(reply.in_reply_to.as_deref(), Some("<msg-1@mail.example>"));

        let mut no_id = original();
        no_id.message_id = None;
        let reply = compose(&no_id, "Sure!", None).unwrap();
        assert!(reply.in_reply_to.is_none());
    }

    #[test]
    fn reply_goes_to_original_sender() {
        let reply = compose(&original(), "Sure!", None).unwrap();
        assert_eq!(reply.to, "alice@example.com");
    }

    #[test]
    fn reset_ack_is_never_suppressed() {
        let ack = compose_reset_ack(&original(), None);
        assert_eq!(ack.text, RESET_ACK_TEXT);
        assert_eq!(ack.subject, "Re: Weekend plans");
        assert_eq!(ack.in_reply_to.as_deref(), Some("<msg-1@mail.example>"));
    }
}
