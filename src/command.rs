//! Control-command classification for inbound messages.
//!
//! The subject line — not the body — is the sole control channel, so a
//! command can never be confused with conversational content.

use crate::inbound::InboundEmail;

/// Subject token that resets the sender's session. Case-sensitive.
pub const RESET_TOKEN: &str = "NEW";

/// What to do with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reset the sender's session, then acknowledge.
    Reset,
    /// Forward the message body to the agent.
    Forward,
}

/// Classify an inbound message. Reset iff the trimmed subject is exactly
/// the reset token; everything else is a forward.
pub fn classify(email: &InboundEmail) -> Command {
    if email.subject.trim() == RESET_TOKEN {
        Command::Reset
    } else {
        Command::Forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::Sender;
    use chrono::Utc;

    fn email_with_subject(subject: &str) -> InboundEmail {
        InboundEmail {
            message_id: Some("m1".into()),
            in_reply_to: None,
            sender: Sender {
                address: "a@b.c".into(),
                name: "A".into(),
            },
            subject: subject.into(),
            text: Some("body".into()),
            preview: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn exact_token_is_reset() {
        assert_eq!(classify(&email_with_subject("NEW")), Command::Reset);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(classify(&email_with_subject("  NEW \t")), Command::Reset);
    }

    #[test]
    fn token_is_case_sensitive() {
        assert_eq!(classify(&email_with_subject("new")), Command::Forward);
        assert_eq!(classify(&email_with_subject("New")), Command::Forward);
    }

    #[test]
    fn token_inside_subject_is_forward() {
        assert_eq!(classify(&email_with_subject("NEW stuff")), Command::Forward);
        assert_eq!(classify(&email_with_subject("Re: NEW")), Command::Forward);
    }

    #[test]
    fn ordinary_subject_is_forward() {
        assert_eq!(classify(&email_with_subject("Hello")), Command::Forward);
        assert_eq!(classify(&email_with_subject("")), Command::Forward);
    }
}
