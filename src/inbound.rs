//! Inbound webhook payload types and sender-field extraction.
//!
//! The mail provider delivers a `message.received` event whose `from_`
//! field may be a bare string, a `"Name <addr>"` string, an object with
//! `email`/`address` + `name`, or an array of any of those. Extraction
//! normalizes all of them into a lowercased address plus display name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event type the bridge acts on; everything else is acknowledged unprocessed.
pub const EVENT_MESSAGE_RECEIVED: &str = "message.received";

/// Raw webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event_type: String,
    #[serde(default)]
    pub message: Option<WebhookMessage>,
}

/// Message record inside a `message.received` event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub in_reply_to: Option<String>,
    /// Sender field — shape varies by provider serializer, parsed leniently.
    #[serde(default, alias = "from")]
    pub from_: serde_json::Value,
    #[serde(default)]
    pub to: serde_json::Value,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A parsed sender: lowercased address + display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sender {
    pub address: String,
    pub name: String,
}

impl Sender {
    fn unknown() -> Self {
        Self {
            address: "unknown".into(),
            name: "Unknown".into(),
        }
    }
}

/// Normalized inbound email handed to the pipeline. Immutable once built.
#[derive(Debug, Clone)]
pub struct InboundEmail {
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub sender: Sender,
    pub subject: String,
    pub text: Option<String>,
    pub preview: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl InboundEmail {
    /// Build an `InboundEmail` from a webhook message record.
    pub fn from_webhook(msg: WebhookMessage) -> Self {
        let sender = extract_sender(&msg.from_);
        Self {
            message_id: msg.message_id,
            in_reply_to: msg.in_reply_to,
            sender,
            subject: msg.subject.unwrap_or_else(|| "(no subject)".to_string()),
            text: msg.text,
            preview: msg.preview,
            received_at: msg.timestamp.unwrap_or_else(Utc::now),
        }
    }

    /// Body text for the agent: text, else preview, else a placeholder.
    pub fn body_or_placeholder(&self) -> &str {
        self.text
            .as_deref()
            .or(self.preview.as_deref())
            .unwrap_or("(no body)")
    }
}

/// Extract the sender address + display name from a provider `from` field.
pub fn extract_sender(from: &serde_json::Value) -> Sender {
    // Arrays: use the first element.
    let from = match from {
        serde_json::Value::Array(items) => match items.first() {
            Some(first) => first,
            None => return Sender::unknown(),
        },
        other => other,
    };

    match from {
        serde_json::Value::Object(obj) => {
            let address = obj
                .get("email")
                .or_else(|| obj.get("address"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_lowercase();
            let name = obj
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or_else(|| {
                    obj.get("email")
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "Unknown".to_string());
            Sender { address, name }
        }
        serde_json::Value::String(s) => {
            // "Display Name <addr@example.com>" or a bare address.
            if let Some(start) = s.find('<')
                && let Some(end) = s.find('>')
                && end > start
            {
                Sender {
                    address: s[start + 1..end].to_lowercase(),
                    name: s[..start].trim().to_string(),
                }
            } else {
                Sender {
                    address: s.to_lowercase(),
                    name: s.clone(),
                }
            }
        }
        _ => Sender::unknown(),
    }
}
