//! Outbound mail — Resend REST API client.
//!
//! The pipeline only sees the `MailSender` trait; the Resend client is the
//! production implementation. Non-2xx responses raise `MailError::Api`
//! with the response body for diagnostics.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::MailError;
use crate::reply::OutboundReply;

/// Resend send endpoint.
const RESEND_SEND_URL: &str = "https://api.resend.com/emails";

/// Outbound mail send boundary.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send a composed reply. Returns the provider's parsed response payload.
    async fn send(&self, reply: &OutboundReply) -> Result<serde_json::Value, MailError>;
}

/// Transactional mail client for the Resend API.
pub struct ResendClient {
    api_key: SecretString,
    from_address: String,
    client: reqwest::Client,
}

impl ResendClient {
    pub fn new(api_key: SecretString, from_address: impl Into<String>) -> Self {
        Self {
            api_key,
            from_address: from_address.into(),
            client: reqwest::Client::new(),
        }
    }
}

/// Build the Resend send-request body for a composed reply.
pub fn build_send_body(reply: &OutboundReply, from_address: &str) -> serde_json::Value {
    let mut body = serde_json::json!({
        "from": from_address,
        "to": reply.to,
        "subject": reply.subject,
        "text": reply.text,
        "html": reply.html,
    });
    if let Some(ref in_reply_to) = reply.in_reply_to {
        body["headers"] = serde_json::json!({ "In-Reply-To": in_reply_to });
    }
    body
}

#[async_trait]
impl MailSender for ResendClient {
    async fn send(&self, reply: &OutboundReply) -> Result<serde_json::Value, MailError> {
        let body = build_send_body(reply, &self.from_address);

        tracing::info!(to = %reply.to, subject = %reply.subject, "Sending reply via Resend");

        let response = self
            .client
            .post(RESEND_SEND_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                body,
            });
        }

        // Some 2xx responses may not be JSON; fall back to raw text.
        let raw = response
            .text()
            .await
            .map_err(|e| MailError::Http(e.to_string()))?;
        Ok(serde_json::from_str(&raw)
            .unwrap_or_else(|_| serde_json::json!({ "success": true, "raw": raw })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply() -> OutboundReply {
        OutboundReply {
            to: "alice@example.com".into(),
            subject: "Re: Hello".into(),
            text: "Hi!".into(),
            html: "<p>Hi!</p>".into(),
            in_reply_to: Some("<msg-1@mail.example>".into()),
        }
    }

    #[test]
    fn send_body_includes_all_fields() {
        let body = build_send_body(&reply(), "noreply@bridge.example");
        assert_eq!(body["from"], "noreply@bridge.example");
        assert_eq!(body["to"], "alice@example.com");
        assert_eq!(body["subject"], "Re: Hello");
        assert_eq!(body["text"], "Hi!");
        assert_eq!(body["html"], "<p>Hi!</p>");
        assert_eq!(body["headers"]["In-Reply-To"], "<msg-1@mail.example>");
    }

    #[test]
    fn send_body_omits_headers_without_threading() {
        let mut r = reply();
        r.in_reply_to = None;
        let body = build_send_body(&r, "noreply@bridge.example");
        assert!(body.get("headers").is_none());
    }
}
