//! Configuration, built from environment variables at startup.
//!
//! Loaded once in `main` and injected as an immutable value. Invalid
//! config is fatal — the process exits rather than limping along.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default webhook listen port.
const DEFAULT_PORT: u16 = 8789;

/// Default agent runtime CLI program.
const DEFAULT_AGENT_BIN: &str = "openclaw";

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resend API key for outbound mail.
    pub resend_api_key: SecretString,
    /// Outbound From: address (must be on a verified domain).
    pub from_address: String,
    /// Webhook listen port.
    pub port: u16,
    /// JSON file holding the identity link table.
    pub identity_links_path: PathBuf,
    /// JSON file holding the session registry.
    pub session_registry_path: PathBuf,
    /// Agent runtime CLI program (name or path).
    pub agent_bin: String,
    /// Optional signature appended to outbound replies.
    pub signature: Option<String>,
}

impl Config {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let resend_api_key = require("RESEND_API_KEY", "export RESEND_API_KEY=re_...")?;
        let from_address = require(
            "MAIL_FROM_ADDRESS",
            "export MAIL_FROM_ADDRESS=noreply@yourdomain.com",
        )?;
        let identity_links_path = require(
            "IDENTITY_LINKS_PATH",
            "point it at the agent config JSON holding session.identityLinks",
        )?;
        let session_registry_path = require(
            "SESSION_REGISTRY_PATH",
            "point it at the agent's sessions.json",
        )?;

        let port = match std::env::var("MAIL_BRIDGE_PORT") {
            Ok(s) => s.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MAIL_BRIDGE_PORT".into(),
                message: format!("not a valid port number: {s}"),
            })?,
            Err(_) => DEFAULT_PORT,
        };

        let agent_bin =
            std::env::var("AGENT_BIN").unwrap_or_else(|_| DEFAULT_AGENT_BIN.to_string());

        let signature = std::env::var("MAIL_SIGNATURE")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            resend_api_key: SecretString::from(resend_api_key),
            from_address,
            port,
            identity_links_path: PathBuf::from(identity_links_path),
            session_registry_path: PathBuf::from(session_registry_path),
            agent_bin,
            signature,
        })
    }
}

fn require(key: &str, hint: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingRequired {
            key: key.into(),
            hint: hint.into(),
        })
}
