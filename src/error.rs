//! Error types for the mail bridge.

use std::time::Duration;

/// Top-level error type for the bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),
}

/// Configuration-related errors. Fatal at startup — never surfaced per-message.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Session registry errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {key} does not exist — create it via the web client first")]
    NotFound { key: String },
}

/// Agent runtime dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Agent runtime timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Agent runtime failed: {reason}")]
    Runtime { reason: String },

    #[error("Failed to spawn agent runtime: {0}")]
    Spawn(String),
}

/// Outbound mail send errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Mail API returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Result type alias for the bridge.
pub type Result<T> = std::result::Result<T, Error>;
