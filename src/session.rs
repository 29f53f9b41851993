//! Session lookup — maps a user identity to a pre-existing agent session.
//!
//! The session key is a deterministic function of the identity. The registry
//! is externally owned and re-read on every lookup so external session
//! lifecycle changes (creation, rotation) take effect immediately. The
//! bridge never creates sessions: a missing entry is terminal for that
//! lookup.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SessionError;

/// Fixed namespace for session keys.
const SESSION_NAMESPACE: &str = "agent:main";

/// Build the deterministic session key for an identity.
pub fn session_key(identity: &str) -> String {
    format!("{SESSION_NAMESPACE}:{identity}")
}

/// A located session: the derived key plus the registry's opaque handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRef {
    pub key: String,
    pub handle: String,
}

/// Read-only view of the session registry.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Look up the session for an identity. Absence is `SessionError::NotFound`.
    async fn locate(&self, identity: &str) -> Result<SessionRef, SessionError>;
}

// ── File-backed registry ────────────────────────────────────────────

/// One entry in the sessions file.
#[derive(Debug, Deserialize)]
struct SessionEntry {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Session registry backed by the agent's `sessions.json`.
pub struct FileSessionRegistry {
    path: PathBuf,
}

impl FileSessionRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionRegistry for FileSessionRegistry {
    async fn locate(&self, identity: &str) -> Result<SessionRef, SessionError> {
        let key = session_key(identity);

        let not_found = || SessionError::NotFound { key: key.clone() };

        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cannot read session registry");
                return Err(not_found());
            }
        };

        let sessions: std::collections::HashMap<String, SessionEntry> =
            match serde_json::from_str(&raw) {
                Ok(sessions) => sessions,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Cannot parse session registry");
                    return Err(not_found());
                }
            };

        let handle = sessions
            .get(&key)
            .and_then(|entry| entry.session_id.clone())
            .ok_or_else(not_found)?;

        Ok(SessionRef { key, handle })
    }
}
