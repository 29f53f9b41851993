//! Identity resolution — maps a sender address to an internal user identity.
//!
//! The link table is externally owned (the agent's own config file) and
//! mutated out-of-band, so every resolution re-reads it. Resolution is a
//! pure function of the snapshot and the normalized address; when two
//! identities claim the same address, the first in table order wins.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

/// Channel tag prefix for email links, e.g. `email:alice@example.com`.
const EMAIL_LINK_PREFIX: &str = "email:";

/// An identity plus its ordered, channel-tagged links.
pub type IdentityLinks = Vec<(String, Vec<String>)>;

/// Read-only view of the identity link table.
///
/// `load` returns a fresh snapshot on every call — no caching, so external
/// edits to the table take effect on the next inbound message.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn load(&self) -> IdentityLinks;
}

/// Resolve a sender address to a user identity against a table snapshot.
///
/// Normalizes the address (lowercase, trim) and returns the first identity
/// with a matching `email:` link. `None` means unknown correspondent — a
/// legitimate outcome, not an error.
pub fn resolve(table: &IdentityLinks, address: &str) -> Option<String> {
    let normalized = address.trim().to_lowercase();

    for (identity, links) in table {
        for link in links {
            if let Some(value) = link.strip_prefix(EMAIL_LINK_PREFIX)
                && value.trim().to_lowercase() == normalized
            {
                return Some(identity.clone());
            }
        }
    }
    None
}

// ── File-backed store ───────────────────────────────────────────────

/// Shape of the agent config file the link table lives in.
#[derive(Debug, Deserialize)]
struct AgentConfigFile {
    #[serde(default)]
    session: SessionSection,
}

#[derive(Debug, Default, Deserialize)]
struct SessionSection {
    #[serde(rename = "identityLinks", default)]
    identity_links: serde_json::Map<String, serde_json::Value>,
}

/// Identity store backed by the agent's JSON config file.
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn load(&self) -> IdentityLinks {
        load_links_file(&self.path).await
    }
}

/// Read the link table from disk. An unreadable or malformed file yields an
/// empty table (warn) — the bridge keeps running and rejects all senders.
async fn load_links_file(path: &Path) -> IdentityLinks {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot read identity links file");
            return Vec::new();
        }
    };

    let parsed: AgentConfigFile = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot parse identity links file");
            return Vec::new();
        }
    };

    // serde_json's preserve_order keeps the file's iteration order, which
    // first-match resolution depends on.
    parsed
        .session
        .identity_links
        .into_iter()
        .map(|(identity, links)| {
            let links = links
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            (identity, links)
        })
        .collect()
}
