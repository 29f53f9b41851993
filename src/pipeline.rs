//! Message-routing pipeline — the core of the bridge.
//!
//! Per inbound message: resolve the sender to an identity, classify the
//! subject as a control command or a forward, locate the identity's
//! session, dispatch under a bounded timeout, and compose/send (or
//! suppress) the reply. Every failure on the forward path is caught
//! exactly once and converted into a best-effort apology to the sender;
//! failures sending the apology itself are logged and swallowed so one
//! undeliverable reply can never cascade.
//!
//! Dispatches to the same session key are serialized so two emails from
//! the same user cannot interleave writes to one conversation. Distinct
//! identities proceed fully concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::command::{self, Command};
use crate::dispatch::{Dispatcher, MESSAGE_TIMEOUT, RESET_TIMEOUT};
use crate::error::Error;
use crate::identity::{self, IdentityStore};
use crate::inbound::InboundEmail;
use crate::outbound::MailSender;
use crate::reply::{self, NO_REPLY_SENTINEL};
use crate::session::SessionRegistry;

/// Result of processing one inbound message, returned to the webhook caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub has_reply: bool,
    pub reset: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessOutcome {
    fn rejected(reason: &str) -> Self {
        Self {
            success: false,
            user_id: None,
            has_reply: false,
            reset: false,
            error: Some(reason.to_string()),
        }
    }
}

/// Per-session-key dispatch locks.
///
/// The map grows by one entry per session key seen; keys are few (one per
/// linked identity) so entries are never evicted.
#[derive(Default)]
struct SessionLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    async fn acquire(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap();
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Pipeline coordinator — sequences resolution, classification, dispatch
/// and reply per inbound message, containing all failures locally.
pub struct MailPipeline {
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
    mailer: Arc<dyn MailSender>,
    signature: Option<String>,
    locks: SessionLocks,
}

impl MailPipeline {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
        mailer: Arc<dyn MailSender>,
        signature: Option<String>,
    ) -> Self {
        Self {
            identities,
            sessions,
            dispatcher,
            mailer,
            signature,
            locks: SessionLocks::default(),
        }
    }

    /// Process one inbound message end to end. Never returns an error —
    /// every failure is contained and reported in the outcome.
    pub async fn process(&self, email: InboundEmail) -> ProcessOutcome {
        info!(
            sender = %email.sender.address,
            name = %email.sender.name,
            subject = %email.subject,
            "Inbound email"
        );

        let table = self.identities.load().await;
        let Some(identity) = identity::resolve(&table, &email.sender.address) else {
            info!(sender = %email.sender.address, "Unknown sender, dropping");
            return ProcessOutcome::rejected("Unknown sender");
        };

        info!(identity = %identity, "Sender resolved");

        match command::classify(&email) {
            Command::Reset => self.handle_reset(&email, &identity).await,
            Command::Forward => self.handle_forward(&email, &identity).await,
        }
    }

    /// Reset path: missing session or reset failure is a logged no-op —
    /// no reply goes out. Only a successful reset is acknowledged.
    async fn handle_reset(&self, email: &InboundEmail, identity: &str) -> ProcessOutcome {
        let outcome = |has_reply| ProcessOutcome {
            success: true,
            user_id: Some(identity.to_string()),
            has_reply,
            reset: true,
            error: None,
        };

        let session = match self.sessions.locate(identity).await {
            Ok(session) => session,
            Err(e) => {
                warn!(identity = %identity, error = %e, "Skipping reset");
                return outcome(false);
            }
        };

        let reset = {
            let _guard = self.locks.acquire(&session.key).await;
            self.dispatcher.dispatch_reset(&session, RESET_TIMEOUT).await
        };
        if let Err(e) = reset {
            error!(key = %session.key, error = %e, "Session reset failed");
            return outcome(false);
        }

        let ack = reply::compose_reset_ack(email, self.signature.as_deref());
        match self.mailer.send(&ack).await {
            Ok(_) => outcome(true),
            Err(e) => {
                error!(to = %ack.to, error = %e, "Failed to send reset acknowledgment");
                outcome(false)
            }
        }
    }

    /// Forward path: any failure in the session-lookup/dispatch/send chain
    /// is caught once and turned into an apology reply.
    async fn handle_forward(&self, email: &InboundEmail, identity: &str) -> ProcessOutcome {
        match self.forward(email, identity).await {
            Ok(has_reply) => ProcessOutcome {
                success: true,
                user_id: Some(identity.to_string()),
                has_reply,
                reset: false,
                error: None,
            },
            Err(e) => {
                error!(identity = %identity, error = %e, "Forward failed");
                self.send_apology(email, &e.to_string()).await;
                ProcessOutcome {
                    success: false,
                    user_id: Some(identity.to_string()),
                    has_reply: false,
                    reset: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// The fallible part of the forward path. Returns whether a reply went out.
    async fn forward(&self, email: &InboundEmail, identity: &str) -> Result<bool, Error> {
        let session = self.sessions.locate(identity).await?;
        let prompt = build_agent_prompt(email, identity);

        let response = {
            let _guard = self.locks.acquire(&session.key).await;
            self.dispatcher
                .dispatch_message(&session, &prompt, MESSAGE_TIMEOUT)
                .await?
        };

        match reply::compose(email, &response, self.signature.as_deref()) {
            Some(outbound) => {
                info!(
                    to = %outbound.to,
                    chars = response.len(),
                    "Sending agent reply"
                );
                self.mailer.send(&outbound).await?;
                Ok(true)
            }
            None => {
                info!("Agent declined to reply, suppressing");
                Ok(false)
            }
        }
    }

    /// Best-effort apology. A failure here is logged and swallowed —
    /// never re-raised, never retried.
    async fn send_apology(&self, email: &InboundEmail, cause: &str) {
        let text = format!(
            "Sorry, something went wrong while handling your email.\n\nError: {cause}"
        );
        let Some(apology) = reply::compose(email, &text, self.signature.as_deref()) else {
            return;
        };
        if let Err(e) = self.mailer.send(&apology).await {
            error!(to = %apology.to, error = %e, "Failed to send apology reply");
        }
    }
}

/// Build the prompt handed to the agent for a forwarded email.
///
/// Annotates the body with who wrote it and instructs the agent to answer
/// with the no-reply sentinel when no reply should go out.
pub fn build_agent_prompt(email: &InboundEmail, identity: &str) -> String {
    let sender = &email.sender;
    [
        format!(
            "📧 Email received from {} ({identity}) <{}>",
            sender.name, sender.address
        ),
        format!("Subject: {}", email.subject),
        "---".to_string(),
        email.body_or_placeholder().to_string(),
        "---".to_string(),
        format!(
            "[Important] If this email needs a reply, answer it directly. \
             Your answer will be sent to: {}",
            sender.address
        ),
        format!("If no reply is needed, answer with exactly {NO_REPLY_SENTINEL}."),
    ]
    .join("\n\n")
}
