//! Agent runtime dispatch — bounded-time message delivery to a session.
//!
//! The coordinator only sees the `Dispatcher` trait, so the process-based
//! implementation can be swapped for an in-process or RPC runtime in tests.
//!
//! Two timeouts: a full message dispatch may involve model inference (120s),
//! while a reset is a cheap control operation (30s) that must not stall
//! shutdown.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::DispatchError;
use crate::session::SessionRef;

/// Timeout for a full message dispatch.
pub const MESSAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for a session reset.
pub const RESET_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed instruction that resets a session.
const RESET_INSTRUCTION: &str = "/new";

/// Bounded-time dispatch to the agent runtime bound to a session.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Send `text` to the session's runtime and return its trimmed textual
    /// output. Timeout or runtime failure yields a `DispatchError` with a
    /// human-readable cause. No partial result is salvaged on timeout.
    async fn dispatch_message(
        &self,
        session: &SessionRef,
        text: &str,
        timeout: Duration,
    ) -> Result<String, DispatchError>;

    /// Send the fixed reset instruction to the session's runtime.
    async fn dispatch_reset(
        &self,
        session: &SessionRef,
        timeout: Duration,
    ) -> Result<(), DispatchError>;
}

// ── Process-based implementation ────────────────────────────────────

/// Dispatcher that shells out to the agent CLI.
pub struct ProcessDispatcher {
    program: String,
}

impl ProcessDispatcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run one agent invocation, capturing stdout/stderr under a timeout.
    async fn invoke(
        &self,
        session: &SessionRef,
        message: &str,
        timeout: Duration,
    ) -> Result<String, DispatchError> {
        let mut command = Command::new(&self.program);
        command
            .arg("agent")
            .arg("--session-id")
            .arg(&session.handle)
            .arg("--message")
            .arg(message)
            .arg("--timeout")
            .arg(timeout.as_secs().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must not leave the
            // runtime running.
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| DispatchError::Spawn(format!("{}: {e}", self.program)))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(DispatchError::Runtime {
                    reason: format!("wait failed: {e}"),
                });
            }
            Err(_) => return Err(DispatchError::Timeout { timeout }),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let reason = if stderr.is_empty() {
                format!("exit code {}", output.status.code().unwrap_or(-1))
            } else {
                stderr.to_string()
            };
            return Err(DispatchError::Runtime { reason });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Dispatcher for ProcessDispatcher {
    async fn dispatch_message(
        &self,
        session: &SessionRef,
        text: &str,
        timeout: Duration,
    ) -> Result<String, DispatchError> {
        tracing::info!(key = %session.key, handle = %session.handle, "Dispatching message to session");
        self.invoke(session, text, timeout).await
    }

    async fn dispatch_reset(
        &self,
        session: &SessionRef,
        timeout: Duration,
    ) -> Result<(), DispatchError> {
        tracing::info!(key = %session.key, handle = %session.handle, "Resetting session");
        self.invoke(session, RESET_INSTRUCTION, timeout).await?;
        Ok(())
    }
}
