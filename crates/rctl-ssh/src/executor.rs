//! Command execution over a session
//!
//! One call runs one command on a fresh channel. Calls on the same session
//! queue behind its execution lock; the deadline covers the time spent
//! queued as well as the command itself.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use rctl_core::traits::ExecRequest;
use rctl_core::{AppSettings, CommandError, CommandResult};

use crate::session::Session;

/// Default per-stream cap on captured output
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// A command line plus optional bytes for its stdin
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub stdin: Option<Vec<u8>>,
}

impl Invocation {
    /// A command with no stdin
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdin: None,
        }
    }

    /// Attach bytes written to the remote stdin before EOF
    pub fn with_stdin(mut self, stdin: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

// stdin may carry a password
impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.command)
            .field("stdin", &self.stdin.as_ref().map(|s| format!("<{} bytes>", s.len())))
            .finish()
    }
}

impl From<&str> for Invocation {
    fn from(command: &str) -> Self {
        Self::new(command)
    }
}

impl From<String> for Invocation {
    fn from(command: String) -> Self {
        Self::new(command)
    }
}

impl From<&String> for Invocation {
    fn from(command: &String) -> Self {
        Self::new(command.as_str())
    }
}

/// Runs single commands on a session
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    max_output_bytes: usize,
}

impl CommandExecutor {
    /// Create an executor with the given per-stream output cap
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    /// Create an executor from application settings
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(settings.max_output_bytes)
    }

    /// Per-stream output cap
    pub fn max_output_bytes(&self) -> usize {
        self.max_output_bytes
    }

    /// Run `command` and wait for it to finish
    pub async fn run(
        &self,
        session: &Session,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandResult, CommandError> {
        self.invoke(session, &Invocation::new(command), timeout).await
    }

    /// Run `command`, writing `stdin` to it before EOF
    pub async fn run_with_input(
        &self,
        session: &Session,
        command: &str,
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<CommandResult, CommandError> {
        self.invoke(session, &Invocation::new(command).with_stdin(stdin), timeout)
            .await
    }

    /// Run an invocation
    ///
    /// Errors:
    /// - `NotConnected` if the session is already closed
    /// - `Disconnected` if it is closed while the command is queued or running
    /// - `Timeout` if the deadline passes first; the channel is closed and the
    ///   session stays usable
    pub async fn invoke(
        &self,
        session: &Session,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<CommandResult, CommandError> {
        if !session.is_alive() {
            return Err(CommandError::NotConnected);
        }

        let started = Instant::now();
        // A timeout too large to represent means no deadline
        let deadline = started.checked_add(timeout);
        let closed = session.closed_token();

        let _permit = tokio::select! {
            biased;
            _ = closed.cancelled() => return Err(CommandError::Disconnected),
            permit = within(deadline, session.exec_lock().lock()) => {
                permit.ok_or(CommandError::Timeout(timeout))?
            }
        };

        let mut request = ExecRequest::new(invocation.command.as_str(), self.max_output_bytes);
        if let Some(stdin) = &invocation.stdin {
            request = request.with_stdin(stdin.as_slice());
        }

        tracing::debug!(session = %session.id().short(), "Running: {}", invocation.command);
        let outcome = tokio::select! {
            biased;
            _ = closed.cancelled() => Err(CommandError::Disconnected),
            output = within(deadline, session.transport().exec(&request)) => {
                output.unwrap_or(Err(CommandError::Timeout(timeout)))
            }
        };

        match outcome {
            Ok(output) => {
                let result = CommandResult {
                    stdout: Bytes::from(output.stdout),
                    stderr: Bytes::from(output.stderr),
                    exit_code: output.exit_code,
                    duration: started.elapsed(),
                    truncated: output.truncated,
                };
                if result.truncated {
                    tracing::warn!(
                        "Output of '{}' exceeded {} bytes and was truncated",
                        invocation.command,
                        self.max_output_bytes
                    );
                }
                tracing::debug!(
                    session = %session.id().short(),
                    exit_code = result.exit_code,
                    "Finished in {:?}",
                    result.duration
                );
                Ok(result)
            }
            Err(e) => {
                if session.transport().is_closed() {
                    session.mark_dead();
                }
                tracing::debug!(session = %session.id().short(), "Command failed: {}", e);
                Err(e)
            }
        }
    }
}

/// Drive `future` until `deadline`; `None` if the deadline passed first
async fn within<F: Future>(deadline: Option<Instant>, future: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, future).await.ok(),
        None => Some(future.await),
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT_BYTES)
    }
}
