//! Ordered command fallback
//!
//! Remote hosts disagree on how to spell some operations (`systemctl
//! poweroff` vs `shutdown -h now` vs `poweroff`). A fallback list names the
//! alternatives in order of preference and stops at the first that works.

use std::time::Duration;

use rctl_core::{CommandError, CommandResult};

use crate::executor::{CommandExecutor, Invocation};
use crate::session::Session;

/// What counts as success for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Any command that runs to completion wins, whatever its exit status
    #[default]
    CompletionOnly,
    /// A non-zero exit counts as a failure and the next command is tried
    RequireZeroExit,
}

/// Tries commands in order until one succeeds
#[derive(Debug, Clone, Default)]
pub struct FallbackRunner {
    executor: CommandExecutor,
    policy: FallbackPolicy,
}

impl FallbackRunner {
    pub fn new(executor: CommandExecutor, policy: FallbackPolicy) -> Self {
        Self { executor, policy }
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// Run `commands` in order and return the first success
    ///
    /// Commands after the first success are never started. When every
    /// attempt fails the error is `AllFailed` carrying the last failure. If
    /// the session dies along the way the remaining commands are skipped.
    pub async fn run_first_success<I, C>(
        &self,
        session: &Session,
        commands: I,
        timeout: Duration,
    ) -> Result<CommandResult, CommandError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Invocation>,
    {
        let mut attempts = 0;
        let mut last = None;

        for command in commands {
            let invocation = command.into();
            attempts += 1;

            let error = match self.executor.invoke(session, &invocation, timeout).await {
                Ok(result) if result.success() || self.policy == FallbackPolicy::CompletionOnly => {
                    tracing::info!(
                        "'{}' succeeded on attempt {}",
                        invocation.command,
                        attempts
                    );
                    return Ok(result);
                }
                Ok(result) => CommandError::NonZeroExit {
                    code: result.exit_code,
                    output: result.combined_output().trim().to_string(),
                },
                Err(e) => e,
            };

            tracing::debug!("'{}' failed: {}", invocation.command, error);
            last = Some(error);

            if !session.is_alive() {
                tracing::warn!("Session lost during fallback, skipping remaining commands");
                break;
            }
        }

        match last {
            Some(last) => Err(CommandError::AllFailed {
                attempts,
                last: Box::new(last),
            }),
            None => Err(CommandError::NoCommands),
        }
    }
}
