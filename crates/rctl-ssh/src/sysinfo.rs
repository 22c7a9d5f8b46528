//! Remote system information

use std::time::Duration;

use rctl_core::{CommandError, RemoteSystemInfo};

use crate::executor::CommandExecutor;
use crate::session::Session;

pub const HOSTNAME_COMMAND: &str = "hostname";
pub const OS_COMMAND: &str = "uname -s";
pub const ARCH_COMMAND: &str = "uname -m";
/// `uptime -p` is missing on busybox and macOS
pub const UPTIME_COMMAND: &str = "uptime -p 2>/dev/null || uptime";

/// Fetch a fresh snapshot
///
/// Each field comes from its own command. A command that fails or exits
/// non-zero leaves its field empty. Losing the session aborts the snapshot.
pub async fn collect(
    executor: &CommandExecutor,
    session: &Session,
    timeout: Duration,
) -> Result<RemoteSystemInfo, CommandError> {
    Ok(RemoteSystemInfo {
        hostname: field(executor, session, HOSTNAME_COMMAND, timeout).await?,
        os: field(executor, session, OS_COMMAND, timeout).await?,
        arch: field(executor, session, ARCH_COMMAND, timeout).await?,
        uptime: field(executor, session, UPTIME_COMMAND, timeout).await?,
    })
}

async fn field(
    executor: &CommandExecutor,
    session: &Session,
    command: &str,
    timeout: Duration,
) -> Result<Option<String>, CommandError> {
    match executor.run(session, command, timeout).await {
        Ok(result) if result.success() => {
            let value = result.stdout_text().trim().to_string();
            Ok(Some(value).filter(|v| !v.is_empty()))
        }
        Ok(result) => {
            tracing::debug!("'{}' exited with {}", command, result.exit_code);
            Ok(None)
        }
        Err(e) if e.is_fatal() || e == CommandError::NotConnected => Err(e),
        Err(e) => {
            tracing::debug!("'{}' failed: {}", command, e);
            Ok(None)
        }
    }
}
