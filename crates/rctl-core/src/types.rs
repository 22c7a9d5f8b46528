//! Core domain types

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for an SSH session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a fresh random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used in log lines
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output of one completed remote command
///
/// A `CommandResult` always describes a command that ran to completion;
/// failures to run are reported as [`crate::CommandError`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Captured standard output
    pub stdout: Bytes,
    /// Captured standard error
    pub stderr: Bytes,
    /// Remote exit status
    pub exit_code: i32,
    /// Wall-clock time spent waiting for the command
    pub duration: Duration,
    /// Whether output beyond the capture limit was discarded
    pub truncated: bool,
}

impl CommandResult {
    /// Whether the remote command exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Standard output decoded lossily as UTF-8
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error decoded lossily as UTF-8
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Stdout followed by stderr, the way a terminal would show them
    pub fn combined_output(&self) -> String {
        let mut out = self.stdout_text();
        out.push_str(&self.stderr_text());
        out
    }
}

/// Connection health as last observed by the health monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// No probe has run yet
    #[default]
    Unknown,
    /// A probe is in flight
    Checking,
    /// The last probe returned the expected token
    Connected,
    /// The last probe failed or returned unexpected output
    Disconnected,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Unknown => write!(f, "unknown"),
            HealthStatus::Checking => write!(f, "checking"),
            HealthStatus::Connected => write!(f, "connected"),
            HealthStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Snapshot of basic facts about the remote host
///
/// Each field is filled by its own probe command; a probe that fails
/// leaves its field empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSystemInfo {
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub arch: Option<String>,
    pub uptime: Option<String>,
}

impl RemoteSystemInfo {
    /// Whether no probe produced a value
    pub fn is_empty(&self) -> bool {
        self.hostname.is_none() && self.os.is_none() && self.arch.is_none() && self.uptime.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stdout: &str, stderr: &str, exit_code: i32) -> CommandResult {
        CommandResult {
            stdout: Bytes::copy_from_slice(stdout.as_bytes()),
            stderr: Bytes::copy_from_slice(stderr.as_bytes()),
            exit_code,
            duration: Duration::from_millis(5),
            truncated: false,
        }
    }

    #[test]
    fn test_combined_output_orders_stdout_first() {
        let r = result("out\n", "err\n", 1);
        assert_eq!(r.combined_output(), "out\nerr\n");
        assert!(!r.success());
    }

    #[test]
    fn test_health_status_display() {
        assert_eq!(format!("{}", HealthStatus::Connected), "connected");
        assert_eq!(format!("{}", HealthStatus::default()), "unknown");
        assert_eq!(
            serde_json::to_string(&HealthStatus::Checking).unwrap(),
            "\"checking\""
        );
    }

    #[test]
    fn test_session_id_short() {
        let id = SessionId::new();
        assert_eq!(id.short().len(), 8);
        assert_ne!(id, SessionId::new());
    }

    #[test]
    fn test_system_info_is_empty() {
        let mut info = RemoteSystemInfo::default();
        assert!(info.is_empty());
        info.arch = Some("x86_64".into());
        assert!(!info.is_empty());
    }
}
