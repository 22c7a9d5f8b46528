//! Application settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Tunables for the session core, stored in `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Limit for TCP connect plus SSH handshake
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Default deadline for commands issued by callers
    #[serde(with = "duration_secs")]
    pub command_timeout: Duration,

    /// Pause between health probes
    #[serde(with = "duration_secs")]
    pub heartbeat_interval: Duration,

    /// Deadline for a single health probe
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,

    /// Keep the session open after a successful connection test
    pub keep_session_after_test: bool,

    /// Per-stream cap on captured command output
    pub max_output_bytes: usize,

    /// Where the connection record is stored
    pub credentials_path: PathBuf,

    /// Where the key sealing the stored secret lives
    pub key_path: PathBuf,

    /// Shutdown spellings, most capable first
    pub power_off_commands: Vec<String>,

    /// Reboot spellings, most capable first
    pub reboot_commands: Vec<String>,

    /// Suspend spellings, most capable first
    pub suspend_commands: Vec<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        let config_dir = super::default_config_dir();

        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
            keep_session_after_test: false,
            max_output_bytes: 4 * 1024 * 1024,
            credentials_path: config_dir.join("credentials.toml"),
            key_path: config_dir.join("credentials.key"),
            power_off_commands: strings(&[
                "sudo systemctl poweroff",
                "sudo shutdown -h now",
                "sudo poweroff",
                "systemctl poweroff",
                "shutdown -h now",
                "poweroff",
            ]),
            reboot_commands: strings(&[
                "sudo systemctl reboot",
                "sudo shutdown -r now",
                "sudo reboot",
                "systemctl reboot",
                "shutdown -r now",
                "reboot",
            ]),
            suspend_commands: strings(&["sudo systemctl suspend", "systemctl suspend"]),
        }
    }
}

impl AppSettings {
    /// Place the credential files under `dir` instead of the user config dir
    pub fn with_state_dir(mut self, dir: &std::path::Path) -> Self {
        self.credentials_path = dir.join("credentials.toml");
        self.key_path = dir.join("credentials.key");
        self
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
