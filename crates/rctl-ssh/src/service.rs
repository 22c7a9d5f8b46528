//! Remote control facade
//!
//! The calls a front end makes: save and load the connection record, test
//! it, run commands, read system info, power operations and the heartbeat.
//! Every call that needs the remote host reuses the active session or opens
//! one from the stored record.

use std::sync::Arc;

use tokio::sync::watch;

use rctl_core::traits::Connector;
use rctl_core::{
    AppSettings, CommandError, ConnectionConfig, CredentialStore, HealthStatus, RctlError,
    RemoteSystemInfo,
};

use crate::executor::{CommandExecutor, Invocation};
use crate::fallback::{FallbackPolicy, FallbackRunner};
use crate::health::HealthMonitor;
use crate::privilege;
use crate::session::{Session, SessionManager};
use crate::sysinfo;
use crate::transport::RusshConnector;

/// Command used to check a freshly opened session
pub const TEST_COMMAND: &str = "echo 'Connection successful'";

/// Remote control over one host
pub struct RemoteControl {
    settings: AppSettings,
    store: CredentialStore,
    sessions: SessionManager,
    executor: CommandExecutor,
    health: HealthMonitor,
}

impl RemoteControl {
    /// Create a facade that opens connections with `connector`
    pub fn new(settings: AppSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            store: CredentialStore::from_settings(&settings),
            sessions: SessionManager::new(connector),
            executor: CommandExecutor::from_settings(&settings),
            health: HealthMonitor::from_settings(&settings),
            settings,
        }
    }

    /// Create a facade backed by russh
    pub fn with_russh(settings: AppSettings) -> Self {
        let connector = Arc::new(RusshConnector::from_settings(&settings));
        Self::new(settings, connector)
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Persist new connection settings
    ///
    /// Any open session was made with the old settings and is closed.
    pub async fn save_ssh_config(
        &self,
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
    ) -> Result<(), RctlError> {
        let previous = self.store.load()?;
        let config = ConnectionConfig {
            identity_file: previous.identity_file,
            host_key_fingerprint: previous.host_key_fingerprint,
            ..ConnectionConfig::new(host.trim(), port, username.trim(), secret)
        };
        self.save_connection(&config).await
    }

    /// Persist a full connection record, closing any open session
    pub async fn save_connection(&self, config: &ConnectionConfig) -> Result<(), RctlError> {
        self.store.save(config)?;
        self.disconnect().await;
        Ok(())
    }

    /// Stored connection settings, or defaults when nothing is stored
    pub fn load_ssh_config(&self) -> Result<ConnectionConfig, RctlError> {
        Ok(self.store.load()?)
    }

    /// Connect with the stored settings and run a trivial command
    ///
    /// The session is closed afterwards unless `keep_session_after_test`
    /// is set.
    pub async fn test_ssh_connection(&self) -> Result<String, RctlError> {
        let config = self.store.load()?;
        config.validate()?;

        self.health.stop();
        let session = self.sessions.connect(&config).await?;
        let outcome = self
            .executor
            .run(&session, TEST_COMMAND, self.settings.command_timeout)
            .await;

        if !self.settings.keep_session_after_test {
            self.sessions.disconnect().await;
        }

        let result = outcome?;
        if !result.success() {
            return Err(CommandError::NonZeroExit {
                code: result.exit_code,
                output: result.combined_output(),
            }
            .into());
        }
        Ok(result.stdout_text().trim().to_string())
    }

    /// Run `command` and return its stdout followed by stderr
    ///
    /// `sudo` commands are fed the stored password. If sudo rejects it the
    /// command is retried once as given. A non-zero exit is an error that
    /// carries the output.
    pub async fn execute_ssh_command(&self, command: &str) -> Result<String, RctlError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(CommandError::Invalid("empty command".to_string()).into());
        }

        let (session, config) = self.ensure_session().await?;
        let timeout = self.settings.command_timeout;

        let (invocation, elevated) = privilege::prepare(command, &config.secret);
        let result = self.executor.invoke(&session, &invocation, timeout).await?;
        let output = result.combined_output();
        if result.success() {
            return Ok(output);
        }

        if elevated && privilege::password_rejected(&output) {
            tracing::warn!("sudo rejected the stored password, retrying without it");
            if let Ok(retry) = self.executor.run(&session, command, timeout).await {
                if retry.success() {
                    return Ok(retry.combined_output());
                }
            }
        }

        Err(CommandError::NonZeroExit {
            code: result.exit_code,
            output,
        }
        .into())
    }

    /// Fresh snapshot of hostname, OS, architecture and uptime
    pub async fn get_remote_system_info(&self) -> Result<RemoteSystemInfo, RctlError> {
        let (session, _) = self.ensure_session().await?;
        Ok(sysinfo::collect(&self.executor, &session, self.settings.command_timeout).await?)
    }

    /// Shut the remote host down
    pub async fn power_off(&self) -> Result<String, RctlError> {
        tracing::info!("Powering off remote host");
        self.run_fallback(&self.settings.power_off_commands).await
    }

    /// Reboot the remote host
    pub async fn reboot(&self) -> Result<String, RctlError> {
        tracing::info!("Rebooting remote host");
        self.run_fallback(&self.settings.reboot_commands).await
    }

    /// Suspend the remote host
    pub async fn suspend(&self) -> Result<String, RctlError> {
        tracing::info!("Suspending remote host");
        self.run_fallback(&self.settings.suspend_commands).await
    }

    /// Restart a systemd unit
    pub async fn restart_service(&self, unit: &str) -> Result<String, RctlError> {
        validate_unit_name(unit)?;
        tracing::info!("Restarting service {}", unit);
        self.execute_ssh_command(&format!("sudo systemctl restart {}", unit))
            .await
    }

    /// Start the periodic health probe on the current session
    pub async fn start_heartbeat(&self) -> Result<(), RctlError> {
        let (session, _) = self.ensure_session().await?;
        self.health.start(session, self.settings.heartbeat_interval);
        Ok(())
    }

    /// Stop the periodic health probe
    pub fn stop_heartbeat(&self) {
        self.health.stop();
    }

    /// Last known health status
    pub fn health_status(&self) -> HealthStatus {
        self.health.current_status()
    }

    /// Follow health status transitions
    pub fn subscribe_health(&self) -> watch::Receiver<HealthStatus> {
        self.health.subscribe()
    }

    /// Stop the heartbeat and close the active session
    pub async fn disconnect(&self) {
        self.health.stop();
        self.sessions.disconnect().await;
    }

    /// Whether a live session is open
    pub fn is_connected(&self) -> bool {
        self.sessions.is_connected()
    }

    async fn run_fallback(&self, commands: &[String]) -> Result<String, RctlError> {
        let (session, config) = self.ensure_session().await?;
        let invocations: Vec<Invocation> = commands
            .iter()
            .map(|c| privilege::prepare(c, &config.secret).0)
            .collect();

        let runner = FallbackRunner::new(self.executor.clone(), FallbackPolicy::RequireZeroExit);
        let result = runner
            .run_first_success(&session, invocations, self.settings.command_timeout)
            .await?;
        Ok(result.combined_output())
    }

    /// Active session plus the stored record it was opened with
    async fn ensure_session(&self) -> Result<(Session, ConnectionConfig), RctlError> {
        let config = self.store.load()?;
        config.validate()?;

        let session = self.sessions.get_or_connect(&config).await?;
        Ok((session, config))
    }
}

impl std::fmt::Debug for RemoteControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteControl")
            .field("store", &self.store.path())
            .field("sessions", &self.sessions)
            .field("health", &self.health)
            .finish()
    }
}

/// Accept only characters systemd allows in unit names
fn validate_unit_name(unit: &str) -> Result<(), CommandError> {
    let valid = !unit.is_empty()
        && !unit.starts_with('-')
        && unit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | ':' | '-'));
    if valid {
        Ok(())
    } else {
        Err(CommandError::Invalid(format!("invalid unit name '{}'", unit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_names() {
        assert!(validate_unit_name("nginx.service").is_ok());
        assert!(validate_unit_name("getty@tty1.service").is_ok());
        assert!(validate_unit_name("").is_err());
        assert!(validate_unit_name("nginx; rm -rf /").is_err());
        assert!(validate_unit_name("--now").is_err());
        assert!(validate_unit_name("a b").is_err());
    }
}
