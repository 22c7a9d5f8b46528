//! Connection health monitoring
//!
//! A background task runs a cheap probe command on a fixed cadence and
//! publishes the outcome through a `watch` channel. Probe failures never
//! escape the monitor; they only turn into [`HealthStatus::Disconnected`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use rctl_core::{AppSettings, HealthStatus};

use crate::executor::CommandExecutor;
use crate::session::Session;

/// Probe command
pub const PROBE_COMMAND: &str = "echo \"heartbeat\"";

/// Token the probe output must contain
pub const PROBE_TOKEN: &str = "heartbeat";

/// Default time between probes
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Default deadline for one probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// What to run and what to expect back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub command: String,
    pub expected_token: String,
    pub timeout: Duration,
}

impl Default for ProbeSpec {
    fn default() -> Self {
        Self {
            command: PROBE_COMMAND.to_string(),
            expected_token: PROBE_TOKEN.to_string(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

struct MonitorTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodically probes a session
pub struct HealthMonitor {
    executor: CommandExecutor,
    probe: ProbeSpec,
    status: Arc<watch::Sender<HealthStatus>>,
    task: parking_lot::Mutex<Option<MonitorTask>>,
}

impl HealthMonitor {
    pub fn new(executor: CommandExecutor, probe: ProbeSpec) -> Self {
        let (status, _) = watch::channel(HealthStatus::Unknown);
        Self {
            executor,
            probe,
            status: Arc::new(status),
            task: parking_lot::Mutex::new(None),
        }
    }

    /// Create a monitor using the probe timeout from settings
    pub fn from_settings(settings: &AppSettings) -> Self {
        let probe = ProbeSpec {
            timeout: settings.probe_timeout,
            ..ProbeSpec::default()
        };
        Self::new(CommandExecutor::from_settings(settings), probe)
    }

    /// Start probing `session` every `interval`, first probe immediately
    ///
    /// A monitor that is already running is stopped and replaced. A zero
    /// interval falls back to the default cadence.
    pub fn start(&self, session: Session, interval: Duration) {
        let interval = if interval.is_zero() {
            DEFAULT_PROBE_INTERVAL
        } else {
            interval
        };

        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            previous.cancel.cancel();
            previous.handle.abort();
        }

        self.status.send_replace(HealthStatus::Checking);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_probes(
            self.executor.clone(),
            self.probe.clone(),
            session,
            interval,
            Arc::clone(&self.status),
            cancel.clone(),
        ));
        *task = Some(MonitorTask { cancel, handle });
    }

    /// Stop probing; the last status is kept
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.cancel.cancel();
            task.handle.abort();
            tracing::debug!("Health monitor stopped");
        }
    }

    /// Whether a probe task is scheduled
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    /// Last published status
    pub fn current_status(&self) -> HealthStatus {
        *self.status.borrow()
    }

    /// Receive every status transition
    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.status.subscribe()
    }

    /// Run one probe now and publish its outcome
    pub async fn probe_once(&self, session: &Session) -> HealthStatus {
        self.status.send_replace(HealthStatus::Checking);
        let status = probe(&self.executor, &self.probe, session).await;
        self.status.send_replace(status);
        status
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("probe", &self.probe)
            .field("status", &self.current_status())
            .finish()
    }
}

async fn run_probes(
    executor: CommandExecutor,
    spec: ProbeSpec,
    session: Session,
    interval: Duration,
    status: Arc<watch::Sender<HealthStatus>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        session = %session.id().short(),
        "Health monitor started (interval: {:?})",
        interval
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        status.send_replace(HealthStatus::Checking);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = probe(&executor, &spec, &session) => outcome,
        };

        let previous = status.send_replace(outcome);
        if previous != outcome && outcome == HealthStatus::Disconnected {
            tracing::warn!("Health probe to {} failed", session.target());
        }
    }
}

async fn probe(executor: &CommandExecutor, spec: &ProbeSpec, session: &Session) -> HealthStatus {
    match executor.run(session, &spec.command, spec.timeout).await {
        Ok(result) if result.stdout_text().contains(&spec.expected_token) => HealthStatus::Connected,
        Ok(result) => {
            tracing::debug!(
                "Probe output did not contain '{}': {:?}",
                spec.expected_token,
                result.combined_output()
            );
            HealthStatus::Disconnected
        }
        Err(e) => {
            tracing::debug!("Probe failed: {}", e);
            HealthStatus::Disconnected
        }
    }
}
