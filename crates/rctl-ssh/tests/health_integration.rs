//! Health monitor integration tests

use std::sync::Arc;
use std::time::Duration;

use rctl_core::{ConnectionConfig, HealthStatus};
use rctl_ssh::health::PROBE_COMMAND;
use rctl_ssh::mock::{MockConnector, MockReply, MockScript};
use rctl_ssh::{CommandExecutor, HealthMonitor, ProbeSpec, Session, SessionManager};

async fn connect(script: &MockScript) -> (SessionManager, Session) {
    let manager = SessionManager::new(Arc::new(MockConnector::new(script.clone())));
    let session = manager
        .connect(&ConnectionConfig::new("10.0.0.8", 22, "admin", "pw"))
        .await
        .unwrap();
    (manager, session)
}

fn monitor() -> HealthMonitor {
    HealthMonitor::new(CommandExecutor::default(), ProbeSpec::default())
}

#[tokio::test(start_paused = true)]
async fn test_first_probe_runs_immediately() {
    let script = MockScript::new();
    script.on(PROBE_COMMAND, MockReply::ok("heartbeat\n"));
    let (_manager, session) = connect(&script).await;
    let monitor = monitor();
    let mut status = monitor.subscribe();

    monitor.start(session, Duration::from_secs(30));
    assert_eq!(monitor.current_status(), HealthStatus::Checking);

    status
        .wait_for(|s| *s == HealthStatus::Connected)
        .await
        .unwrap();
    assert_eq!(script.calls(), vec![PROBE_COMMAND]);
}

#[tokio::test(start_paused = true)]
async fn test_unexpected_output_turns_disconnected() {
    let script = MockScript::new();
    script.on(PROBE_COMMAND, MockReply::ok("heartbeat\n"));
    let (_manager, session) = connect(&script).await;
    let monitor = monitor();

    monitor.start(session, Duration::from_secs(30));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(monitor.current_status(), HealthStatus::Connected);

    script.on(PROBE_COMMAND, MockReply::ok("-bash: echo: write error\n"));
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(monitor.current_status(), HealthStatus::Disconnected);
    assert_eq!(script.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_closed_session_turns_disconnected() {
    let script = MockScript::new();
    script.on(PROBE_COMMAND, MockReply::ok("heartbeat\n"));
    let (manager, session) = connect(&script).await;
    let monitor = monitor();

    monitor.start(session, Duration::from_secs(30));
    tokio::time::sleep(Duration::from_secs(1)).await;
    manager.disconnect().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(monitor.current_status(), HealthStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_schedule() {
    let script = MockScript::new();
    script.on(PROBE_COMMAND, MockReply::ok("heartbeat\n"));
    let (_manager, session) = connect(&script).await;
    let monitor = monitor();

    monitor.start(session, Duration::from_secs(30));
    tokio::time::sleep(Duration::from_secs(1)).await;
    monitor.stop();
    monitor.stop();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(script.calls().len(), 1);
    assert!(!monitor.is_running());
    assert_eq!(monitor.current_status(), HealthStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_schedule() {
    let script = MockScript::new();
    script.on(PROBE_COMMAND, MockReply::ok("heartbeat\n"));
    let (_manager, session) = connect(&script).await;
    let monitor = monitor();

    monitor.start(session.clone(), Duration::from_secs(30));
    tokio::time::sleep(Duration::from_secs(1)).await;
    monitor.start(session, Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(script.calls().len(), 2);

    // Only the 60s schedule remains
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(script.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hung_probe_times_out() {
    let script = MockScript::new();
    script.on(PROBE_COMMAND, MockReply::Hang);
    let (_manager, session) = connect(&script).await;
    let monitor = HealthMonitor::new(
        CommandExecutor::default(),
        ProbeSpec {
            timeout: Duration::from_secs(10),
            ..ProbeSpec::default()
        },
    );

    monitor.start(session, Duration::from_secs(30));
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(monitor.current_status(), HealthStatus::Disconnected);
}
