//! RemoteControl facade tests
//!
//! Each test gets its own temporary state directory and a scripted mock
//! connector.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use rctl_core::{
    AppSettings, CommandError, ConfigError, ConnectionConfig, ConnectionError, HealthStatus,
    RctlError,
};
use rctl_ssh::health::PROBE_COMMAND;
use rctl_ssh::mock::{MockConnector, MockReply, MockScript};
use rctl_ssh::service::TEST_COMMAND;
use rctl_ssh::sysinfo::{ARCH_COMMAND, HOSTNAME_COMMAND, OS_COMMAND, UPTIME_COMMAND};
use rctl_ssh::RemoteControl;

struct Fixture {
    _dir: TempDir,
    script: MockScript,
    connector: Arc<MockConnector>,
    control: RemoteControl,
}

fn fixture_with(connector: MockConnector, script: MockScript) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let settings = AppSettings::default().with_state_dir(dir.path());
    let connector = Arc::new(connector);
    let control = RemoteControl::new(settings, connector.clone());
    Fixture {
        _dir: dir,
        script,
        connector,
        control,
    }
}

fn fixture() -> Fixture {
    let script = MockScript::new();
    fixture_with(MockConnector::new(script.clone()), script)
}

#[tokio::test]
async fn test_save_then_load_round_trips() {
    let f = fixture();
    f.control
        .save_ssh_config("192.168.1.50", 2222, "pi", "raspberry")
        .await
        .unwrap();

    let loaded = f.control.load_ssh_config().unwrap();
    assert_eq!(
        loaded,
        ConnectionConfig::new("192.168.1.50", 2222, "pi", "raspberry")
    );
}

#[tokio::test]
async fn test_load_without_saved_config_gives_defaults() {
    let f = fixture();
    let loaded = f.control.load_ssh_config().unwrap();
    assert!(loaded.host.is_empty());
    assert_eq!(loaded.port, 22);
}

#[tokio::test]
async fn test_save_rejects_port_zero() {
    let f = fixture();
    let err = f
        .control
        .save_ssh_config("host", 0, "pi", "")
        .await
        .unwrap_err();
    assert!(matches!(err, RctlError::Config(ConfigError::Invalid(_))));
}

#[tokio::test]
async fn test_connection_test_reports_success_and_disconnects() {
    let f = fixture();
    f.script
        .on(TEST_COMMAND, MockReply::ok("Connection successful\n"));
    f.control
        .save_ssh_config("192.168.1.50", 22, "pi", "raspberry")
        .await
        .unwrap();

    let message = f.control.test_ssh_connection().await.unwrap();
    assert_eq!(message, "Connection successful");
    assert!(!f.control.is_connected());
}

#[tokio::test]
async fn test_wrong_password_is_auth_error() {
    let script = MockScript::new();
    let f = fixture_with(MockConnector::with_password(script.clone(), "raspberry"), script);
    f.control
        .save_ssh_config("192.168.1.50", 22, "pi", "wrong")
        .await
        .unwrap();

    let err = f.control.test_ssh_connection().await.unwrap_err();
    assert!(matches!(
        err,
        RctlError::Connection(ConnectionError::AuthenticationFailed { .. })
    ));
    assert!(!f.control.is_connected());
}

#[tokio::test]
async fn test_incomplete_config_is_validation_error() {
    let f = fixture();
    let err = f.control.execute_ssh_command("uptime").await.unwrap_err();
    assert!(matches!(
        err,
        RctlError::Connection(ConnectionError::Validation(_))
    ));
    assert_eq!(f.connector.connect_count(), 0);
}

#[tokio::test]
async fn test_execute_reuses_session_and_combines_output() {
    let f = fixture();
    f.script
        .on("df -h /", MockReply::output("Filesystem\n", "warning\n", 0));
    f.control
        .save_ssh_config("nas.local", 22, "admin", "")
        .await
        .unwrap();

    assert_eq!(
        f.control.execute_ssh_command("df -h /").await.unwrap(),
        "Filesystem\nwarning\n"
    );
    f.control.execute_ssh_command("df -h /").await.unwrap();
    assert_eq!(f.connector.connect_count(), 1);
    assert!(f.control.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_commands_share_one_connect() {
    let script = MockScript::new();
    script.on("work", MockReply::ok("done\n").after(Duration::from_millis(50)));
    let connector =
        MockConnector::new(script.clone()).with_connect_delay(Duration::from_millis(100));
    let f = fixture_with(connector, script);
    f.control
        .save_ssh_config("nas.local", 22, "admin", "")
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        f.control.execute_ssh_command("work"),
        f.control.execute_ssh_command("work")
    );

    assert_eq!(a.unwrap(), "done\n");
    assert_eq!(b.unwrap(), "done\n");
    assert_eq!(f.connector.connect_count(), 1);
    assert!(f.control.is_connected());
}

#[tokio::test]
async fn test_nonzero_exit_is_error_with_output() {
    let f = fixture();
    f.script
        .on("ls /nope", MockReply::output("", "No such file or directory\n", 2));
    f.control
        .save_ssh_config("nas.local", 22, "admin", "")
        .await
        .unwrap();

    let err = f.control.execute_ssh_command("ls /nope").await.unwrap_err();
    match err {
        RctlError::Command(CommandError::NonZeroExit { code, output }) => {
            assert_eq!(code, 2);
            assert!(output.contains("No such file"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_sudo_uses_password_then_retries_plain() {
    let f = fixture();
    f.script
        .on(
            "sudo -S systemctl restart nginx.service",
            MockReply::output("", "Sorry, try again.\n", 1),
        )
        .on("sudo systemctl restart nginx.service", MockReply::ok(""));
    f.control
        .save_ssh_config("web01", 22, "deploy", "s3cret")
        .await
        .unwrap();

    f.control.restart_service("nginx.service").await.unwrap();

    let requests = f.script.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].command, "sudo -S systemctl restart nginx.service");
    assert_eq!(requests[0].stdin.as_deref(), Some(&b"s3cret\n"[..]));
    assert_eq!(requests[1].command, "sudo systemctl restart nginx.service");
    assert!(requests[1].stdin.is_none());
}

#[tokio::test]
async fn test_invalid_unit_name_never_reaches_host() {
    let f = fixture();
    f.control
        .save_ssh_config("web01", 22, "deploy", "")
        .await
        .unwrap();

    let err = f
        .control
        .restart_service("nginx; reboot")
        .await
        .unwrap_err();
    assert!(matches!(err, RctlError::Command(CommandError::Invalid(_))));
    assert!(f.script.calls().is_empty());
}

#[tokio::test]
async fn test_power_off_falls_back_in_order() {
    let f = fixture();
    f.script
        .on(
            "sudo systemctl poweroff",
            MockReply::output("", "Failed to connect to bus\n", 1),
        )
        .on("sudo shutdown -h now", MockReply::ok(""));
    f.control
        .save_ssh_config("pi.local", 22, "pi", "")
        .await
        .unwrap();

    f.control.power_off().await.unwrap();
    assert_eq!(
        f.script.calls(),
        vec!["sudo systemctl poweroff", "sudo shutdown -h now"]
    );
}

#[tokio::test]
async fn test_reboot_all_failed_carries_last_error() {
    let f = fixture();
    for command in AppSettings::default().reboot_commands {
        f.script
            .on(command, MockReply::output("", "permission denied\n", 1));
    }
    f.control
        .save_ssh_config("pi.local", 22, "pi", "")
        .await
        .unwrap();

    let err = f.control.reboot().await.unwrap_err();
    match err {
        RctlError::Command(CommandError::AllFailed { attempts, last }) => {
            assert_eq!(attempts, 6);
            assert!(matches!(*last, CommandError::NonZeroExit { code: 1, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_system_info_tolerates_failed_probe() {
    let f = fixture();
    f.script
        .on(HOSTNAME_COMMAND, MockReply::ok("raspberrypi\n"))
        .on(OS_COMMAND, MockReply::ok("Linux\n"))
        .on(ARCH_COMMAND, MockReply::output("", "uname: not found\n", 127))
        .on(UPTIME_COMMAND, MockReply::ok("up 2 hours\n"));
    f.control
        .save_ssh_config("pi.local", 22, "pi", "")
        .await
        .unwrap();

    let info = f.control.get_remote_system_info().await.unwrap();
    assert_eq!(info.hostname.as_deref(), Some("raspberrypi"));
    assert_eq!(info.os.as_deref(), Some("Linux"));
    assert_eq!(info.arch, None);
    assert_eq!(info.uptime.as_deref(), Some("up 2 hours"));
}

#[tokio::test]
async fn test_saving_new_config_closes_session() {
    let f = fixture();
    f.control
        .save_ssh_config("pi.local", 22, "pi", "")
        .await
        .unwrap();
    f.control.execute_ssh_command("true").await.unwrap();
    assert!(f.control.is_connected());

    f.control
        .save_ssh_config("pi.local", 22, "root", "")
        .await
        .unwrap();
    assert!(!f.control.is_connected());
}

#[tokio::test]
async fn test_disconnect_twice() {
    let f = fixture();
    f.control
        .save_ssh_config("pi.local", 22, "pi", "")
        .await
        .unwrap();
    f.control.execute_ssh_command("true").await.unwrap();

    f.control.disconnect().await;
    f.control.disconnect().await;
    assert!(!f.control.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_reports_connected() {
    let f = fixture();
    f.script.on(PROBE_COMMAND, MockReply::ok("heartbeat\n"));
    f.control
        .save_ssh_config("pi.local", 22, "pi", "")
        .await
        .unwrap();

    let mut status = f.control.subscribe_health();
    f.control.start_heartbeat().await.unwrap();
    status
        .wait_for(|s| *s == HealthStatus::Connected)
        .await
        .unwrap();

    f.control.stop_heartbeat();
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(f.script.calls(), vec![PROBE_COMMAND]);
    assert_eq!(f.control.health_status(), HealthStatus::Connected);
}
