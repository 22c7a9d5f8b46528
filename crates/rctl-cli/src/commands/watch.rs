//! Watch command implementation

use anyhow::Result;

use rctl_ssh::RemoteControl;

use crate::output::{print_health, print_info};

/// Probe the remote host on the heartbeat cadence until Ctrl-C
pub async fn watch_command(control: &RemoteControl) -> Result<()> {
    let target = control.load_ssh_config()?.target();
    let mut status = control.subscribe_health();

    control.start_heartbeat().await?;
    print_info(&format!(
        "Watching {} every {:?} (Ctrl-C to stop)",
        target,
        control.settings().heartbeat_interval
    ));

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                print_health(&target, current);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Interrupted");
                break;
            }
        }
    }

    control.stop_heartbeat();
    Ok(())
}
