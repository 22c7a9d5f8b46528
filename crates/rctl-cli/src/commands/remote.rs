//! Commands that talk to the remote host

use std::io::Write;

use anyhow::{Context, Result};

use rctl_core::{CommandError, RctlError};
use rctl_ssh::RemoteControl;

use crate::output::{format_system_info, print_info, print_success, print_warning};

/// What a power command should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    PowerOff,
    Reboot,
    Suspend,
}

impl PowerAction {
    fn verb(self) -> &'static str {
        match self {
            PowerAction::PowerOff => "shut down",
            PowerAction::Reboot => "reboot",
            PowerAction::Suspend => "suspend",
        }
    }
}

/// Connect with the stored settings and run a trivial command
pub async fn test_command(control: &RemoteControl) -> Result<()> {
    let target = control.load_ssh_config()?.target();
    print_info(&format!("Testing connection to {}...", target));

    let message = control
        .test_ssh_connection()
        .await
        .with_context(|| format!("Connection test to {} failed", target))?;
    print_success(&message);
    Ok(())
}

/// Run a command and print its output
pub async fn exec_command(control: &RemoteControl, command: &[String]) -> Result<()> {
    let command = command.join(" ");
    match control.execute_ssh_command(&command).await {
        Ok(output) => {
            print!("{}", output);
            std::io::stdout().flush()?;
            Ok(())
        }
        Err(RctlError::Command(CommandError::NonZeroExit { code, output })) => {
            print!("{}", output);
            std::io::stdout().flush()?;
            anyhow::bail!("Remote command exited with status {}", code)
        }
        Err(e) => Err(e.into()),
    }
}

/// Print hostname, OS, architecture and uptime
pub async fn info_command(control: &RemoteControl, json: bool) -> Result<()> {
    let info = control.get_remote_system_info().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("{}", format_system_info(&info));
    }
    Ok(())
}

/// Shut down, reboot or suspend the remote host
pub async fn power_command(control: &RemoteControl, action: PowerAction, yes: bool) -> Result<()> {
    let target = control.load_ssh_config()?.target();

    if !yes {
        print_warning(&format!(
            "About to {} {}. Use --yes to skip confirmation.",
            action.verb(),
            target
        ));

        print!("Continue? [y/N] ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            print_warning("Aborted");
            return Ok(());
        }
    }

    let output = match action {
        PowerAction::PowerOff => control.power_off().await,
        PowerAction::Reboot => control.reboot().await,
        PowerAction::Suspend => control.suspend().await,
    }
    .with_context(|| format!("Failed to {} {}", action.verb(), target))?;

    if !output.trim().is_empty() {
        print!("{}", output);
    }
    print_success(&format!("Sent {} to {}", action.verb(), target));
    Ok(())
}

/// Restart a systemd unit on the remote host
pub async fn restart_service_command(control: &RemoteControl, unit: &str) -> Result<()> {
    let output = control.restart_service(unit).await?;
    if !output.trim().is_empty() {
        print!("{}", output);
    }
    print_success(&format!("Restarted {}", unit));
    Ok(())
}
