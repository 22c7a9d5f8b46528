//! rctl CLI
//!
//! Remote control for a single host over SSH:
//! - Connection settings (config set/show/path)
//! - One-off commands and system info
//! - Power and service operations
//! - Health watching

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rctl_cli::commands::{self, ConnectionUpdate, PowerAction};
use rctl_cli::output::print_error;
use rctl_core::config::{self, AppSettings};
use rctl_ssh::RemoteControl;

#[derive(Parser)]
#[command(name = "rctl")]
#[command(author, version, about = "Remote control for a host over SSH")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the saved connection and its key
    #[arg(long, global = true, env = "RCTL_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the saved connection
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check that the saved connection works
    Test,

    /// Run a command on the remote host
    Exec {
        /// Command line, passed to the remote shell
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Show hostname, OS, architecture and uptime
    Info {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Power off the remote host
    #[command(alias = "poweroff")]
    Shutdown {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Reboot the remote host
    Reboot {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Suspend the remote host
    Suspend {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Restart a systemd unit
    RestartService {
        /// Unit name, e.g. nginx.service
        unit: String,
    },

    /// Probe the connection periodically and report changes
    Watch {
        /// Seconds between probes (overrides settings)
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Save connection settings; omitted fields keep their saved value
    Set {
        /// Host name or address
        #[arg(long)]
        host: Option<String>,
        /// SSH port
        #[arg(short, long)]
        port: Option<u16>,
        /// Login user (defaults to the local user)
        #[arg(short, long)]
        user: Option<String>,
        /// Password; an empty value switches to key authentication
        #[arg(long, env = "RCTL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Private key used when no password is set
        #[arg(short, long)]
        identity_file: Option<PathBuf>,
        /// Expected server key fingerprint (SHA256:...)
        #[arg(long)]
        host_key: Option<String>,
    },
    /// Show the saved connection
    Show,
    /// Show settings and credential file paths
    Path,
}

fn load_settings(cli: &Cli) -> Result<(AppSettings, PathBuf)> {
    let path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut settings: AppSettings = config::load_config_or_default(&path)
        .with_context(|| format!("Failed to load settings from {:?}", path))?;

    if let Some(dir) = &cli.state_dir {
        settings = settings.with_state_dir(dir);
    }
    if let Commands::Watch {
        interval: Some(secs),
    } = &cli.command
    {
        settings.heartbeat_interval = Duration::from_secs(*secs);
    }
    Ok((settings, path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let (settings, settings_path) = load_settings(&cli)?;
    let control = RemoteControl::with_russh(settings);

    let result = run(cli.command, &control, &settings_path).await;
    control.disconnect().await;

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands, control: &RemoteControl, settings_path: &std::path::Path) -> Result<()> {
    match command {
        Commands::Config { action } => match action {
            ConfigAction::Set {
                host,
                port,
                user,
                password,
                identity_file,
                host_key,
            } => {
                let update = ConnectionUpdate {
                    host,
                    port,
                    username: user,
                    password,
                    identity_file,
                    host_key_fingerprint: host_key,
                };
                commands::config_set(control, update).await?;
            }
            ConfigAction::Show => {
                commands::config_show(control)?;
            }
            ConfigAction::Path => {
                commands::config_path(control, settings_path);
            }
        },

        Commands::Test => commands::test_command(control).await?,

        Commands::Exec { command } => commands::exec_command(control, &command).await?,

        Commands::Info { json } => commands::info_command(control, json).await?,

        Commands::Shutdown { yes } => {
            commands::power_command(control, PowerAction::PowerOff, yes).await?
        }

        Commands::Reboot { yes } => commands::power_command(control, PowerAction::Reboot, yes).await?,

        Commands::Suspend { yes } => {
            commands::power_command(control, PowerAction::Suspend, yes).await?
        }

        Commands::RestartService { unit } => {
            commands::restart_service_command(control, &unit).await?
        }

        Commands::Watch { .. } => commands::watch_command(control).await?,
    }

    Ok(())
}
