//! Config command implementations

use std::path::PathBuf;

use anyhow::{Context, Result};
use secrecy::SecretString;

use rctl_ssh::RemoteControl;

use crate::output::{format_connection, print_info, print_success, print_warning};

/// Fields given to `config set`; unset fields keep their stored value
#[derive(Default)]
pub struct ConnectionUpdate {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub host_key_fingerprint: Option<String>,
}

/// Merge `update` into the stored connection record and save it
pub async fn config_set(control: &RemoteControl, update: ConnectionUpdate) -> Result<()> {
    let mut config = control
        .load_ssh_config()
        .context("Failed to load stored connection")?;

    if let Some(host) = update.host {
        config.host = host.trim().to_string();
    }
    if let Some(port) = update.port {
        config.port = port;
    }
    match update.username {
        Some(username) => config.username = username.trim().to_string(),
        None if config.username.is_empty() => config.username = whoami::username(),
        None => {}
    }
    if let Some(password) = update.password {
        config.secret = SecretString::new(password);
    }
    if let Some(path) = update.identity_file {
        config.identity_file = Some(path);
    }
    if let Some(fingerprint) = update.host_key_fingerprint {
        config.host_key_fingerprint = Some(fingerprint);
    }

    control
        .save_connection(&config)
        .await
        .context("Failed to save connection")?;

    print_success(&format!("Saved connection {}", config.target()));
    if config.host.is_empty() {
        print_warning("No host set yet; use --host");
    }
    Ok(())
}

/// Show the stored connection record
pub fn config_show(control: &RemoteControl) -> Result<()> {
    let store = control.store();
    if !store.exists() {
        print_warning(&format!("No saved connection at {:?}", store.path()));
        print_info("Run 'rctl config set --host <HOST> --user <USER>' to create one");
    }

    let config = control
        .load_ssh_config()
        .context("Failed to load stored connection")?;
    println!("{}", format_connection(&config));
    Ok(())
}

/// Print where settings and credentials live
pub fn config_path(control: &RemoteControl, settings_path: &std::path::Path) {
    println!("settings:    {}", settings_path.display());
    println!("credentials: {}", control.store().path().display());
    println!("key:         {}", control.settings().key_path.display());
}
