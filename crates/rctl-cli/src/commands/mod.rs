//! CLI command implementations

mod config;
mod remote;
mod watch;

pub use config::{config_path, config_set, config_show, ConnectionUpdate};
pub use remote::{
    exec_command, info_command, power_command, restart_service_command, test_command,
    PowerAction,
};
pub use watch::watch_command;
