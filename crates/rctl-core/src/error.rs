//! Core error types for rctl

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the rctl ecosystem
#[derive(Error, Debug)]
pub enum RctlError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Command error
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while establishing a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// A required connection field is missing or out of range
    #[error("Invalid connection settings: {0}")]
    Validation(String),

    /// The server rejected every authentication attempt
    #[error("Authentication failed for {user}@{host}")]
    AuthenticationFailed { user: String, host: String },

    /// No password was configured and no private key could be loaded
    #[error("No authentication method available: set a password or an SSH key")]
    NoAuthMethod,

    /// Unreachable host or failed handshake
    #[error("Network error: {0}")]
    Network(String),

    /// Handshake did not finish within the connect timeout
    #[error("Connection to {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    /// Server key did not match the pinned fingerprint
    #[error("Host key verification failed: expected {expected}")]
    HostKeyRejected { expected: String },
}

impl ConnectionError {
    /// Whether this error came from credentials rather than the network
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ConnectionError::AuthenticationFailed { .. } | ConnectionError::NoAuthMethod
        )
    }
}

/// Errors raised while running a command on a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No session is open
    #[error("Not connected")]
    NotConnected,

    /// The session was closed while the command was queued or running
    #[error("Session disconnected while command was in flight")]
    Disconnected,

    /// The command exceeded its deadline
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed mid-command
    #[error("Transport error: {0}")]
    Transport(String),

    /// The command completed with a non-zero exit status
    #[error("Command exited with status {code}: {output}")]
    NonZeroExit { code: i32, output: String },

    /// A fallback list was exhausted
    #[error("All {attempts} commands failed, last error: {last}")]
    AllFailed {
        attempts: usize,
        last: Box<CommandError>,
    },

    /// A fallback list was empty
    #[error("No commands to run")]
    NoCommands,

    /// The command was refused before reaching the remote host
    #[error("Invalid command: {0}")]
    Invalid(String),
}

impl CommandError {
    /// Whether the session that produced this error should be considered dead
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::Transport(_) | CommandError::Disconnected)
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Sealing or opening the stored secret failed
    #[error("Credential encryption error: {0}")]
    Crypto(String),
}
