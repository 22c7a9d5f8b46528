//! rctl-core: Core abstractions and configuration for rctl
//!
//! This crate provides the shared types, error taxonomy, configuration
//! structures, credential storage and transport traits used by the SSH
//! session core and the CLI.

pub mod config;
pub mod credentials;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{AppSettings, ConnectionConfig};
pub use credentials::CredentialStore;
pub use error::{CommandError, ConfigError, ConnectionError, RctlError};
pub use types::{CommandResult, HealthStatus, RemoteSystemInfo, SessionId};
