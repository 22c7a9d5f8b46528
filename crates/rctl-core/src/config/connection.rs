//! Connection parameters for the remote host

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConnectionError;

/// Port used when nothing else is configured
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Everything needed to open a session to the remote host
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Host name or address
    pub host: String,

    /// SSH port
    pub port: u16,

    /// Login user
    pub username: String,

    /// Password; empty means key-based authentication
    pub secret: SecretString,

    /// Private key tried when the secret is empty
    pub identity_file: Option<PathBuf>,

    /// Expected server key fingerprint (`SHA256:...`); unset accepts any key
    pub host_key_fingerprint: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_SSH_PORT,
            username: String::new(),
            secret: SecretString::new(String::new()),
            identity_file: None,
            host_key_fingerprint: None,
        }
    }
}

impl PartialEq for ConnectionConfig {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.username == other.username
            && self.secret.expose_secret() == other.secret.expose_secret()
            && self.identity_file == other.identity_file
            && self.host_key_fingerprint == other.host_key_fingerprint
    }
}

impl Eq for ConnectionConfig {}

impl ConnectionConfig {
    /// Create a password-authenticated config
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            secret: SecretString::new(secret.into()),
            ..Self::default()
        }
    }

    /// Set the private key used when no password is configured
    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Pin the expected server key fingerprint
    pub fn with_host_key_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.host_key_fingerprint = Some(fingerprint.into());
        self
    }

    /// Whether password authentication should be used
    pub fn has_password(&self) -> bool {
        !self.secret.expose_secret().is_empty()
    }

    /// `user@host:port`, used in logs and messages
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    /// Check the fields required before a connect attempt
    pub fn validate(&self) -> Result<(), ConnectionError> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("host");
        }
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if !missing.is_empty() {
            return Err(ConnectionError::Validation(format!(
                "missing {}",
                missing.join(" and ")
            )));
        }
        if self.port == 0 {
            return Err(ConnectionError::Validation(
                "port must be between 1 and 65535".to_string(),
            ));
        }
        Ok(())
    }
}
