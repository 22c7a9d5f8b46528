//! Persistent storage for the connection record
//!
//! The record is a TOML file. The secret never touches disk in clear text:
//! it is sealed with AES-256-GCM under a random 32-byte key kept in a
//! separate file, and stored as hex `nonce || ciphertext || tag`.

use std::io::Write;
use std::path::{Path, PathBuf};

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::{self, AppSettings, ConnectionConfig};
use crate::error::ConfigError;

const KEY_LEN: usize = 32;

/// On-disk shape of a [`ConnectionConfig`]
#[derive(Debug, Serialize, Deserialize)]
struct StoredConnection {
    host: String,
    port: u16,
    username: String,
    /// Sealed secret, empty when no password is set
    #[serde(default)]
    secret: String,
    identity_file: Option<PathBuf>,
    host_key_fingerprint: Option<String>,
}

/// Saves and loads the single connection record
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    key_path: PathBuf,
}

impl CredentialStore {
    /// Create a store backed by the given record and key files
    pub fn new(path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key_path: key_path.into(),
        }
    }

    /// Create a store at the locations named in the settings
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(&settings.credentials_path, &settings.key_path)
    }

    /// Path of the connection record
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a record has been saved
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist the connection record, replacing any previous one
    pub fn save(&self, connection: &ConnectionConfig) -> Result<(), ConfigError> {
        if connection.port == 0 {
            return Err(ConfigError::Invalid(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        let secret = if connection.has_password() {
            let key = self.load_or_create_key()?;
            seal(&key, connection.secret.expose_secret().as_bytes())?
        } else {
            String::new()
        };

        let stored = StoredConnection {
            host: connection.host.clone(),
            port: connection.port,
            username: connection.username.clone(),
            secret,
            identity_file: connection.identity_file.clone(),
            host_key_fingerprint: connection.host_key_fingerprint.clone(),
        };

        let content = toml::to_string_pretty(&stored)?;
        write_private(&self.path, content.as_bytes())?;

        tracing::info!(
            "Saved connection settings for {}",
            connection.target()
        );
        Ok(())
    }

    /// Load the connection record
    ///
    /// Returns the empty default (port 22) when nothing has been saved yet.
    pub fn load(&self) -> Result<ConnectionConfig, ConfigError> {
        let stored: StoredConnection = match config::load_config(&self.path) {
            Ok(stored) => stored,
            Err(ConfigError::NotFound(_)) => {
                tracing::debug!("No stored connection at {:?}, using defaults", self.path);
                return Ok(ConnectionConfig::default());
            }
            Err(e) => return Err(e),
        };

        let secret = if stored.secret.is_empty() {
            String::new()
        } else {
            let key = self.read_key()?;
            open(&key, &stored.secret)?
        };

        Ok(ConnectionConfig {
            host: stored.host,
            port: stored.port,
            username: stored.username,
            secret: SecretString::new(secret),
            identity_file: stored.identity_file,
            host_key_fingerprint: stored.host_key_fingerprint,
        })
    }

    /// Remove the stored record (the key file is kept)
    pub fn clear(&self) -> Result<(), ConfigError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfigError::Invalid(format!(
                "Failed to remove {:?}: {}",
                self.path, e
            ))),
        }
    }

    fn read_key(&self) -> Result<[u8; KEY_LEN], ConfigError> {
        let bytes = std::fs::read(&self.key_path).map_err(|e| {
            ConfigError::Crypto(format!("cannot read key {:?}: {}", self.key_path, e))
        })?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| ConfigError::Crypto(format!("key {:?} has wrong length", self.key_path)))
    }

    fn load_or_create_key(&self) -> Result<[u8; KEY_LEN], ConfigError> {
        if self.key_path.exists() {
            return self.read_key();
        }

        let mut key = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| ConfigError::Crypto("failed to generate key".to_string()))?;
        write_private(&self.key_path, &key)?;

        tracing::debug!("Generated credential key at {:?}", self.key_path);
        Ok(key)
    }
}

fn cipher(key: &[u8; KEY_LEN]) -> Result<LessSafeKey, ConfigError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| ConfigError::Crypto("failed to create key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String, ConfigError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| ConfigError::Crypto("failed to generate nonce".to_string()))?;

    let mut in_out = plaintext.to_vec();
    cipher(key)?
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| ConfigError::Crypto("encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(hex::encode(out))
}

fn open(key: &[u8; KEY_LEN], sealed: &str) -> Result<String, ConfigError> {
    let data = hex::decode(sealed)
        .map_err(|e| ConfigError::Crypto(format!("stored secret is not hex: {}", e)))?;
    if data.len() < NONCE_LEN + AES_256_GCM.tag_len() {
        return Err(ConfigError::Crypto("stored secret is truncated".to_string()));
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(nonce_bytes);

    let mut in_out = ciphertext.to_vec();
    let plaintext = cipher(key)?
        .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
        .map_err(|_| ConfigError::Crypto("stored secret failed authentication".to_string()))?;

    String::from_utf8(plaintext.to_vec())
        .map_err(|_| ConfigError::Crypto("stored secret is not UTF-8".to_string()))
}

/// Write a file readable only by the owner
fn write_private(path: &Path, contents: &[u8]) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to open {:?}: {}", path, e)))?;
    // mode() only applies to new files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| ConfigError::Invalid(format!("Failed to restrict {:?}: {}", path, e)))?;
    }
    file.write_all(contents)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write {:?}: {}", path, e)))?;
    Ok(())
}
