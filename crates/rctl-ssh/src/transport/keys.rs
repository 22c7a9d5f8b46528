//! Private key discovery for key-based authentication

use std::path::{Path, PathBuf};

use russh_keys::key::KeyPair;

use rctl_core::ConnectionError;

/// Key files tried, in order, when no identity file is configured
pub fn default_identity_files(home: &Path) -> Vec<PathBuf> {
    let ssh_dir = home.join(".ssh");
    ["id_ed25519", "id_rsa", "id_ecdsa"]
        .iter()
        .map(|name| ssh_dir.join(name))
        .collect()
}

/// Load the first usable private key
///
/// With an explicit path only that file is tried. Otherwise the default
/// key files under `~/.ssh` are tried in order. Passphrase-protected and
/// unreadable keys are skipped.
pub fn load_identity(explicit: Option<&Path>) -> Result<KeyPair, ConnectionError> {
    let candidates = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => dirs::home_dir()
            .map(|home| default_identity_files(&home))
            .unwrap_or_default(),
    };

    for path in &candidates {
        if !path.exists() {
            continue;
        }
        match russh_keys::load_secret_key(path, None) {
            Ok(key) => {
                tracing::debug!("Using private key {:?}", path);
                return Ok(key);
            }
            Err(e) => {
                tracing::debug!("Skipping private key {:?}: {}", path, e);
            }
        }
    }

    if let Some(path) = explicit {
        tracing::warn!("Configured identity file {:?} could not be loaded", path);
    }
    Err(ConnectionError::NoAuthMethod)
}
