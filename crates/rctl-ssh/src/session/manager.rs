//! Session manager
//!
//! Owns at most one live session. Connect and disconnect are serialized by
//! a lifecycle lock; reads of the active slot never wait on it.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use rctl_core::traits::Connector;
use rctl_core::{ConnectionConfig, ConnectionError};

use super::Session;

/// Manages the single active session
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    /// The active session, if any
    active: RwLock<Option<Session>>,
    /// Serializes connect/disconnect
    lifecycle: Mutex<()>,
}

impl SessionManager {
    /// Create a session manager that opens connections with `connector`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            active: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Open a new session, replacing the active one
    ///
    /// The previous session is closed before the new handshake starts. On
    /// failure no session is left active.
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<Session, ConnectionError> {
        config.validate()?;

        let _guard = self.lifecycle.lock().await;
        self.replace(config).await
    }

    /// The active session, or a new one when there is none
    ///
    /// Callers racing here share one connect; none of them replaces a
    /// session another caller is already using.
    pub async fn get_or_connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Session, ConnectionError> {
        if let Some(session) = self.active_session() {
            return Ok(session);
        }
        config.validate()?;

        let _guard = self.lifecycle.lock().await;
        if let Some(session) = self.active_session() {
            return Ok(session);
        }

        tracing::debug!("No active session, connecting to {}", config.target());
        self.replace(config).await
    }

    /// Swap in a new session; the caller holds the lifecycle lock
    async fn replace(&self, config: &ConnectionConfig) -> Result<Session, ConnectionError> {
        let previous = self.active.write().take();
        if let Some(previous) = previous {
            tracing::info!(
                session = %previous.id().short(),
                "Replacing session to {}",
                previous.target()
            );
            previous.close().await;
        }

        let transport = self.connector.connect(config).await?;
        let session = Session::new(transport, config.target());
        *self.active.write() = Some(session.clone());

        tracing::info!(session = %session.id().short(), "Session open to {}", session.target());
        Ok(session)
    }

    /// Close the active session; does nothing when there is none
    pub async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;

        let previous = self.active.write().take();
        match previous {
            Some(session) => session.close().await,
            None => tracing::debug!("Disconnect requested with no active session"),
        }
    }

    /// Whether a live session exists
    pub fn is_connected(&self) -> bool {
        self.active
            .read()
            .as_ref()
            .map(Session::is_alive)
            .unwrap_or(false)
    }

    /// The active session, if it is still alive
    pub fn active_session(&self) -> Option<Session> {
        self.active.read().as_ref().filter(|s| s.is_alive()).cloned()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("active", &*self.active.read())
            .finish()
    }
}
