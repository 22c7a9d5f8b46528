//! SSH session handle and the single-slot session manager

mod manager;

pub use manager::SessionManager;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use rctl_core::traits::Transport;
use rctl_core::SessionId;

/// Handle to one authenticated connection
///
/// Cloning is cheap; every clone refers to the same connection. Commands run
/// through a session are queued on its execution lock, so at most one
/// channel is in use at a time.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: SessionId,
    target: String,
    transport: Box<dyn Transport>,
    /// Serializes command execution
    exec_lock: Mutex<()>,
    /// Cancelled when the session is closed or found dead
    closed: CancellationToken,
    opened_at: Instant,
}

impl Session {
    /// Wrap a connected transport
    pub fn new(transport: Box<dyn Transport>, target: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: SessionId::new(),
                target: target.into(),
                transport,
                exec_lock: Mutex::new(()),
                closed: CancellationToken::new(),
                opened_at: Instant::now(),
            }),
        }
    }

    /// Unique ID of this session
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// `user@host:port` of the remote end
    pub fn target(&self) -> &str {
        &self.inner.target
    }

    /// Whether the session can still run commands
    pub fn is_alive(&self) -> bool {
        !self.inner.closed.is_cancelled() && !self.inner.transport.is_closed()
    }

    /// Time since the session was opened
    pub fn uptime(&self) -> Duration {
        self.inner.opened_at.elapsed()
    }

    /// Whether two handles refer to the same connection
    pub fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn closed_token(&self) -> &CancellationToken {
        &self.inner.closed
    }

    pub(crate) fn exec_lock(&self) -> &Mutex<()> {
        &self.inner.exec_lock
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    /// Flag the session dead after a fatal transport error
    pub(crate) fn mark_dead(&self) {
        if !self.inner.closed.is_cancelled() {
            tracing::warn!(session = %self.inner.id.short(), "Session to {} is dead", self.inner.target);
            self.inner.closed.cancel();
        }
    }

    /// Close the connection and fail every queued or running command
    pub async fn close(&self) {
        self.inner.closed.cancel();
        self.inner.transport.close().await;
        tracing::debug!(
            session = %self.inner.id.short(),
            "Session to {} closed after {:?}",
            self.inner.target,
            self.uptime()
        );
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("target", &self.inner.target)
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockScript, MockTransport};

    #[tokio::test]
    async fn test_close_cancels_token() {
        let session = Session::new(Box::new(MockTransport::new(MockScript::new())), "pi@host:22");
        assert!(session.is_alive());

        let clone = session.clone();
        session.close().await;

        assert!(!clone.is_alive());
        assert!(clone.closed_token().is_cancelled());
        assert!(clone.same_as(&session));
    }

    #[tokio::test]
    async fn test_mark_dead() {
        let session = Session::new(Box::new(MockTransport::new(MockScript::new())), "pi@host:22");
        session.mark_dead();
        assert!(!session.is_alive());
    }
}
