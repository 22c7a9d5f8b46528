//! russh-backed connector and transport
//!
//! Establishes one authenticated SSH connection per [`RusshConnector::connect`]
//! call and runs each command on its own session channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use secrecy::ExposeSecret;
use tokio::sync::Mutex;

use rctl_core::traits::{Connector, ExecOutput, ExecRequest, Transport};
use rctl_core::{AppSettings, CommandError, ConnectionConfig, ConnectionError};

use super::{append_capped, keys};

/// SSH extended data type for stderr (RFC 4254 §5.2)
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Shell convention for a process killed by a signal whose number is unknown
const EXIT_SIGNALLED: i32 = 128;

/// Opens SSH connections with russh
#[derive(Debug, Clone)]
pub struct RusshConnector {
    /// Limit for TCP connect plus handshake
    connect_timeout: Duration,
}

impl RusshConnector {
    /// Create a connector with the given handshake timeout
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Create a connector from application settings
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(settings.connect_timeout)
    }
}

impl Default for RusshConnector {
    fn default() -> Self {
        Self::from_settings(&AppSettings::default())
    }
}

#[async_trait]
impl Connector for RusshConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Transport>, ConnectionError> {
        config.validate()?;

        let target = config.target();
        let ssh_config = Arc::new(Config::default());
        let handler = ClientHandler::new(config.host_key_fingerprint.clone());

        tracing::debug!("Connecting to {}", target);
        let started = tokio::time::Instant::now();
        let mut handle = tokio::time::timeout(
            self.connect_timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| ConnectionError::Timeout {
            target: target.clone(),
            timeout: self.connect_timeout,
        })?
        .map_err(|e| match (&e, &config.host_key_fingerprint) {
            (russh::Error::UnknownKey, Some(expected)) => ConnectionError::HostKeyRejected {
                expected: expected.clone(),
            },
            _ => ConnectionError::Network(format!("Failed to connect to {}: {}", target, e)),
        })?;

        // Authentication shares the connect budget
        let remaining = self.connect_timeout.saturating_sub(started.elapsed());
        let attempt = tokio::time::timeout(remaining, authenticate(&mut handle, config)).await;
        let authenticated = match attempt {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!("Authentication to {} timed out", target);
                let _ = handle
                    .disconnect(Disconnect::ByApplication, "authentication timed out", "en")
                    .await;
                return Err(ConnectionError::Timeout {
                    target,
                    timeout: self.connect_timeout,
                });
            }
        };

        if !authenticated {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return Err(ConnectionError::AuthenticationFailed {
                user: config.username.clone(),
                host: config.host.clone(),
            });
        }

        tracing::info!("Connected to {}", target);
        Ok(Box::new(RusshTransport::new(handle, target)))
    }
}

/// Try the configured credentials; `Ok(false)` if the server refuses them
async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    config: &ConnectionConfig,
) -> Result<bool, ConnectionError> {
    tracing::debug!("Authenticating as user '{}'", config.username);
    let outcome = if config.has_password() {
        handle
            .authenticate_password(
                config.username.clone(),
                config.secret.expose_secret().clone(),
            )
            .await
    } else {
        let key = keys::load_identity(config.identity_file.as_deref())?;
        handle
            .authenticate_publickey(config.username.clone(), Arc::new(key))
            .await
    };
    outcome.map_err(|e| ConnectionError::Network(format!("Authentication exchange failed: {}", e)))
}

/// An authenticated russh connection
pub struct RusshTransport {
    /// SSH session handle
    handle: Mutex<Handle<ClientHandler>>,
    /// Set once the connection is known to be gone
    closed: AtomicBool,
    /// `user@host:port` for log lines
    target: String,
}

impl RusshTransport {
    fn new(handle: Handle<ClientHandler>, target: String) -> Self {
        Self {
            handle: Mutex::new(handle),
            closed: AtomicBool::new(false),
            target,
        }
    }

    async fn open_channel(&self) -> Result<Channel<Msg>, CommandError> {
        let handle = self.handle.lock().await;
        match handle.channel_open_session().await {
            Ok(channel) => Ok(channel),
            Err(e) => {
                // The server refusing a channel leaves the connection intact;
                // anything else means the connection itself is gone.
                if !matches!(e, russh::Error::ChannelOpenFailure(_)) {
                    self.closed.store(true, Ordering::SeqCst);
                    tracing::warn!("Connection to {} lost: {}", self.target, e);
                }
                Err(CommandError::Transport(format!(
                    "Failed to open channel: {}",
                    e
                )))
            }
        }
    }
}

#[async_trait]
impl Transport for RusshTransport {
    async fn exec(&self, request: &ExecRequest) -> Result<ExecOutput, CommandError> {
        if self.is_closed() {
            return Err(CommandError::NotConnected);
        }

        let mut channel = ChannelGuard::new(self.open_channel().await?);
        let result = drive_channel(channel.get(), request).await;
        channel.release().await;
        result
    }

    fn is_closed(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return true;
        }
        // A busy handle is in use, so the connection was up a moment ago
        match self.handle.try_lock() {
            Ok(handle) if handle.is_closed() => {
                self.closed.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = self.handle.lock().await;
        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "closing", "en")
            .await
        {
            tracing::debug!("Disconnect from {} failed: {}", self.target, e);
        }
        tracing::info!("Disconnected from {}", self.target);
    }
}

/// Run one command on an open channel and collect its output
async fn drive_channel(
    channel: &mut Channel<Msg>,
    request: &ExecRequest,
) -> Result<ExecOutput, CommandError> {
    channel
        .exec(true, request.command.as_str())
        .await
        .map_err(|e| CommandError::Transport(format!("Failed to start command: {}", e)))?;

    if let Some(stdin) = &request.stdin {
        channel
            .data(stdin.as_slice())
            .await
            .map_err(|e| CommandError::Transport(format!("Failed to write stdin: {}", e)))?;
        channel
            .eof()
            .await
            .map_err(|e| CommandError::Transport(format!("Failed to close stdin: {}", e)))?;
    }

    let limit = request.max_output_bytes;
    let mut output = ExecOutput::default();
    let mut exit_code = None;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { ref data }) => {
                output.truncated |= append_capped(&mut output.stdout, data, limit);
            }
            Some(ChannelMsg::ExtendedData { ref data, ext }) if ext == SSH_EXTENDED_DATA_STDERR => {
                output.truncated |= append_capped(&mut output.stderr, data, limit);
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                exit_code = Some(exit_status as i32);
            }
            Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                tracing::debug!("Remote command terminated by signal {:?}", signal_name);
                exit_code = Some(EXIT_SIGNALLED);
            }
            Some(ChannelMsg::Close) | None => break,
            Some(_) => {}
        }
    }

    match exit_code {
        Some(code) => {
            output.exit_code = code;
            Ok(output)
        }
        None => Err(CommandError::Transport(
            "Channel closed before the command reported an exit status".to_string(),
        )),
    }
}

/// Owns a channel and guarantees it is closed on every exit path
///
/// The normal path awaits [`ChannelGuard::release`]. If the owning future is
/// dropped first (timeout, disconnect), `Drop` hands the close to the runtime.
struct ChannelGuard {
    channel: Option<Channel<Msg>>,
}

impl ChannelGuard {
    fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    fn get(&mut self) -> &mut Channel<Msg> {
        self.channel
            .as_mut()
            .unwrap_or_else(|| unreachable!("channel used after release"))
    }

    async fn release(mut self) {
        if let Some(channel) = self.channel.take() {
            let _ = channel.close().await;
        }
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    let _ = channel.close().await;
                });
            }
        }
    }
}

/// SSH client handler
struct ClientHandler {
    /// Pinned server key fingerprint, if any
    expected_fingerprint: Option<String>,
}

impl ClientHandler {
    fn new(expected_fingerprint: Option<String>) -> Self {
        Self {
            expected_fingerprint,
        }
    }
}

/// Strip the optional `SHA256:` prefix so both spellings compare equal
fn normalize_fingerprint(fingerprint: &str) -> &str {
    fingerprint
        .trim()
        .strip_prefix("SHA256:")
        .unwrap_or(fingerprint.trim())
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    /// Verify the server's host key against the pinned fingerprint
    ///
    /// Without a pinned fingerprint any key is accepted.
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        tracing::debug!("Server host key: SHA256:{}", fingerprint);

        match &self.expected_fingerprint {
            Some(expected) if normalize_fingerprint(expected) != normalize_fingerprint(&fingerprint) => {
                tracing::warn!(
                    "Host key mismatch: expected {}, got SHA256:{}",
                    expected,
                    fingerprint
                );
                Ok(false)
            }
            Some(_) => {
                tracing::debug!("Host key verified against pinned fingerprint");
                Ok(true)
            }
            None => Ok(true),
        }
    }
}
