//! In-process transport for testing without an SSH server
//!
//! A [`MockScript`] maps command lines to canned replies and records every
//! request. [`MockConnector`] hands out [`MockTransport`]s that share one
//! script, so a test can script replies before or after connecting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::ExposeSecret;

use rctl_core::traits::{Connector, ExecOutput, ExecRequest, Transport};
use rctl_core::{CommandError, ConnectionConfig, ConnectionError};

use crate::transport::append_capped;

/// Scripted response to one command
#[derive(Debug, Clone)]
pub enum MockReply {
    /// The command completes with this output
    Output {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        exit_code: i32,
    },
    /// The transport reports an error
    Fail(CommandError),
    /// Wait, then play the inner reply
    Delay(Duration, Box<MockReply>),
    /// Never completes
    Hang,
    /// The connection drops mid-command
    DropConnection,
}

impl MockReply {
    /// A completed command
    pub fn output(stdout: &str, stderr: &str, exit_code: i32) -> Self {
        MockReply::Output {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            exit_code,
        }
    }

    /// A command that succeeds with `stdout`
    pub fn ok(stdout: &str) -> Self {
        Self::output(stdout, "", 0)
    }

    /// Play `self` after `delay`
    pub fn after(self, delay: Duration) -> Self {
        MockReply::Delay(delay, Box::new(self))
    }
}

#[derive(Default)]
struct ScriptState {
    replies: HashMap<String, MockReply>,
    requests: Vec<ExecRequest>,
}

/// Shared table of scripted replies plus a log of what was run
#[derive(Clone, Default)]
pub struct MockScript {
    state: Arc<Mutex<ScriptState>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MockScript {
    /// An empty script; unscripted commands succeed with no output
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reply for `command`, replacing any earlier one
    pub fn on(&self, command: impl Into<String>, reply: MockReply) -> &Self {
        self.state.lock().replies.insert(command.into(), reply);
        self
    }

    /// Command lines run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state
            .lock()
            .requests
            .iter()
            .map(|r| r.command.clone())
            .collect()
    }

    /// Full requests run so far, in order
    pub fn requests(&self) -> Vec<ExecRequest> {
        self.state.lock().requests.clone()
    }

    /// Highest number of commands that were in flight at once
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Channels currently open
    pub fn open_channels(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Channels opened so far
    pub fn channels_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Channels closed so far, whether the command finished or was abandoned
    pub fn channels_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, request: &ExecRequest) -> MockReply {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        state
            .replies
            .get(&request.command)
            .cloned()
            .unwrap_or_else(|| MockReply::ok(""))
    }

    fn open_channel(&self) -> MockChannel<'_> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        MockChannel(self)
    }
}

/// Open channel; closed when dropped, as a russh channel guard is
struct MockChannel<'a>(&'a MockScript);

impl Drop for MockChannel<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
        self.0.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport that plays replies from a [`MockScript`]
pub struct MockTransport {
    script: MockScript,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn exec(&self, request: &ExecRequest) -> Result<ExecOutput, CommandError> {
        if self.is_closed() {
            return Err(CommandError::NotConnected);
        }

        let mut reply = self.script.record(request);
        let _channel = self.script.open_channel();

        loop {
            match reply {
                MockReply::Delay(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                }
                MockReply::Hang => std::future::pending::<()>().await,
                MockReply::Fail(e) => return Err(e),
                MockReply::DropConnection => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(CommandError::Transport("connection reset by peer".into()));
                }
                MockReply::Output {
                    stdout,
                    stderr,
                    exit_code,
                } => {
                    let mut output = ExecOutput {
                        exit_code,
                        ..ExecOutput::default()
                    };
                    let limit = request.max_output_bytes;
                    output.truncated |= append_capped(&mut output.stdout, &stdout, limit);
                    output.truncated |= append_capped(&mut output.stderr, &stderr, limit);
                    return Ok(output);
                }
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector that hands out [`MockTransport`]s
pub struct MockConnector {
    script: MockScript,
    password: Option<String>,
    failure: Option<ConnectionError>,
    delay: Option<Duration>,
    connects: AtomicUsize,
}

impl MockConnector {
    /// Accept any credentials
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            password: None,
            failure: None,
            delay: None,
            connects: AtomicUsize::new(0),
        }
    }

    /// Accept only `password`
    pub fn with_password(script: MockScript, password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Self::new(script)
        }
    }

    /// Fail every connect with `error`
    pub fn failing(error: ConnectionError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(MockScript::new())
        }
    }

    /// Wait `delay` before answering each connect
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of connect attempts that reached the connector
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Transport>, ConnectionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if let Some(expected) = &self.password {
            if config.secret.expose_secret() != expected {
                return Err(ConnectionError::AuthenticationFailed {
                    user: config.username.clone(),
                    host: config.host.clone(),
                });
            }
        }

        Ok(Box::new(MockTransport::new(self.script.clone())))
    }
}
