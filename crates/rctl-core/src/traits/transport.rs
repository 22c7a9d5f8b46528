//! Transport traits
//!
//! The session core talks to the remote host only through these traits.
//! `rctl-ssh` provides the russh implementation and an in-process mock.

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::error::{CommandError, ConnectionError};

/// One command to run on a fresh channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Command line, passed to the remote shell verbatim
    pub command: String,
    /// Bytes written to the remote stdin before EOF
    pub stdin: Option<Vec<u8>>,
    /// Per-stream cap on captured output
    pub max_output_bytes: usize,
}

impl ExecRequest {
    /// Create a request with no stdin and the given output cap
    pub fn new(command: impl Into<String>, max_output_bytes: usize) -> Self {
        Self {
            command: command.into(),
            stdin: None,
            max_output_bytes,
        }
    }

    /// Attach bytes for the remote stdin
    pub fn with_stdin(mut self, stdin: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

/// Raw outcome of a channel that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    pub truncated: bool,
}

/// An authenticated connection able to run commands
///
/// `exec` futures may be dropped at any await point (timeout, disconnect);
/// implementations must release the channel they opened when that happens.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run one command on a new channel and wait for it to finish
    async fn exec(&self, request: &ExecRequest) -> Result<ExecOutput, CommandError>;

    /// Whether the underlying connection is known to be gone
    fn is_closed(&self) -> bool;

    /// Close the connection; calling it again is a no-op
    async fn close(&self);
}

/// Opens transports from connection settings
#[async_trait]
pub trait Connector: Send + Sync {
    /// Handshake and authenticate, yielding a fully usable transport
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Transport>, ConnectionError>;
}
