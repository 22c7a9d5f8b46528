//! rctl-ssh: SSH session core for rctl
//!
//! Owns the single live SSH connection to the remote host and everything
//! that runs over it: command execution with timeouts, ordered command
//! fallback, periodic health probing and the boundary calls a UI consumes.

pub mod executor;
pub mod fallback;
pub mod health;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod privilege;
pub mod service;
pub mod session;
pub mod sysinfo;
pub mod transport;

pub use executor::{CommandExecutor, Invocation};
pub use fallback::{FallbackPolicy, FallbackRunner};
pub use health::{HealthMonitor, ProbeSpec};
pub use service::RemoteControl;
pub use session::{Session, SessionManager};
pub use transport::RusshConnector;
