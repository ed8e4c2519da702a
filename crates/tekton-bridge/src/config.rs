//! Launch configuration for the bridge.
//!
//! Configuration resolution happens upstream (the caller hands the bridge a
//! fully resolved executable/args/port). The bridge only checks presence of
//! the executable, never its semantics.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::BridgeError;

/// Immutable description of what to run and how to connect it.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Path to the child executable.
    pub executable: PathBuf,
    /// Argument vector passed verbatim to the child.
    pub args: Vec<String>,
    /// Identity string exported to the child as `TEKTON_NAME`.
    pub tool_name: Option<String>,
    /// Target port; presence switches to socket-bridge mode.
    pub port: Option<u16>,
}

/// Which counterparty the child's streams are bridged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// Relay between the launcher's own stdio and the child's pipes.
    Stdio,
    /// Relay between an outbound connection to `127.0.0.1:<port>` and the
    /// child's stdin/stdout.
    Socket(u16),
}

impl LaunchConfig {
    /// Create a config with required fields and no options set.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            tool_name: None,
            port: None,
        }
    }

    /// Set the child's argument vector.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set the identity name exported to the child.
    #[must_use]
    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    /// Set the target port, switching to socket-bridge mode.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Presence check only: the executable path must be non-empty.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.executable.as_os_str().is_empty() {
            return Err(BridgeError::MissingExecutable);
        }
        Ok(())
    }

    /// Relay mode derived from the configured port.
    pub fn mode(&self) -> BridgeMode {
        self.port.map_or(BridgeMode::Stdio, BridgeMode::Socket)
    }
}

/// Fixed-interval bounded connection retry window.
///
/// The default window is 50 attempts at 100 ms, roughly five seconds before
/// the connection attempt is declared a terminal startup failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay between connection attempts.
    pub interval: Duration,
    /// Total attempts before giving up.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_attempts: 50,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt should be made after `attempt` failed tries.
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
