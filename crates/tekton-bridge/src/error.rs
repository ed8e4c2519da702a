//! Errors from the bridge launcher.

use thiserror::Error;

/// Errors raised while launching or bridging a child process.
///
/// Only startup-class failures surface here: spawn errors and the bounded
/// connection-retry timeout. Steady-state stream events (end-of-stream,
/// would-block) are relay state transitions, not errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Executable path is empty")]
    MissingExecutable,

    #[error("Failed to spawn {executable}: {reason}")]
    Spawn { executable: String, reason: String },

    #[error("Connection to 127.0.0.1:{port} refused after {attempts} attempts")]
    ConnectTimeout { port: u16, attempts: u32 },

    #[error("Child stream already taken: {stream}")]
    StreamUnavailable { stream: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
