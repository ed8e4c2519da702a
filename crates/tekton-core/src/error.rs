//! Error types for the Tekton core library.

use thiserror::Error;

/// Result type alias using the core `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Shared error types for Tekton helper operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Environment contract violation (bad name or value)
    #[error("Environment error: {0}")]
    Env(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
