//! Errors from the message-queue relay.

use thiserror::Error;

/// Errors from queue operations and the fixed wire codec.
#[derive(Debug, Error)]
pub enum MsgqError {
    /// The named queue does not exist (or its owner is gone). Delivery to a
    /// missing queue is an error, never buffered.
    #[error("Queue not found: {name}")]
    QueueNotFound { name: String },

    #[error("Queue full: {name}")]
    QueueFull { name: String },

    #[error("Invalid queue name: {name:?}")]
    InvalidName { name: String },

    #[error("Field {field} too long: {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// The fixed NUL-padded layout cannot carry an interior NUL byte.
    #[error("Field {field} contains a NUL byte")]
    EmbeddedNul { field: &'static str },

    #[error("Priority {priority} out of range (0-31)")]
    PriorityOutOfRange { priority: u8 },

    #[error("Malformed message: {reason}")]
    Malformed { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
