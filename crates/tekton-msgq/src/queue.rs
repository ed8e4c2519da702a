//! The queue contract shared by both backends.
//!
//! A queue is a named, pre-existing mailbox. Send is fire-and-forget: a
//! missing queue is a delivery error, never a reason to buffer. Receive is
//! non-blocking polling: an empty queue is `Ok(None)`, not an error. No
//! acknowledgement, cross-sender ordering, or at-least-once guarantee is
//! provided by either backend.

use crate::error::MsgqError;
use crate::message::QueueMessage;

/// Interchangeable message-queue backend.
pub trait MessageQueue: Sized {
    /// Create (or re-create) the named queue and return an owning handle.
    fn create(name: &str) -> Result<Self, MsgqError>;

    /// Open an existing queue; absence is `QueueNotFound`.
    fn open(name: &str) -> Result<Self, MsgqError>;

    /// Fire-and-forget delivery to the queue.
    fn send(&self, message: &QueueMessage) -> Result<(), MsgqError>;

    /// Non-blocking poll; `Ok(None)` when the queue is empty.
    fn try_receive(&self) -> Result<Option<QueueMessage>, MsgqError>;

    /// Destroy the named queue.
    fn unlink(name: &str) -> Result<(), MsgqError>;
}

/// Queue names become filesystem/kernel identifiers, so keep them to a
/// conservative character set.
pub(crate) fn validate_name(name: &str) -> Result<(), MsgqError> {
    let ok = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(MsgqError::InvalidName {
            name: name.to_owned(),
        })
    }
}
