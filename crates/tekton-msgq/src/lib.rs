//! Tekton message-queue relay.
//!
//! Best-effort inter-process messaging for Tekton components: a fixed-size
//! message record carried over one of two interchangeable backends, a POSIX
//! message queue or a Unix-domain datagram socket. Delivery is
//! fire-and-forget to a named, pre-existing queue; receiving is
//! non-blocking polling.

pub mod error;
pub mod message;
pub mod posix;
pub mod queue;
pub mod unix;

pub use error::MsgqError;
pub use message::{QueueMessage, PAYLOAD_MAX, PRIORITY_MAX, SENDER_MAX, TYPE_MAX};
pub use posix::PosixQueue;
pub use queue::MessageQueue;
pub use unix::UnixQueue;
