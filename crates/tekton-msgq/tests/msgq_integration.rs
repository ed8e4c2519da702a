#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! Integration tests for the message-queue contract.
//!
//! The Unix-datagram backend runs against a per-test temp directory; the
//! POSIX backend uses uniquely named kernel queues that are unlinked on the
//! way out.

use tekton_msgq::{MessageQueue, MsgqError, PosixQueue, QueueMessage, UnixQueue};

fn sample_message() -> QueueMessage {
    QueueMessage::new("ergon", "status", 7, b"cycle complete".to_vec()).unwrap()
}

// =========================================================================
// Unix-datagram backend
// =========================================================================

#[test]
fn unix_send_then_receive_returns_identical_record() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UnixQueue::create_in(dir.path(), "ergon").unwrap();
    let tx = UnixQueue::open_in(dir.path(), "ergon").unwrap();

    let sent = sample_message();
    tx.send(&sent).unwrap();

    let received = rx.try_receive().unwrap().unwrap();
    assert_eq!(received, sent);
    assert_eq!(received.encode().unwrap(), sent.encode().unwrap());
}

#[test]
fn unix_empty_queue_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UnixQueue::create_in(dir.path(), "apollo").unwrap();
    assert!(rx.try_receive().unwrap().is_none());
}

#[test]
fn unix_missing_queue_is_a_delivery_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = UnixQueue::open_in(dir.path(), "nowhere").err().unwrap();
    assert!(matches!(err, MsgqError::QueueNotFound { .. }));
}

#[test]
fn unix_send_to_dead_owner_is_a_delivery_error() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UnixQueue::create_in(dir.path(), "rhetor").unwrap();
    drop(rx); // Owner gone; the socket file remains but nothing receives.

    let tx = UnixQueue::open_in(dir.path(), "rhetor").unwrap();
    let err = tx.send(&sample_message()).err().unwrap();
    assert!(matches!(err, MsgqError::QueueNotFound { .. }));
}

#[test]
fn unix_messages_arrive_in_send_order() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UnixQueue::create_in(dir.path(), "metis").unwrap();
    let tx = UnixQueue::open_in(dir.path(), "metis").unwrap();

    for i in 0..5u8 {
        let msg = QueueMessage::new("metis", "seq", 0, vec![i]).unwrap();
        tx.send(&msg).unwrap();
    }
    for i in 0..5u8 {
        let msg = rx.try_receive().unwrap().unwrap();
        assert_eq!(msg.payload, vec![i]);
    }
    assert!(rx.try_receive().unwrap().is_none());
}

#[test]
fn unix_unlink_removes_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let _rx = UnixQueue::create_in(dir.path(), "sophia").unwrap();
    UnixQueue::unlink_in(dir.path(), "sophia").unwrap();

    let err = UnixQueue::open_in(dir.path(), "sophia").err().unwrap();
    assert!(matches!(err, MsgqError::QueueNotFound { .. }));
}

// =========================================================================
// POSIX mq backend (Linux kernel queues)
// =========================================================================

#[cfg(target_os = "linux")]
mod posix_mq {
    use super::*;

    /// Unique kernel queue name per test run.
    fn unique_name(tag: &str) -> String {
        format!("tekton-test-{tag}-{}", uuid::Uuid::new_v4().simple())
    }

    #[test]
    fn posix_send_then_receive_returns_identical_record() {
        let name = unique_name("roundtrip");
        let queue = PosixQueue::create(&name).unwrap();

        let sent = sample_message();
        queue.send(&sent).unwrap();
        let received = queue.try_receive().unwrap().unwrap();
        assert_eq!(received, sent);

        PosixQueue::unlink(&name).unwrap();
    }

    #[test]
    fn posix_empty_queue_is_not_an_error() {
        let name = unique_name("empty");
        let queue = PosixQueue::create(&name).unwrap();
        assert!(queue.try_receive().unwrap().is_none());
        PosixQueue::unlink(&name).unwrap();
    }

    #[test]
    fn posix_missing_queue_is_a_delivery_error() {
        let err = PosixQueue::open(&unique_name("missing")).err().unwrap();
        assert!(matches!(err, MsgqError::QueueNotFound { .. }));
    }

    #[test]
    fn posix_open_reaches_an_existing_queue() {
        let name = unique_name("shared");
        let rx = PosixQueue::create(&name).unwrap();
        let tx = PosixQueue::open(&name).unwrap();

        tx.send(&sample_message()).unwrap();
        assert!(rx.try_receive().unwrap().is_some());

        PosixQueue::unlink(&name).unwrap();
    }
}
