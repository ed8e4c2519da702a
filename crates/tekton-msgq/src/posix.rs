//! POSIX message-queue backend (`mq_*` syscalls via nix).
//!
//! Queue `<name>` maps to the kernel mq name `/<name>`. Descriptors are
//! opened `O_NONBLOCK`, so an empty receive comes back `EAGAIN` and maps to
//! the contract's "no message" result. Capacity is 10 records, the common
//! kernel default for `msg_max`.

use std::ffi::CString;
use std::mem::ManuallyDrop;

use nix::errno::Errno;
use nix::mqueue::{mq_close, mq_open, mq_receive, mq_send, mq_unlink, MQ_OFlag, MqAttr, MqdT};
use nix::sys::stat::Mode;
use tracing::debug;

use crate::error::MsgqError;
use crate::message::{QueueMessage, ENCODED_MAX};
use crate::queue::{validate_name, MessageQueue};

/// Records the queue holds before sends start failing.
const CAPACITY: i64 = 10;

/// Handle to a named POSIX message queue.
#[derive(Debug)]
pub struct PosixQueue {
    // ManuallyDrop so `drop` can move the descriptor into `mq_close`, which
    // takes it by value.
    mqd: ManuallyDrop<MqdT>,
    name: String,
}

fn mq_name(name: &str) -> Result<CString, MsgqError> {
    validate_name(name)?;
    CString::new(format!("/{name}")).map_err(|_| MsgqError::InvalidName {
        name: name.to_owned(),
    })
}

impl PosixQueue {
    fn open_flags(create: bool) -> MQ_OFlag {
        let mut flags = MQ_OFlag::O_RDWR | MQ_OFlag::O_NONBLOCK;
        if create {
            flags |= MQ_OFlag::O_CREAT;
        }
        flags
    }

    fn map_errno(name: &str, e: Errno) -> MsgqError {
        match e {
            Errno::ENOENT => MsgqError::QueueNotFound {
                name: name.to_owned(),
            },
            Errno::EAGAIN => MsgqError::QueueFull {
                name: name.to_owned(),
            },
            other => MsgqError::Io(other.into()),
        }
    }
}

impl MessageQueue for PosixQueue {
    fn create(name: &str) -> Result<Self, MsgqError> {
        let qname = mq_name(name)?;
        #[allow(clippy::cast_possible_wrap)]
        let attr = MqAttr::new(0, CAPACITY, ENCODED_MAX as i64, 0);
        let mqd = mq_open(
            qname.as_c_str(),
            Self::open_flags(true),
            Mode::S_IRUSR | Mode::S_IWUSR,
            Some(&attr),
        )
        .map_err(|e| Self::map_errno(name, e))?;
        debug!(name, "Created POSIX message queue");
        Ok(Self {
            mqd: ManuallyDrop::new(mqd),
            name: name.to_owned(),
        })
    }

    fn open(name: &str) -> Result<Self, MsgqError> {
        let qname = mq_name(name)?;
        let mqd = mq_open(qname.as_c_str(), Self::open_flags(false), Mode::empty(), None)
            .map_err(|e| Self::map_errno(name, e))?;
        Ok(Self {
            mqd: ManuallyDrop::new(mqd),
            name: name.to_owned(),
        })
    }

    fn send(&self, message: &QueueMessage) -> Result<(), MsgqError> {
        let encoded = message.encode()?;
        mq_send(&self.mqd, &encoded, u32::from(message.priority))
            .map_err(|e| Self::map_errno(&self.name, e))
    }

    fn try_receive(&self) -> Result<Option<QueueMessage>, MsgqError> {
        let mut buf = vec![0u8; ENCODED_MAX];
        let mut prio: u32 = 0;
        match mq_receive(&self.mqd, &mut buf, &mut prio) {
            Ok(len) => QueueMessage::decode(&buf[..len]).map(Some),
            Err(Errno::EAGAIN) => Ok(None),
            Err(e) => Err(Self::map_errno(&self.name, e)),
        }
    }

    fn unlink(name: &str) -> Result<(), MsgqError> {
        let qname = mq_name(name)?;
        mq_unlink(qname.as_c_str()).map_err(|e| Self::map_errno(name, e))
    }
}

impl Drop for PosixQueue {
    fn drop(&mut self) {
        // SAFETY: runs exactly once and the field is never read afterwards.
        #[allow(unsafe_code)]
        let mqd = unsafe { ManuallyDrop::take(&mut self.mqd) };
        let _ = mq_close(mqd);
    }
}
