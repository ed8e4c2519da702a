//! Unix-domain datagram backend.
//!
//! The queue is a datagram socket bound at `<queue-dir>/<name>.sock`; the
//! kernel receive buffer of the bound socket is the queue storage. The
//! handle returned by `create` owns the bound socket and is the receiving
//! end; `open` returns a send-only handle addressing the same path. When
//! the owner goes away the kernel refuses further sends, which surfaces as
//! the contract's delivery error.

use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::MsgqError;
use crate::message::{QueueMessage, ENCODED_MAX};
use crate::queue::{validate_name, MessageQueue};

/// Environment override for the queue directory (used by tests).
pub const TEKTON_MQ_DIR: &str = "TEKTON_MQ_DIR";

/// Handle to a named datagram-socket queue.
#[derive(Debug)]
pub struct UnixQueue {
    socket: UnixDatagram,
    name: String,
    path: PathBuf,
}

/// Directory holding queue sockets: `$TEKTON_MQ_DIR`, else
/// `$XDG_RUNTIME_DIR/tekton-mq`, else `<tmp>/tekton-mq`.
pub fn queue_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(TEKTON_MQ_DIR) {
        return PathBuf::from(dir);
    }
    std::env::var_os("XDG_RUNTIME_DIR").map_or_else(
        || std::env::temp_dir().join("tekton-mq"),
        |runtime| PathBuf::from(runtime).join("tekton-mq"),
    )
}

fn socket_path(dir: &Path, name: &str) -> Result<PathBuf, MsgqError> {
    validate_name(name)?;
    Ok(dir.join(format!("{name}.sock")))
}

fn map_io(name: &str, e: std::io::Error) -> MsgqError {
    match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
            MsgqError::QueueNotFound {
                name: name.to_owned(),
            }
        }
        std::io::ErrorKind::WouldBlock => MsgqError::QueueFull {
            name: name.to_owned(),
        },
        _ => MsgqError::Io(e),
    }
}

impl UnixQueue {
    /// Create the queue under an explicit directory.
    ///
    /// A leftover socket file from a dead owner is replaced; the new handle
    /// becomes the queue's receiving end.
    pub fn create_in(dir: &Path, name: &str) -> Result<Self, MsgqError> {
        let path = socket_path(dir, name)?;
        std::fs::create_dir_all(dir)?;

        let socket = match UnixDatagram::bind(&path) {
            Ok(socket) => socket,
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                std::fs::remove_file(&path)?;
                UnixDatagram::bind(&path)?
            }
            Err(e) => return Err(map_io(name, e)),
        };
        socket.set_nonblocking(true)?;
        debug!(name, path = %path.display(), "Created datagram queue");
        Ok(Self {
            socket,
            name: name.to_owned(),
            path,
        })
    }

    /// Open a send-only handle to an existing queue under an explicit
    /// directory.
    pub fn open_in(dir: &Path, name: &str) -> Result<Self, MsgqError> {
        let path = socket_path(dir, name)?;
        if !path.exists() {
            return Err(MsgqError::QueueNotFound {
                name: name.to_owned(),
            });
        }
        let socket = UnixDatagram::unbound()?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            name: name.to_owned(),
            path,
        })
    }

    /// Destroy a queue under an explicit directory.
    pub fn unlink_in(dir: &Path, name: &str) -> Result<(), MsgqError> {
        let path = socket_path(dir, name)?;
        std::fs::remove_file(&path).map_err(|e| map_io(name, e))
    }
}

impl MessageQueue for UnixQueue {
    fn create(name: &str) -> Result<Self, MsgqError> {
        Self::create_in(&queue_dir(), name)
    }

    fn open(name: &str) -> Result<Self, MsgqError> {
        Self::open_in(&queue_dir(), name)
    }

    fn send(&self, message: &QueueMessage) -> Result<(), MsgqError> {
        let encoded = message.encode()?;
        self.socket
            .send_to(&encoded, &self.path)
            .map_err(|e| map_io(&self.name, e))?;
        Ok(())
    }

    fn try_receive(&self) -> Result<Option<QueueMessage>, MsgqError> {
        let mut buf = vec![0u8; ENCODED_MAX];
        match self.socket.recv(&mut buf) {
            Ok(len) => QueueMessage::decode(&buf[..len]).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(map_io(&self.name, e)),
        }
    }

    fn unlink(name: &str) -> Result<(), MsgqError> {
        Self::unlink_in(&queue_dir(), name)
    }
}
