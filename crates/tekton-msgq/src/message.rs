//! The fixed-size message record and its wire codec.
//!
//! Both backends carry the same record in the same binary layout, so a
//! record sent through one backend decodes identically through the other:
//!
//! ```text
//! sender[64] | type_tag[32] | priority u8 | pad[3] | timestamp u64 LE |
//! payload_len u32 LE | payload[..payload_len]
//! ```
//!
//! Strings are NUL-padded to their field width; decode trims at the first
//! NUL, so an interior NUL cannot survive a round trip and is rejected at
//! construction. Oversized fields fail at encode time, a short or
//! inconsistent buffer fails at decode time.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::MsgqError;

/// Maximum sender-name length in bytes.
pub const SENDER_MAX: usize = 64;
/// Maximum type-tag length in bytes.
pub const TYPE_MAX: usize = 32;
/// Highest valid priority (POSIX mq priority range 0-31).
pub const PRIORITY_MAX: u8 = 31;

/// Fixed header length preceding the payload.
pub const HEADER_LEN: usize = SENDER_MAX + TYPE_MAX + 4 + 8 + 4;
/// Largest possible encoded record. Sized to the default POSIX mq
/// `msgsize_max` (8192) so a full record is accepted without raising
/// kernel limits.
pub const ENCODED_MAX: usize = 8192;
/// Maximum payload length in bytes.
pub const PAYLOAD_MAX: usize = ENCODED_MAX - HEADER_LEN;

/// One message record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Name of the sending component.
    pub sender: String,
    /// Application-level type tag.
    pub type_tag: String,
    /// Priority 0-31; higher is more urgent.
    pub priority: u8,
    /// Seconds since the Unix epoch, stamped at construction.
    pub timestamp: u64,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

impl QueueMessage {
    /// Build a record stamped with the current time, validating field sizes
    /// and priority range.
    pub fn new(
        sender: impl Into<String>,
        type_tag: impl Into<String>,
        priority: u8,
        payload: Vec<u8>,
    ) -> Result<Self, MsgqError> {
        let msg = Self {
            sender: sender.into(),
            type_tag: type_tag.into(),
            priority,
            timestamp: now_epoch_secs(),
            payload,
        };
        msg.check_limits()?;
        Ok(msg)
    }

    fn check_limits(&self) -> Result<(), MsgqError> {
        // The NUL-padded layout cannot represent an interior NUL.
        if self.sender.contains('\0') {
            return Err(MsgqError::EmbeddedNul { field: "sender" });
        }
        if self.type_tag.contains('\0') {
            return Err(MsgqError::EmbeddedNul { field: "type_tag" });
        }
        if self.sender.len() > SENDER_MAX {
            return Err(MsgqError::FieldTooLong {
                field: "sender",
                len: self.sender.len(),
                max: SENDER_MAX,
            });
        }
        if self.type_tag.len() > TYPE_MAX {
            return Err(MsgqError::FieldTooLong {
                field: "type_tag",
                len: self.type_tag.len(),
                max: TYPE_MAX,
            });
        }
        if self.payload.len() > PAYLOAD_MAX {
            return Err(MsgqError::FieldTooLong {
                field: "payload",
                len: self.payload.len(),
                max: PAYLOAD_MAX,
            });
        }
        if self.priority > PRIORITY_MAX {
            return Err(MsgqError::PriorityOutOfRange {
                priority: self.priority,
            });
        }
        Ok(())
    }

    /// Encode into the fixed wire layout.
    pub fn encode(&self) -> Result<Vec<u8>, MsgqError> {
        self.check_limits()?;

        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(self.sender.as_bytes());
        buf.resize(SENDER_MAX, 0);
        buf.extend_from_slice(self.type_tag.as_bytes());
        buf.resize(SENDER_MAX + TYPE_MAX, 0);
        buf.push(self.priority);
        buf.extend_from_slice(&[0u8; 3]);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        #[allow(clippy::cast_possible_truncation)]
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Decode a record from one received datagram/message.
    pub fn decode(buf: &[u8]) -> Result<Self, MsgqError> {
        if buf.len() < HEADER_LEN {
            return Err(MsgqError::Malformed {
                reason: format!("{} bytes, header needs {HEADER_LEN}", buf.len()),
            });
        }

        let sender = decode_padded_str(&buf[..SENDER_MAX], "sender")?;
        let type_tag = decode_padded_str(&buf[SENDER_MAX..SENDER_MAX + TYPE_MAX], "type_tag")?;

        let mut off = SENDER_MAX + TYPE_MAX;
        let priority = buf[off];
        off += 4; // priority byte + padding

        let timestamp = u64::from_le_bytes(
            buf[off..off + 8]
                .try_into()
                .map_err(|_| malformed("truncated timestamp"))?,
        );
        off += 8;
        let payload_len = u32::from_le_bytes(
            buf[off..off + 4]
                .try_into()
                .map_err(|_| malformed("truncated payload length"))?,
        ) as usize;
        off += 4;

        if payload_len > PAYLOAD_MAX {
            return Err(malformed("payload length exceeds cap"));
        }
        if buf.len() != off + payload_len {
            return Err(MsgqError::Malformed {
                reason: format!(
                    "length mismatch: {} bytes, expected {}",
                    buf.len(),
                    off + payload_len
                ),
            });
        }
        if priority > PRIORITY_MAX {
            return Err(MsgqError::PriorityOutOfRange { priority });
        }

        Ok(Self {
            sender,
            type_tag,
            priority,
            timestamp,
            payload: buf[off..].to_vec(),
        })
    }
}

fn decode_padded_str(field: &[u8], name: &'static str) -> Result<String, MsgqError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end])
        .map(str::to_owned)
        .map_err(|_| MsgqError::Malformed {
            reason: format!("{name} is not valid UTF-8"),
        })
}

fn malformed(reason: &str) -> MsgqError {
    MsgqError::Malformed {
        reason: reason.to_owned(),
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
