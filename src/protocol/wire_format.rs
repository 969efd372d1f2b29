//! Wire format encoding and decoding.
//!
//! Every packet on the wire is a fixed-width length prefix followed by
//! exactly that many payload bytes:
//!
//! ```text
//! ┌──────────────┬─────────────────┐
//! │ Length       │ Payload         │
//! │ 4 bytes      │ Length bytes    │
//! │ uint32 BE    │                 │
//! └──────────────┴─────────────────┘
//! ```
//!
//! The prefix is Big Endian. A zero length is valid and frames an empty
//! payload.

use crate::error::{ActorwireError, Result};

/// Length prefix size in bytes (fixed, exactly 4).
pub const LEN_PREFIX_SIZE: usize = 4;

/// Default maximum payload size (16 MiB).
pub const DEFAULT_MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

/// Absolute maximum payload size (~2 GB, max i32).
pub const ABSOLUTE_MAX_PACKET_SIZE: u32 = 2_147_483_647;

/// Encode a payload length as a Big Endian prefix.
///
/// # Example
///
/// ```
/// use actorwire::protocol::encode_len;
///
/// assert_eq!(encode_len(5), [0, 0, 0, 5]);
/// ```
#[inline]
pub fn encode_len(len: u32) -> [u8; LEN_PREFIX_SIZE] {
    len.to_be_bytes()
}

/// Decode a payload length from a Big Endian prefix.
///
/// Returns `None` if the buffer is too short.
///
/// # Example
///
/// ```
/// use actorwire::protocol::decode_len;
///
/// assert_eq!(decode_len(&[0, 0, 0, 5]), Some(5));
/// assert_eq!(decode_len(&[0, 0]), None);
/// ```
#[inline]
pub fn decode_len(buf: &[u8]) -> Option<u32> {
    if buf.len() < LEN_PREFIX_SIZE {
        return None;
    }
    Some(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

/// Validate a decoded length against the configured maximum.
///
/// A length above the maximum is a framing violation, not a recoverable
/// data condition; the caller must close the connection.
#[inline]
pub fn validate_len(len: u32, max_packet_size: u32) -> Result<()> {
    if len > max_packet_size {
        return Err(ActorwireError::Protocol(format!(
            "Packet size {} exceeds maximum {}",
            len, max_packet_size
        )));
    }
    Ok(())
}

/// Build a complete wire frame (prefix + payload) as a single byte vector.
///
/// Use [`crate::writer::OutboundPacket`] for scatter/gather sends; this
/// helper is for tests and callers that want one contiguous buffer.
///
/// # Example
///
/// ```
/// use actorwire::protocol::{build_packet, LEN_PREFIX_SIZE};
///
/// let bytes = build_packet(b"hello");
/// assert_eq!(bytes.len(), LEN_PREFIX_SIZE + 5);
/// ```
pub fn build_packet(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LEN_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&encode_len(payload.len() as u32));
    buf.extend_from_slice(payload);
    buf
}
