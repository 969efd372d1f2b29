//! Packet type with zero-copy payload.
//!
//! One complete, framed application-level message. Uses `bytes::Bytes`
//! so a packet can be cloned cheaply into several subscribers.
//!
//! # Example
//!
//! ```
//! use actorwire::protocol::Packet;
//! use bytes::Bytes;
//!
//! let packet = Packet::new(Bytes::from_static(b"hello"));
//! assert_eq!(packet.payload(), b"hello");
//! assert_eq!(packet.len(), 5);
//! ```

use bytes::Bytes;

/// A complete framed message as delivered by the receive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Packet {
    /// Create a new packet from payload bytes.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Create a packet from a raw slice (copies data).
    pub fn from_slice(payload: &[u8]) -> Self {
        Self {
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get a clone of the payload as Bytes (cheap, zero-copy).
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// Get the payload length.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty.
    ///
    /// An empty packet is still a valid, deliverable packet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<Bytes> for Packet {
    fn from(payload: Bytes) -> Self {
        Self::new(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_creation() {
        let packet = Packet::new(Bytes::from_static(b"hello"));
        assert_eq!(packet.payload(), b"hello");
        assert_eq!(packet.len(), 5);
        assert!(!packet.is_empty());
    }

    #[test]
    fn test_packet_from_slice_copies() {
        let packet = Packet::from_slice(b"test");
        assert_eq!(packet.payload(), b"test");
    }

    #[test]
    fn test_empty_packet_is_valid() {
        let packet = Packet::new(Bytes::new());
        assert!(packet.is_empty());
        assert_eq!(packet.len(), 0);
    }

    #[test]
    fn test_payload_bytes_zero_copy() {
        let original = Bytes::from_static(b"test data");
        let packet = Packet::new(original.clone());

        let cloned = packet.payload_bytes();
        assert_eq!(cloned, original);
        assert_eq!(cloned.as_ptr(), original.as_ptr());
    }
}
