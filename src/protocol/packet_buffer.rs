//! Packet buffer for reassembling partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented packets:
//! - `AwaitingPrefix`: need at least 4 bytes
//! - `AwaitingPayload`: length decoded, need N more payload bytes
//!
//! Already-consumed bytes are advanced past with `split_to`, never
//! re-delivered; partial trailing bytes persist across pushes.
//!
//! # Example
//!
//! ```ignore
//! use actorwire::protocol::PacketBuffer;
//!
//! let mut buffer = PacketBuffer::new();
//!
//! // Data arrives in chunks from the socket
//! let packets = buffer.push(&chunk)?;
//! for packet in packets {
//!     println!("Got {} bytes", packet.len());
//! }
//! ```

use bytes::BytesMut;

use super::wire_format::{decode_len, validate_len, DEFAULT_MAX_PACKET_SIZE, LEN_PREFIX_SIZE};
use super::Packet;
use crate::error::Result;

/// State machine for packet reassembly.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete length prefix (need 4 bytes).
    AwaitingPrefix,
    /// Length decoded, waiting for payload bytes.
    AwaitingPayload { len: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete packets.
///
/// All data is stored in a single `BytesMut` buffer; the cursor only ever
/// advances. Owned and mutated by exactly one read loop, so it carries no
/// internal locking.
pub struct PacketBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_packet_size: u32,
}

impl PacketBuffer {
    /// Create a new packet buffer with default settings.
    ///
    /// Default capacity: 64KB, max payload: 16MB.
    pub fn new() -> Self {
        Self::with_max_packet(DEFAULT_MAX_PACKET_SIZE)
    }

    /// Create a new packet buffer with a custom max payload size.
    pub fn with_max_packet(max_packet_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::AwaitingPrefix,
            max_packet_size,
        }
    }

    /// Push data into the buffer and extract all complete packets.
    ///
    /// This is the main API for processing incoming data from the socket.
    /// One push carrying several coalesced packets yields all of them
    /// synchronously; fragmented data is buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if a decoded length exceeds the configured
    /// maximum. The buffer must not be reused afterwards; the owning
    /// connection closes.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Packet>> {
        self.buffer.extend_from_slice(data);

        let mut packets = Vec::new();

        while let Some(packet) = self.try_extract_one()? {
            packets.push(packet);
        }

        Ok(packets)
    }

    /// Try to extract a single packet from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(packet))` if a complete packet was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a framing violation (payload too large)
    fn try_extract_one(&mut self) -> Result<Option<Packet>> {
        match &self.state {
            State::AwaitingPrefix => {
                let len = match decode_len(&self.buffer) {
                    Some(len) => len,
                    None => return Ok(None),
                };

                // Oversize length must never be used to allocate.
                validate_len(len, self.max_packet_size)?;

                // Consume prefix bytes; the cursor never moves backward.
                let _ = self.buffer.split_to(LEN_PREFIX_SIZE);

                if len == 0 {
                    // Zero-length payload is a valid, deliverable packet.
                    return Ok(Some(Packet::new(bytes::Bytes::new())));
                }

                self.state = State::AwaitingPayload { len };

                // Payload may already be buffered.
                self.try_extract_one()
            }

            State::AwaitingPayload { len } => {
                let len = *len as usize;

                if self.buffer.len() < len {
                    return Ok(None);
                }

                // Zero-copy freeze of exactly len bytes.
                let payload = self.buffer.split_to(len).freeze();

                self.state = State::AwaitingPrefix;

                Ok(Some(Packet::new(payload)))
            }
        }
    }

    /// Get the number of buffered undelivered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the configured maximum payload size.
    pub fn max_packet_size(&self) -> u32 {
        self.max_packet_size
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::AwaitingPrefix => "AwaitingPrefix",
            State::AwaitingPayload { .. } => "AwaitingPayload",
        }
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_packet;

    #[test]
    fn test_single_complete_packet() {
        let mut buffer = PacketBuffer::new();
        let bytes = build_packet(b"hello");

        let packets = buffer.push(&bytes).unwrap();

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload(), b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_packets_in_one_push() {
        let mut buffer = PacketBuffer::new();

        let mut combined = Vec::new();
        combined.extend_from_slice(&build_packet(b"first"));
        combined.extend_from_slice(&build_packet(b"second"));
        combined.extend_from_slice(&build_packet(b"third"));

        let packets = buffer.push(&combined).unwrap();

        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].payload(), b"first");
        assert_eq!(packets[1].payload(), b"second");
        assert_eq!(packets[2].payload(), b"third");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_prefix() {
        let mut buffer = PacketBuffer::new();
        let bytes = build_packet(b"test");

        // Push only 2 bytes of the 4-byte prefix
        let packets = buffer.push(&bytes[..2]).unwrap();
        assert!(packets.is_empty());
        assert_eq!(buffer.state_name(), "AwaitingPrefix");

        // Push rest of prefix and payload
        let packets = buffer.push(&bytes[2..]).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload(), b"test");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = PacketBuffer::new();
        let payload = b"this is a longer payload that will be fragmented";
        let bytes = build_packet(payload);

        // Push prefix + partial payload
        let partial_len = LEN_PREFIX_SIZE + 10;
        let packets = buffer.push(&bytes[..partial_len]).unwrap();
        assert!(packets.is_empty());
        assert_eq!(buffer.state_name(), "AwaitingPayload");

        // Push rest of payload
        let packets = buffer.push(&bytes[partial_len..]).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload(), &payload[..]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_two_chunk_delivery() {
        // "Stan" framed, delivered as two 2-byte payload chunks
        let mut buffer = PacketBuffer::new();
        let bytes = build_packet(b"Stan");

        let packets = buffer.push(&bytes[..LEN_PREFIX_SIZE + 2]).unwrap();
        assert!(packets.is_empty());

        let packets = buffer.push(&bytes[LEN_PREFIX_SIZE + 2..]).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload(), b"Stan");
    }

    #[test]
    fn test_empty_payload() {
        let mut buffer = PacketBuffer::new();
        let bytes = build_packet(b"");

        let packets = buffer.push(&bytes).unwrap();

        assert_eq!(packets.len(), 1);
        assert!(packets[0].is_empty());
    }

    #[test]
    fn test_large_payload() {
        let mut buffer = PacketBuffer::new();
        let payload = vec![0xAB; 1024 * 1024]; // 1MB
        let bytes = build_packet(&payload);

        let packets = buffer.push(&bytes).unwrap();

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), 1024 * 1024);
        assert!(packets[0].payload().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_max_packet_validation() {
        let mut buffer = PacketBuffer::with_max_packet(100);

        // Prefix claiming a 1000-byte payload
        let prefix = crate::protocol::encode_len(1000);

        let result = buffer.push(&prefix);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_one_byte_over_max_rejected() {
        let max = 64;
        let mut buffer = PacketBuffer::with_max_packet(max);

        let at_limit = build_packet(&vec![0u8; max as usize]);
        let packets = buffer.push(&at_limit).unwrap();
        assert_eq!(packets.len(), 1);

        let over = crate::protocol::encode_len(max + 1);
        assert!(buffer.push(&over).is_err());
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = PacketBuffer::new();

        let first = build_packet(b"first");
        let second = build_packet(b"second");

        // Push first complete packet + partial second
        let mut data = first.clone();
        data.extend_from_slice(&second[..3]);

        let packets = buffer.push(&data).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload(), b"first");
        assert_eq!(buffer.state_name(), "AwaitingPrefix");

        // Complete second packet
        let packets = buffer.push(&second[3..]).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload(), b"second");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = PacketBuffer::new();
        let bytes = build_packet(b"hi");

        let mut all_packets = Vec::new();

        for byte in &bytes {
            let packets = buffer.push(&[*byte]).unwrap();
            all_packets.extend(packets);
        }

        assert_eq!(all_packets.len(), 1);
        assert_eq!(all_packets[0].payload(), b"hi");
    }

    #[test]
    fn test_chunking_independence() {
        // The same byte stream split at arbitrary boundaries yields
        // identical decoded output.
        let mut stream = Vec::new();
        let payloads: Vec<Vec<u8>> = (0u8..10).map(|i| vec![i; i as usize * 7]).collect();
        for p in &payloads {
            stream.extend_from_slice(&build_packet(p));
        }

        for chunk_size in [1usize, 2, 3, 5, 11, 64, stream.len()] {
            let mut buffer = PacketBuffer::new();
            let mut decoded = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                decoded.extend(buffer.push(chunk).unwrap());
            }
            assert_eq!(decoded.len(), payloads.len(), "chunk_size {}", chunk_size);
            for (packet, expected) in decoded.iter().zip(&payloads) {
                assert_eq!(packet.payload(), &expected[..]);
            }
            assert!(buffer.is_empty());
        }
    }
}
