//! Framing protocol - length-prefixed packets over a byte stream.
//!
//! Presents a packet abstraction over an arbitrarily-chunked byte stream:
//! outgoing payloads become `{u32 BE length}{payload}` frames, incoming
//! chunks are reassembled into complete [`Packet`]s by [`PacketBuffer`].

mod packet;
mod packet_buffer;
mod wire_format;

pub use packet::Packet;
pub use packet_buffer::PacketBuffer;
pub use wire_format::{
    build_packet, decode_len, encode_len, validate_len, ABSOLUTE_MAX_PACKET_SIZE,
    DEFAULT_MAX_PACKET_SIZE, LEN_PREFIX_SIZE,
};
