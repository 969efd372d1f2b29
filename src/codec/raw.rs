//! Raw codec - pass-through for pre-encoded payloads.
//!
//! For callers that already hold wire-ready bytes and want to skip
//! serialization entirely. Unlike [`MsgPackCodec`](super::MsgPackCodec)
//! this is not a [`Codec`](super::Codec) implementation; it works on
//! byte slices directly.
//!
//! # Example
//!
//! ```
//! use actorwire::codec::RawCodec;
//! use bytes::Bytes;
//!
//! let raw = RawCodec::serialize(b"binary data");
//! assert_eq!(RawCodec::deserialize(&raw), b"binary data");
//! ```

use bytes::Bytes;

/// Pass-through codec for raw binary data.
pub struct RawCodec;

impl RawCodec {
    /// Wrap raw bytes for sending (copies into `Bytes`).
    #[inline]
    pub fn serialize(data: &[u8]) -> Bytes {
        Bytes::copy_from_slice(data)
    }

    /// Wrap already-owned bytes for sending (zero-copy).
    #[inline]
    pub fn serialize_bytes(data: Bytes) -> Bytes {
        data
    }

    /// Unwrap received bytes (identity).
    #[inline]
    pub fn deserialize(data: &Bytes) -> &[u8] {
        data
    }
}
