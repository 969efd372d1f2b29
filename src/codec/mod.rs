//! Codec module - serialization/deserialization for payloads.
//!
//! The serializer is a pluggable collaborator, not part of the core:
//! the [`Codec`] trait is the seam, and two implementations ship with
//! the crate:
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (struct-as-map format)
//! - [`RawCodec`] - pass-through for raw bytes (zero-copy)
//!
//! A codec failure is surfaced to the specific caller whose call
//! triggered it; it never affects connection or context health.
//!
//! # Example
//!
//! ```
//! use actorwire::codec::{Codec, MsgPackCodec};
//!
//! let encoded = MsgPackCodec.encode(&"hello").unwrap();
//! let decoded: String = MsgPackCodec.decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod msgpack;
mod raw;

pub use msgpack::MsgPackCodec;
pub use raw::RawCodec;

use crate::error::Result;

/// Pluggable payload serializer.
///
/// `encode` turns a value into wire bytes, `decode` turns wire bytes
/// back into a value of the declared type.
pub trait Codec: Send + Sync {
    /// Encode a value to payload bytes.
    fn encode<T: serde::Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode payload bytes to a value.
    fn decode<T: serde::de::DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}
