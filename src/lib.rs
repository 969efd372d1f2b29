//! # actorwire
//!
//! Single-process concurrency runtime for building networked services
//! out of independent stateful units ("actors"), paired with a
//! length-prefixed framing transport.
//!
//! ## Architecture
//!
//! - **Actor domain**: each actor owns an [`ActorContext`], a serialized
//!   work queue; contexts run logically in parallel relative to each
//!   other, each internally single-threaded in effect.
//! - **I/O domain**: each [`Connection`] runs a read loop (arrival-order
//!   chunks reassembled into packets) and a writer task (ordered,
//!   non-interleaving sends); ordering holds within one connection,
//!   never across connections.
//!
//! ## Example
//!
//! ```ignore
//! use actorwire::{ActorContext, Connection, ConnectionConfig, Server};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() -> actorwire::Result<()> {
//!     let server = Server::bind("127.0.0.1:9000", ConnectionConfig::default()).await?;
//!     let mut incoming = server.start();
//!
//!     while let Some(conn) = incoming.recv().await {
//!         let mut events = conn.subscribe();
//!         conn.start()?;
//!         // route events into actor contexts...
//!     }
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod codec;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod server;

mod backpressure;
mod writer;

pub use actor::{ActorContext, ActorProvider, Deferred};
pub use connection::{
    Connection, ConnectionConfig, ConnectionEvent, ConnectionState, DisconnectReason,
};
pub use error::{ActorwireError, Result};
pub use protocol::Packet;
pub use server::Server;
pub use writer::WriterConfig;
