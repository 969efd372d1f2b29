//! Connection - one live duplex transport between two endpoints.
//!
//! A [`Connection`] owns one TCP socket. The read path is a single task
//! that continuously issues receive operations and feeds each raw chunk,
//! in arrival order, into its privately-owned [`PacketBuffer`]; decoded
//! packets are published to subscribers. The write path serializes send
//! requests from arbitrary callers into one ordered queue drained by the
//! connection's writer task.
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──start()──► Connected ──close()/peer/error──► Closing ──► Closed
//! ```
//!
//! Transitions are monotonic; `Closed` is terminal and repeated close
//! requests are no-ops. Exactly one `Disconnected(reason)` event is
//! delivered, with the reason distinguishing remote close, local close,
//! framing violations, and transport errors.
//!
//! # Backpressure
//!
//! The send queue is bounded-with-block: callers wait for space up to
//! `ConnectionConfig::writer.backpressure_timeout`, then the send fails
//! with `BackpressureTimeout`. Memory is bounded by
//! `max_pending_packets` times the largest accepted payload.
//!
//! # Events
//!
//! Subscribers register before `start()` and receive every event exactly
//! once via a broadcast channel. A subscriber that falls more than
//! `event_capacity` events behind observes a `Lagged` error from the
//! channel instead of silently losing its slot.
//!
//! # Example
//!
//! ```ignore
//! let conn = Connection::connect("127.0.0.1:9000", ConnectionConfig::default()).await?;
//! let mut events = conn.subscribe();
//! conn.start()?;
//! conn.send(Bytes::from_static(b"hello")).await?;
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ConnectionEvent::Received(packet) => { /* ... */ }
//!         ConnectionEvent::Disconnected(reason) => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{broadcast, watch};

use crate::codec::Codec;
use crate::error::{ActorwireError, Result};
use crate::protocol::{Packet, PacketBuffer, DEFAULT_MAX_PACKET_SIZE};
use crate::writer::{spawn_writer_task, OutboundPacket, WriterConfig, WriterHandle};

/// Default read buffer size (64KB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default event channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration for a connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum accepted payload size; a decoded length above this is a
    /// framing violation and closes the connection.
    pub max_packet_size: u32,
    /// Size of the socket read buffer.
    pub read_buffer_size: usize,
    /// Event broadcast channel capacity.
    pub event_capacity: usize,
    /// Writer task configuration (send queue bounds and timeout).
    pub writer: WriterConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            writer: WriterConfig::default(),
        }
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Constructed, loops not yet running.
    Connecting = 0,
    /// Read and write loops running.
    Connected = 1,
    /// Teardown initiated by either peer or by a framing violation.
    Closing = 2,
    /// Terminal; socket and buffers released.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Connecting,
            1 => Self::Connected,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Why a connection terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote peer closed the stream.
    RemoteClosed,
    /// `close()` was called locally.
    LocalClosed,
    /// A framing violation (oversize or malformed prefix).
    Protocol(String),
    /// A socket-level failure.
    Transport(String),
}

/// Observable connection events.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Loops are running; the connection accepts sends.
    Connected,
    /// One complete packet decoded from the stream.
    Received(Packet),
    /// Terminal notification, delivered exactly once.
    Disconnected(DisconnectReason),
}

struct ConnectionInner {
    config: ConnectionConfig,
    state: AtomicU8,
    peer_addr: Option<SocketAddr>,
    events: broadcast::Sender<ConnectionEvent>,
    /// Set by `start()`; absent while Connecting.
    writer: OnceLock<WriterHandle>,
    /// Taken by `start()`.
    stream: Mutex<Option<TcpStream>>,
    /// Signals both loops to wind down.
    shutdown: watch::Sender<bool>,
    /// Guards exactly-once delivery of `Disconnected`.
    disconnect_sent: AtomicBool,
}

impl ConnectionInner {
    /// Monotonically advance the state; never regresses.
    fn advance(&self, to: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.state.fetch_max(to as u8, Ordering::AcqRel))
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Deliver the terminal disconnect notification exactly once.
    fn emit_disconnect(&self, reason: DisconnectReason) {
        if self.disconnect_sent.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(?reason, peer = ?self.peer_addr, "connection disconnected");
        let _ = self.events.send(ConnectionEvent::Disconnected(reason));
    }

    /// Terminal path shared by the read loop and `close()`.
    fn finish(&self, reason: DisconnectReason) {
        self.advance(ConnectionState::Closing);
        let _ = self.shutdown.send(true);
        self.emit_disconnect(reason);
        self.advance(ConnectionState::Closed);
    }
}

/// One live duplex transport between two endpoints, with strictly
/// ordered reads and ordered, serialized writes.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Open a client connection to the given endpoint.
    ///
    /// The returned connection is in `Connecting` state; subscribe to
    /// events, then call [`start`](Self::start).
    pub async fn connect<A: ToSocketAddrs>(addr: A, config: ConnectionConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_stream(stream, config))
    }

    /// Wrap an already-accepted socket.
    ///
    /// Used by the server accept loop; also available for custom
    /// accept loops.
    pub fn from_stream(stream: TcpStream, config: ConnectionConfig) -> Self {
        let peer_addr = stream.peer_addr().ok();
        let (events, _) = broadcast::channel(config.event_capacity);
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(ConnectionInner {
                config,
                state: AtomicU8::new(ConnectionState::Connecting as u8),
                peer_addr,
                events,
                writer: OnceLock::new(),
                stream: Mutex::new(Some(stream)),
                shutdown,
                disconnect_sent: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe to connection events.
    ///
    /// Subscribe before [`start`](Self::start) to observe `Connected`
    /// and every subsequent event exactly once.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Start the read and write loops.
    ///
    /// Transitions Connecting → Connected and emits `Connected`.
    /// Starting twice is an error once the connection is past
    /// Connecting.
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;

        if inner
            .state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Connected as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(ActorwireError::ConnectionClosed);
        }

        let stream = inner
            .stream
            .lock()
            .take()
            .ok_or(ActorwireError::ConnectionClosed)?;

        let (read_half, write_half) = stream.into_split();

        let (writer, _writer_task) = spawn_writer_task(
            write_half,
            inner.config.writer.clone(),
            inner.shutdown.subscribe(),
        );
        let _ = inner.writer.set(writer);

        let read_inner = Arc::clone(inner);
        let read_shutdown = inner.shutdown.subscribe();
        tokio::spawn(read_loop(read_inner, read_half, read_shutdown));

        tracing::debug!(peer = ?inner.peer_addr, "connection started");
        let _ = inner.events.send(ConnectionEvent::Connected);
        Ok(())
    }

    /// Send one payload as a single framed unit.
    ///
    /// The payload is length-prefixed and queued as one ordered item;
    /// concurrent sends never interleave their bytes on the wire.
    pub async fn send(&self, payload: Bytes) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Err(ActorwireError::ConnectionClosed);
        }
        if payload.len() as u64 > self.inner.config.max_packet_size as u64 {
            return Err(ActorwireError::Protocol(format!(
                "Packet size {} exceeds maximum {}",
                payload.len(),
                self.inner.config.max_packet_size
            )));
        }
        let writer = self
            .inner
            .writer
            .get()
            .ok_or(ActorwireError::ConnectionClosed)?;
        writer.send(OutboundPacket::new(payload)).await
    }

    /// Serialize a value with the given codec and send it.
    ///
    /// A codec failure surfaces to this caller only; the connection is
    /// unaffected.
    pub async fn send_value<C: Codec, T: serde::Serialize>(
        &self,
        codec: &C,
        value: &T,
    ) -> Result<()> {
        let payload = codec.encode(value)?;
        self.send(Bytes::from(payload)).await
    }

    /// Initiate teardown.
    ///
    /// Unblocks the read loop mid-read and delivers
    /// `Disconnected(LocalClosed)` exactly once. Closing an
    /// already-closed connection is a no-op.
    pub fn close(&self) {
        let inner = &self.inner;

        let prev = inner.state();
        if prev >= ConnectionState::Closing {
            return;
        }

        if prev == ConnectionState::Connecting {
            // Never started: no read loop to run the terminal path.
            inner.finish(DisconnectReason::LocalClosed);
            // Drop the socket now.
            inner.stream.lock().take();
            return;
        }

        inner.advance(ConnectionState::Closing);
        // The read loop observes the signal, exits, and runs finish().
        let _ = inner.shutdown.send(true);
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Check if the connection is closing or closed.
    pub fn is_closed(&self) -> bool {
        self.state() >= ConnectionState::Closing
    }

    /// Get the remote peer address, if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    /// Get current pending send-queue depth.
    pub fn pending_sends(&self) -> usize {
        self.inner.writer.get().map_or(0, |w| w.pending_count())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.inner.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

/// Read loop: owns the receive buffer, publishes packets in arrival
/// order, and runs the terminal path on exit.
async fn read_loop(
    inner: Arc<ConnectionInner>,
    mut reader: tokio::net::tcp::OwnedReadHalf,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut packets = PacketBuffer::with_max_packet(inner.config.max_packet_size);
    let mut buf = vec![0u8; inner.config.read_buffer_size];

    let reason = loop {
        tokio::select! {
            res = reader.read(&mut buf) => match res {
                Ok(0) => break DisconnectReason::RemoteClosed,
                Ok(n) => match packets.push(&buf[..n]) {
                    Ok(decoded) => {
                        for packet in decoded {
                            let _ = inner.events.send(ConnectionEvent::Received(packet));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(peer = ?inner.peer_addr, error = %e, "framing violation");
                        break DisconnectReason::Protocol(e.to_string());
                    }
                },
                Err(e) => break DisconnectReason::Transport(e.to_string()),
            },
            // wait_for checks the current value first, so a close that
            // raced task startup is still observed.
            _ = shutdown.wait_for(|v| *v) => {
                break DisconnectReason::LocalClosed;
            }
        }
    };

    inner.finish(reason);
}
