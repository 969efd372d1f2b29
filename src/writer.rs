//! Dedicated writer task for ordered frame sending.
//!
//! Send requests from arbitrary callers are serialized into one ordered
//! mpsc queue drained by a per-connection writer task. Two concurrent
//! send calls never interleave their bytes: each packet is queued as a
//! single unit (prefix + payload) and written as a whole.
//!
//! ```text
//! Caller 1 ─┐
//! Caller 2 ─┼─► mpsc::Sender<OutboundPacket> ─► Writer Task ─► Socket
//! Caller N ─┘
//! ```
//!
//! Multiple queued packets are batched into single vectored writes.
//! Backpressure is bounded-with-block: producers wait for queue space
//! up to a timeout, then fail with `BackpressureTimeout`.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::backpressure::BackpressureController;
use crate::error::{ActorwireError, Result};
use crate::protocol::{encode_len, LEN_PREFIX_SIZE};

/// Default maximum pending packets before backpressure kicks in.
pub const DEFAULT_MAX_PENDING_PACKETS: usize = 1024;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default backpressure timeout.
pub const DEFAULT_BACKPRESSURE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Maximum packets to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A framed packet ready to be written to the socket.
#[derive(Debug)]
pub struct OutboundPacket {
    /// Pre-encoded length prefix (4 bytes, Big Endian).
    pub prefix: [u8; LEN_PREFIX_SIZE],
    /// Payload bytes (may be empty).
    pub payload: Bytes,
}

impl OutboundPacket {
    /// Frame a payload for sending.
    #[inline]
    pub fn new(payload: Bytes) -> Self {
        Self {
            prefix: encode_len(payload.len() as u32),
            payload,
        }
    }

    /// Total wire size of this packet (prefix + payload).
    #[inline]
    pub fn size(&self) -> usize {
        LEN_PREFIX_SIZE + self.payload.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum pending packets before backpressure kicks in.
    pub max_pending_packets: usize,
    /// Channel capacity for the packet queue.
    pub channel_capacity: usize,
    /// Timeout when waiting for backpressure to clear.
    pub backpressure_timeout: std::time::Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_packets: DEFAULT_MAX_PENDING_PACKETS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
        }
    }
}

/// Handle for sending packets to the writer task.
///
/// Cheaply cloneable; shared by every producer on the connection.
#[derive(Clone)]
pub struct WriterHandle {
    /// Channel sender for packets.
    tx: mpsc::Sender<OutboundPacket>,
    /// Pending packet tracking (shared with the writer task).
    pressure: BackpressureController,
}

impl WriterHandle {
    /// Send a packet to the writer task.
    ///
    /// Waits for queue space if backpressure is active, failing with
    /// `BackpressureTimeout` after the configured duration.
    pub async fn send(&self, packet: OutboundPacket) -> Result<()> {
        self.pressure.reserve().await?;

        self.tx.send(packet).await.map_err(|_| {
            self.pressure.release();
            ActorwireError::ConnectionClosed
        })
    }

    /// Try to send a packet without waiting for backpressure.
    ///
    /// Returns `Err(BackpressureTimeout)` immediately if at capacity.
    pub fn try_send(&self, packet: OutboundPacket) -> Result<()> {
        self.pressure.try_reserve()?;

        self.tx.try_send(packet).map_err(|e| {
            self.pressure.release();
            match e {
                mpsc::error::TrySendError::Full(_) => ActorwireError::BackpressureTimeout,
                mpsc::error::TrySendError::Closed(_) => ActorwireError::ConnectionClosed,
            }
        })
    }

    /// Check if backpressure is currently active.
    #[inline]
    pub fn is_backpressure_active(&self) -> bool {
        self.pressure.is_active()
    }

    /// Get current pending packet count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pressure.pending_count()
    }
}

/// Spawn the writer task and return a handle for sending packets.
///
/// The task drains the queue until the channel closes or `shutdown`
/// signals, then drops the write half (sending FIN on TCP).
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
    shutdown: watch::Receiver<bool>,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let pressure = BackpressureController::with_timeout(
        config.max_pending_packets,
        config.backpressure_timeout,
    );

    let handle = WriterHandle {
        tx,
        pressure: pressure.clone(),
    };

    let task = tokio::spawn(writer_loop(rx, writer, pressure, shutdown));

    (handle, task)
}

/// Main writer loop - receives packets and writes them to the socket.
///
/// A dropped shutdown sender counts as shutdown.
async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundPacket>,
    mut writer: W,
    pressure: BackpressureController,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = tokio::select! {
            packet = rx.recv() => match packet {
                Some(p) => p,
                // All senders dropped, clean shutdown.
                None => return Ok(()),
            },
            // wait_for checks the current value first, so a shutdown
            // that raced task startup is still observed.
            _ = shutdown.wait_for(|v| *v) => return Ok(()),
        };

        // Collect additional ready packets (non-blocking).
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(packet) => batch.push(packet),
                Err(_) => break,
            }
        }

        let batch_size = batch.len();
        write_batch(&mut writer, &batch).await?;

        pressure.release_many(batch_size);
    }
}

/// Write a batch of packets using scatter/gather I/O (write_vectored).
///
/// Each packet contributes its prefix slice and, when non-empty, its
/// payload slice. Partial writes resume from the exact byte offset.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundPacket]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let mut slices: Vec<IoSlice<'_>> = Vec::with_capacity(batch.len() * 2);

    for packet in batch {
        slices.push(IoSlice::new(&packet.prefix));
        if !packet.payload.is_empty() {
            slices.push(IoSlice::new(&packet.payload));
        }
    }

    let total_size: usize = batch.iter().map(|p| p.size()).sum();

    let written = writer.write_vectored(&slices).await?;

    if written == total_size {
        writer.flush().await?;
        return Ok(());
    }

    if written == 0 {
        return Err(ActorwireError::Io(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "write_vectored returned 0",
        )));
    }

    // Partial write: continue with remaining data.
    let mut total_written = written;

    while total_written < total_size {
        let remaining_slices = build_remaining_slices(batch, total_written);
        if remaining_slices.is_empty() {
            break;
        }

        let written = writer.write_vectored(&remaining_slices).await?;
        if written == 0 {
            return Err(ActorwireError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }

        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build an IoSlice array for remaining data after a partial write.
fn build_remaining_slices(batch: &[OutboundPacket], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut skipped = 0;

    for packet in batch {
        let prefix_start = skipped;
        let prefix_end = skipped + LEN_PREFIX_SIZE;

        if skip_bytes < prefix_end {
            let start_in_prefix = skip_bytes.saturating_sub(prefix_start);
            slices.push(IoSlice::new(&packet.prefix[start_in_prefix..]));
        }
        skipped = prefix_end;

        if !packet.payload.is_empty() {
            let payload_start = skipped;
            let payload_end = skipped + packet.payload.len();

            if skip_bytes < payload_end {
                let start_in_payload = skip_bytes.saturating_sub(payload_start);
                slices.push(IoSlice::new(&packet.payload[start_in_payload..]));
            }
            skipped = payload_end;
        }
    }

    slices
}
