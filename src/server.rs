//! Server accept loop.
//!
//! Binds an endpoint, accepts incoming sockets, wraps each into a
//! [`Connection`], and publishes a new-connection event per accepted
//! socket. Per-accept errors are logged and the loop continues; a fatal
//! bind/listen error is surfaced once from [`Server::bind`].
//!
//! # Example
//!
//! ```ignore
//! let server = Server::bind("127.0.0.1:9000", ConnectionConfig::default()).await?;
//! let mut incoming = server.start();
//! while let Some(conn) = incoming.recv().await {
//!     let mut events = conn.subscribe();
//!     conn.start()?;
//!     // handle events...
//! }
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::{mpsc, watch};

use crate::connection::{Connection, ConnectionConfig};
use crate::error::Result;

/// Capacity of the new-connection event channel.
const NEW_CONNECTION_CAPACITY: usize = 64;

/// A bound TCP server publishing accepted connections.
pub struct Server {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    config: ConnectionConfig,
    shutdown: watch::Sender<bool>,
    started: AtomicBool,
}

impl Server {
    /// Bind the listening endpoint.
    ///
    /// A bind/listen failure is fatal and surfaced here, once.
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: ConnectionConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            config,
            shutdown,
            started: AtomicBool::new(false),
        })
    }

    /// Get the bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the accept loop.
    ///
    /// Returns the receiver of new-connection events; each accepted
    /// socket arrives as an unstarted [`Connection`] (subscribe, then
    /// call `start()` on it). Calling `start` a second time returns a
    /// receiver that yields nothing.
    pub fn start(&self) -> mpsc::Receiver<Connection> {
        let (tx, rx) = mpsc::channel(NEW_CONNECTION_CAPACITY);

        if self.started.swap(true, Ordering::AcqRel) {
            tracing::warn!("server accept loop already started");
            return rx;
        }

        let listener = match self.listener.lock().take() {
            Some(l) => l,
            None => return rx,
        };

        let config = self.config.clone();
        let shutdown = self.shutdown.subscribe();

        tokio::spawn(accept_loop(listener, config, tx, shutdown));

        rx
    }

    /// Stop the accept loop.
    ///
    /// Already-published connections are unaffected. Idempotent.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Accept loop: wrap each socket, publish it, keep going on per-accept
/// errors.
async fn accept_loop(
    listener: TcpListener,
    config: ConnectionConfig,
    tx: mpsc::Sender<Connection>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!(addr = %listener.local_addr().map(|a| a.to_string()).unwrap_or_default(), "accept loop running");

    loop {
        tokio::select! {
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "accepted connection");
                    let conn = Connection::from_stream(stream, config.clone());
                    if tx.send(conn).await.is_err() {
                        // Consumer dropped the receiver; nobody wants
                        // further connections.
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            },
            // wait_for checks the current value first, so a stop() that
            // raced loop startup is still observed. The Ref it yields is
            // dropped here so the select output stays Send.
            _ = async { let _ = shutdown.wait_for(|v| *v).await; } => break,
        }
    }

    tracing::debug!("accept loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionEvent, ConnectionState};
    use bytes::Bytes;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_bind_error_is_fatal() {
        // Port 1 is privileged; binding fails without root.
        let result = Server::bind("127.0.0.1:1", ConnectionConfig::default()).await;
        if result.is_ok() {
            // Running as root: fall back to an address that cannot bind.
            let result = Server::bind("255.255.255.255:0", ConnectionConfig::default()).await;
            assert!(result.is_err());
        }
    }

    #[tokio::test]
    async fn test_accept_publishes_connection() {
        let server = Server::bind("127.0.0.1:0", ConnectionConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr();
        let mut incoming = server.start();

        let _client = TcpStream::connect(addr).await.unwrap();

        let conn = incoming.recv().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_accepted_connection_receives_sends() {
        let server = Server::bind("127.0.0.1:0", ConnectionConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr();
        let mut incoming = server.start();

        let mut client = TcpStream::connect(addr).await.unwrap();

        let conn = incoming.recv().await.unwrap();
        conn.start().unwrap();
        conn.send(Bytes::from_static(b"welcome")).await.unwrap();

        let mut buf = [0u8; 11];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 7]);
        assert_eq!(&buf[4..], b"welcome");
    }

    #[tokio::test]
    async fn test_multiple_accepts() {
        let server = Server::bind("127.0.0.1:0", ConnectionConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr();
        let mut incoming = server.start();

        let _c1 = TcpStream::connect(addr).await.unwrap();
        let _c2 = TcpStream::connect(addr).await.unwrap();
        let _c3 = TcpStream::connect(addr).await.unwrap();

        for _ in 0..3 {
            assert!(incoming.recv().await.is_some());
        }
    }

    #[tokio::test]
    async fn test_stop_halts_accept_loop() {
        let server = Server::bind("127.0.0.1:0", ConnectionConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr();
        let mut incoming = server.start();

        server.stop();
        server.stop(); // idempotent

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // New dials are no longer published.
        let _late = TcpStream::connect(addr).await;
        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), incoming.recv()).await;
        assert!(matches!(result, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn test_end_to_end_echo() {
        let server = Server::bind("127.0.0.1:0", ConnectionConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr();
        let mut incoming = server.start();

        // Server side: echo every received packet back.
        tokio::spawn(async move {
            while let Some(conn) = incoming.recv().await {
                let mut events = conn.subscribe();
                conn.start().unwrap();
                let echo = conn.clone();
                tokio::spawn(async move {
                    while let Ok(event) = events.recv().await {
                        match event {
                            ConnectionEvent::Received(packet) => {
                                let _ = echo.send(packet.payload_bytes()).await;
                            }
                            ConnectionEvent::Disconnected(_) => break,
                            ConnectionEvent::Connected => {}
                        }
                    }
                });
            }
        });

        let client = Connection::connect(addr, ConnectionConfig::default())
            .await
            .unwrap();
        let mut events = client.subscribe();
        client.start().unwrap();
        client.send(Bytes::from_static(b"ping")).await.unwrap();

        loop {
            match events.recv().await.unwrap() {
                ConnectionEvent::Received(packet) => {
                    assert_eq!(packet.payload(), b"ping");
                    break;
                }
                ConnectionEvent::Connected => {}
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }
}
