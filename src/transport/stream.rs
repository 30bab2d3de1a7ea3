//! TCP raw stream endpoint.
//!
//! Serves many client sockets behind one endpoint. Every accepted socket is
//! assigned a [`ConnectionId`] and all inbound bytes are delivered as
//! [`StreamFrame`]s tagged with it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │           TcpStreamEndpoint                 │
//! │  accept task ──► per-socket reader task ──┐ │
//! │                  per-socket writer task   │ │
//! │  peers: ConnectionId → writer queue       ▼ │
//! │  frames: (identity, bytes) ──────────► recv │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! All tasks are spawned on the runtime that calls [`bind`], which for a
//! worker is its own single-threaded runtime.
//!
//! # Disconnects
//!
//! - Client hang-up: a zero-length frame is delivered, if the connection
//!   had delivered data before.
//! - Server close: sending a zero-length buffer closes the socket. Data the
//!   socket had already queued is discarded and a single zero-length frame
//!   is delivered in its place.
//!
//! [`bind`]: StreamEndpoint::bind

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::endpoint::{StreamEndpoint, StreamFrame, StreamSink};

// ============================================================================
// Constants
// ============================================================================

/// Default size of a single socket read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8192;

/// Scheme served by this endpoint (without `://`).
const TCP_SCHEME: &str = "tcp";

// ============================================================================
// Types
// ============================================================================

/// Live connection as seen by the endpoint.
struct Peer {
    /// Outbound queue drained by the writer task.
    writer: mpsc::UnboundedSender<Vec<u8>>,
    /// Reader task handle, aborted on endpoint drop.
    reader: AbortHandle,
}

/// Map of identities to live connections.
type PeerMap = FxHashMap<ConnectionId, Peer>;

/// Entry of the inbound queue.
enum Inbound {
    /// Bytes read from a socket, or a zero-length hang-up frame.
    Data(StreamFrame),
    /// Closed by the server; queued data ahead of it is stale.
    Closed(ConnectionId),
}

/// State shared with the accept and reader tasks.
struct Shared {
    /// Readers only enqueue while holding this lock and still registered.
    peers: Mutex<PeerMap>,
    frames: mpsc::UnboundedSender<Inbound>,
    sequence: AtomicU32,
    read_buffer_size: usize,
    nodelay: bool,
}

// ============================================================================
// TcpStreamEndpoint
// ============================================================================

/// Raw TCP stream endpoint with per-connection identities.
pub struct TcpStreamEndpoint {
    shared: Arc<Shared>,
    frames: mpsc::UnboundedReceiver<Inbound>,
    /// Server-closed identities whose close marker is still queued.
    closing: FxHashSet<ConnectionId>,
    /// Address and accept task of the single binding.
    binding: Option<Binding>,
}

/// An established binding.
struct Binding {
    address: String,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl TcpStreamEndpoint {
    /// Creates an unbound endpoint.
    ///
    /// # Arguments
    ///
    /// * `read_buffer_size` - Maximum bytes per delivered frame
    /// * `nodelay` - Set `TCP_NODELAY` on accepted sockets
    #[must_use]
    pub fn new(read_buffer_size: usize, nodelay: bool) -> Self {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();

        Self {
            shared: Arc::new(Shared {
                peers: Mutex::new(FxHashMap::default()),
                frames: frames_tx,
                sequence: AtomicU32::new(1),
                read_buffer_size: read_buffer_size.max(1),
                nodelay,
            }),
            frames: frames_rx,
            closing: FxHashSet::default(),
            binding: None,
        }
    }

    /// Returns the bound socket address, if bound.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.binding.as_ref().map(|b| b.local_addr)
    }

    /// Returns the number of live connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.shared.peers.lock().len()
    }
}

impl Default for TcpStreamEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_READ_BUFFER_SIZE, true)
    }
}

impl Drop for TcpStreamEndpoint {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.accept_task.abort();
            debug!(address = %binding.address, "Stream endpoint released");
        }

        // Dropping the writer queues ends the writer tasks
        for (_, peer) in self.shared.peers.lock().drain() {
            peer.reader.abort();
        }
    }
}

// ============================================================================
// Endpoint Implementation
// ============================================================================

impl StreamSink for TcpStreamEndpoint {
    fn send_to(&mut self, identity: &ConnectionId, data: Vec<u8>) -> Result<()> {
        let mut peers = self.shared.peers.lock();

        if data.is_empty() {
            if let Some(peer) = peers.remove(identity) {
                peer.reader.abort();
                self.closing.insert(identity.clone());
                let _ = self.shared.frames.send(Inbound::Closed(identity.clone()));
                debug!(%identity, "Connection closed by server");
            }
            return Ok(());
        }

        match peers.get(identity) {
            Some(peer) => {
                trace!(%identity, bytes = data.len(), "Queued stream write");
                // Writer gone means the socket is closing; reader reports it
                let _ = peer.writer.send(data);
            }
            None => {
                debug!(%identity, "Dropped write to unknown connection");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl StreamEndpoint for TcpStreamEndpoint {
    async fn bind(&mut self, address: &str) -> Result<()> {
        if let Some(binding) = &self.binding {
            return Err(Error::already_bound(binding.address.clone()));
        }

        let socket_addr = parse_tcp_address(address)?;
        let listener = TcpListener::bind(socket_addr.as_str()).await?;
        let local_addr = listener.local_addr()?;

        let shared = Arc::clone(&self.shared);
        let accept_task = tokio::spawn(accept_loop(listener, shared));

        info!(%address, %local_addr, "Stream endpoint bound");

        self.binding = Some(Binding {
            address: address.to_string(),
            local_addr,
            accept_task,
        });

        Ok(())
    }

    async fn recv(&mut self) -> Result<StreamFrame> {
        loop {
            let inbound = self
                .frames
                .recv()
                .await
                .ok_or_else(|| Error::endpoint_closed("stream"))?;

            match inbound {
                Inbound::Data(frame) if self.closing.contains(&frame.identity) => {
                    trace!(identity = %frame.identity, "Discarded data of closed connection");
                }
                Inbound::Data(frame) => return Ok(frame),
                Inbound::Closed(identity) => {
                    self.closing.remove(&identity);
                    return Ok(StreamFrame::disconnected(identity));
                }
            }
        }
    }
}

// ============================================================================
// Address Parsing
// ============================================================================

/// Parses `tcp://host:port` into a `host:port` string for binding.
///
/// `*` as host means all IPv4 interfaces.
///
/// # Errors
///
/// - [`Error::UnsupportedScheme`] if the scheme is not `tcp`
/// - [`Error::InvalidAddress`] if host or port is missing or malformed
pub fn parse_tcp_address(address: &str) -> Result<String> {
    let normalized = address.replacen("://*:", "://0.0.0.0:", 1);

    let url = Url::parse(&normalized)
        .map_err(|e| Error::invalid_address(address, e.to_string()))?;

    if url.scheme() != TCP_SCHEME {
        return Err(Error::unsupported_scheme(url.scheme()));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::invalid_address(address, "missing host"))?;
    let port = url
        .port()
        .ok_or_else(|| Error::invalid_address(address, "missing port"))?;

    Ok(format!("{host}:{port}"))
}

// ============================================================================
// Tasks
// ============================================================================

/// Accepts sockets until aborted.
async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    debug!("Accept loop started");

    loop {
        match listener.accept().await {
            Ok((socket, addr)) => register(socket, addr, &shared),
            Err(e) => {
                warn!(error = %e, "Accept failed");
            }
        }
    }
}

/// Assigns an identity and spawns the socket's reader and writer tasks.
fn register(socket: TcpStream, addr: SocketAddr, shared: &Arc<Shared>) {
    if shared.nodelay
        && let Err(e) = socket.set_nodelay(true)
    {
        warn!(error = %e, ?addr, "Failed to set TCP_NODELAY");
    }

    let identity = ConnectionId::from_sequence(shared.sequence.fetch_add(1, Ordering::Relaxed));
    let (read_half, write_half) = socket.into_split();
    let (writer_tx, writer_rx) = mpsc::unbounded_channel();

    tokio::spawn(write_loop(write_half, writer_rx, identity.clone()));

    // Insert under the lock so the reader cannot observe EOF before the peer exists
    let mut peers = shared.peers.lock();
    let reader = tokio::spawn(read_loop(read_half, identity.clone(), Arc::clone(shared)));
    peers.insert(
        identity.clone(),
        Peer {
            writer: writer_tx,
            reader: reader.abort_handle(),
        },
    );
    drop(peers);

    debug!(%identity, ?addr, "Connection accepted");
}

/// Forwards socket bytes as frames until EOF or error.
async fn read_loop(mut read_half: OwnedReadHalf, identity: ConnectionId, shared: Arc<Shared>) {
    let mut buf = vec![0u8; shared.read_buffer_size];
    let mut delivered = false;

    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                delivered = true;
                let peers = shared.peers.lock();
                if !peers.contains_key(&identity) {
                    return;
                }
                let frame = StreamFrame::new(identity.clone(), buf[..n].to_vec());
                if shared.frames.send(Inbound::Data(frame)).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!(%identity, error = %e, "Socket read failed");
                break;
            }
        }
    }

    {
        let mut peers = shared.peers.lock();
        if peers.remove(&identity).is_some() && delivered {
            let frame = StreamFrame::disconnected(identity.clone());
            let _ = shared.frames.send(Inbound::Data(frame));
        }
    }

    debug!(%identity, "Connection ended");
}

/// Drains the outbound queue into the socket.
async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
    identity: ConnectionId,
) {
    while let Some(data) = queue.recv().await {
        if let Err(e) = write_half.write_all(&data).await {
            debug!(%identity, error = %e, "Socket write failed");
            break;
        }
    }

    let _ = write_half.shutdown().await;
}

// ============================================================================
// Tests
// ============================================================================
