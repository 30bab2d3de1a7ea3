//! Endpoint traits the event loop multiplexes over.
//!
//! The loop owns three endpoints and waits on all of them at once:
//!
//! | Endpoint | Trait | Carries |
//! |----------|-------|---------|
//! | control | [`PairEndpoint`] | [`ControlCommand`](crate::protocol::ControlCommand) requests, status replies |
//! | bridge | [`PairEndpoint`] | [`Message`]s to and from the rest of the system |
//! | stream | [`StreamEndpoint`] | raw bytes per client [`ConnectionId`] |
//!
//! # Cancel Safety
//!
//! The loop races the `recv` futures of all three endpoints and drops the
//! losers. Every `recv` implementation must therefore be cancel-safe: a
//! dropped `recv` must not lose data. Channel-backed receivers satisfy this.
//!
//! # Sinks
//!
//! Sending never suspends. Outbound data is queued, so policy hooks and
//! decoders can write while the loop is mid-dispatch.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::protocol::Message;

// ============================================================================
// Sinks
// ============================================================================

/// Non-blocking writer of whole messages.
pub trait MessageSink: Send {
    /// Queues a message for the peer.
    ///
    /// # Errors
    ///
    /// - [`Error::EndpointClosed`](crate::Error::EndpointClosed) if the peer is gone
    fn send(&mut self, message: Message) -> Result<()>;
}

/// Non-blocking writer of raw bytes to one client connection.
pub trait StreamSink: Send {
    /// Queues bytes for the connection named by `identity`.
    ///
    /// Unknown identities are dropped without error.
    fn send_to(&mut self, identity: &ConnectionId, data: Vec<u8>) -> Result<()>;
}

// ============================================================================
// Endpoints
// ============================================================================

/// One side of an in-process pair pipe.
#[async_trait]
pub trait PairEndpoint: MessageSink {
    /// Waits for the next complete message.
    ///
    /// # Errors
    ///
    /// - [`Error::EndpointClosed`](crate::Error::EndpointClosed) if the peer is gone
    async fn recv(&mut self) -> Result<Message>;
}

/// Raw byte stream shared by all clients of one worker.
#[async_trait]
pub trait StreamEndpoint: StreamSink {
    /// Binds to a transport address such as `tcp://127.0.0.1:8080`.
    ///
    /// # Errors
    ///
    /// Any bind error; see [`Error::status_code`](crate::Error::status_code).
    async fn bind(&mut self, address: &str) -> Result<()>;

    /// Waits for the next chunk of data from any client.
    ///
    /// A zero-length chunk reports that the client disconnected.
    async fn recv(&mut self) -> Result<StreamFrame>;
}

// ============================================================================
// StreamFrame
// ============================================================================

/// One chunk read from the stream, tagged with its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    /// Connection the data arrived on.
    pub identity: ConnectionId,
    /// Raw bytes; empty on disconnect.
    pub data: Vec<u8>,
}

impl StreamFrame {
    /// Creates a data frame.
    #[inline]
    #[must_use]
    pub fn new(identity: ConnectionId, data: Vec<u8>) -> Self {
        Self { identity, data }
    }

    /// Creates a disconnect notification.
    #[inline]
    #[must_use]
    pub fn disconnected(identity: ConnectionId) -> Self {
        Self {
            identity,
            data: Vec::new(),
        }
    }

    /// Returns `true` if this frame reports a disconnect.
    #[inline]
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        self.data.is_empty()
    }
}
