//! Connection decoder contract.
//!
//! A decoder owns everything about one client connection that happens
//! below the application message: receive buffering, handshake, frame
//! parsing, unmasking, control frames. The shim only relies on this
//! contract:
//!
//! - [`consume`] is called once per chunk of raw data for the connection,
//!   including the zero-length chunk that reports a disconnect.
//! - Decoded application messages are handed out through
//!   [`DecoderIo::deliver`] during `consume`.
//! - [`state`] eventually reports [`ConnectionState::Closed`] for any
//!   stream that cannot continue, and never leaves `Closed`.
//! - An error returned from `consume` is an uncaught fault and stops the
//!   whole worker.
//!
//! [`consume`]: ConnectionDecoder::consume
//! [`state`]: ConnectionDecoder::state

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::protocol::Message;
use crate::transport::StreamSink;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection as reported by its decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Handshake not finished yet.
    #[default]
    Connecting,
    /// Exchanging messages.
    Active,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Returns `true` for the terminal state.
    #[inline]
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

// ============================================================================
// DecoderIo
// ============================================================================

/// What a decoder may touch while consuming data.
pub struct DecoderIo<'a> {
    identity: &'a ConnectionId,
    stream: &'a mut dyn StreamSink,
    delivered: &'a mut Vec<Message>,
}

impl<'a> DecoderIo<'a> {
    /// Creates the I/O handle for one consume step.
    pub fn new(
        identity: &'a ConnectionId,
        stream: &'a mut dyn StreamSink,
        delivered: &'a mut Vec<Message>,
    ) -> Self {
        Self {
            identity,
            stream,
            delivered,
        }
    }

    /// Returns the connection being decoded.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &ConnectionId {
        self.identity
    }

    /// Writes raw bytes back to this connection (handshake replies, pongs).
    pub fn write_raw(&mut self, data: Vec<u8>) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.stream.send_to(self.identity, data)
    }

    /// Closes this connection at the transport level.
    pub fn close(&mut self) -> Result<()> {
        self.stream.send_to(self.identity, Vec::new())
    }

    /// Hands a decoded application message to the gateway policy.
    ///
    /// Messages reach the policy in delivery order, after `consume` returns
    /// and before the connection is evicted.
    #[inline]
    pub fn deliver(&mut self, message: Message) {
        self.delivered.push(message);
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Per-connection WebSocket decoder.
pub trait ConnectionDecoder: Send {
    /// Consumes one chunk of raw data received for this connection.
    ///
    /// An empty `data` slice means the peer disconnected.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the worker.
    fn consume(&mut self, data: &[u8], io: &mut DecoderIo<'_>) -> Result<()>;

    /// Returns the current connection state.
    fn state(&self) -> ConnectionState;
}

/// Creates a decoder for each newly seen connection.
pub trait DecoderFactory: Send {
    /// Decoder type produced.
    type Decoder: ConnectionDecoder;

    /// Creates a decoder bound to `identity`.
    fn create(&mut self, identity: &ConnectionId) -> Self::Decoder;
}

impl<F, D> DecoderFactory for F
where
    F: FnMut(&ConnectionId) -> D + Send,
    D: ConnectionDecoder,
{
    type Decoder = D;

    #[inline]
    fn create(&mut self, identity: &ConnectionId) -> D {
        self(identity)
    }
}

// ============================================================================
// Tests
// ============================================================================
