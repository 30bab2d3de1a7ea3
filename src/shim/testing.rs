//! Test doubles for the shim: recording sinks, instrumented endpoints, a
//! scripted decoder and a recording policy.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::Message;
use crate::transport::{MessageSink, PairEndpoint, StreamEndpoint, StreamFrame, StreamSink};

use super::decoder::{ConnectionDecoder, ConnectionState, DecoderIo};
use super::policy::{GatewayPolicy, Outlet};

// ============================================================================
// Release Tracking
// ============================================================================

/// Shared log of endpoint names in drop order.
pub type ReleaseLog = Arc<Mutex<Vec<&'static str>>>;

/// Wraps an endpoint and records its release.
pub struct Tracked<T> {
    inner: T,
    name: &'static str,
    log: ReleaseLog,
}

impl<T> Tracked<T> {
    pub fn new(inner: T, name: &'static str, log: &ReleaseLog) -> Self {
        Self {
            inner,
            name,
            log: Arc::clone(log),
        }
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.log.lock().push(self.name);
    }
}

impl<T: MessageSink> MessageSink for Tracked<T> {
    fn send(&mut self, message: Message) -> Result<()> {
        self.inner.send(message)
    }
}

#[async_trait]
impl<T: PairEndpoint> PairEndpoint for Tracked<T> {
    async fn recv(&mut self) -> Result<Message> {
        self.inner.recv().await
    }
}

impl<T: StreamSink> StreamSink for Tracked<T> {
    fn send_to(&mut self, identity: &ConnectionId, data: Vec<u8>) -> Result<()> {
        self.inner.send_to(identity, data)
    }
}

#[async_trait]
impl<T: StreamEndpoint> StreamEndpoint for Tracked<T> {
    async fn bind(&mut self, address: &str) -> Result<()> {
        self.inner.bind(address).await
    }

    async fn recv(&mut self) -> Result<StreamFrame> {
        self.inner.recv().await
    }
}

// ============================================================================
// RecordingStream
// ============================================================================

/// Stream endpoint fed from a channel that records writes and binds.
#[derive(Default)]
pub struct RecordingStream {
    sent: Arc<Mutex<Vec<(ConnectionId, Vec<u8>)>>>,
    binds: Arc<Mutex<Vec<String>>>,
    bind_error: Option<i32>,
    frames: Option<mpsc::UnboundedReceiver<StreamFrame>>,
}

impl RecordingStream {
    /// Creates a stream and the sender that feeds its `recv`.
    pub fn with_feed() -> (Self, mpsc::UnboundedSender<StreamFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = Self {
            frames: Some(rx),
            ..Self::default()
        };
        (stream, tx)
    }

    /// Makes every bind fail with the given OS error number.
    pub fn failing_bind(mut self, os_error: i32) -> Self {
        self.bind_error = Some(os_error);
        self
    }

    pub fn sent(&self) -> Vec<(ConnectionId, Vec<u8>)> {
        self.sent.lock().clone()
    }

    pub fn sent_handle(&self) -> Arc<Mutex<Vec<(ConnectionId, Vec<u8>)>>> {
        Arc::clone(&self.sent)
    }

    pub fn binds_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.binds)
    }
}

impl StreamSink for RecordingStream {
    fn send_to(&mut self, identity: &ConnectionId, data: Vec<u8>) -> Result<()> {
        self.sent.lock().push((identity.clone(), data));
        Ok(())
    }
}

#[async_trait]
impl StreamEndpoint for RecordingStream {
    async fn bind(&mut self, address: &str) -> Result<()> {
        self.binds.lock().push(address.to_string());
        match self.bind_error {
            Some(code) => Err(Error::Io(std::io::Error::from_raw_os_error(code))),
            None => Ok(()),
        }
    }

    async fn recv(&mut self) -> Result<StreamFrame> {
        match self.frames.as_mut() {
            Some(frames) => frames
                .recv()
                .await
                .ok_or_else(|| Error::endpoint_closed("stream")),
            None => std::future::pending().await,
        }
    }
}

// ============================================================================
// RecordingBridge
// ============================================================================

/// Bridge sink that records what the shim sends upward.
#[derive(Default)]
pub struct RecordingBridge {
    sent: Vec<Message>,
}

impl RecordingBridge {
    pub fn sent(&self) -> Vec<Message> {
        self.sent.clone()
    }
}

impl MessageSink for RecordingBridge {
    fn send(&mut self, message: Message) -> Result<()> {
        self.sent.push(message);
        Ok(())
    }
}

// ============================================================================
// ScriptedDecoder
// ============================================================================

/// Decoder driven by the chunk contents.
///
/// | Chunk | Effect |
/// |-------|--------|
/// | empty or `close` | closes |
/// | `last:<rest>` | delivers `<rest>`, then closes |
/// | `fault` | returns an error |
/// | anything else | delivers the chunk as a one-part message |
#[derive(Debug, Default)]
pub struct ScriptedDecoder {
    state: ConnectionState,
}

impl ConnectionDecoder for ScriptedDecoder {
    fn consume(&mut self, data: &[u8], io: &mut DecoderIo<'_>) -> Result<()> {
        if data.is_empty() || data == b"close" {
            self.state = ConnectionState::Closed;
        } else if let Some(rest) = data.strip_prefix(b"last:") {
            io.deliver(Message::from_parts([rest.to_vec()]));
            self.state = ConnectionState::Closed;
        } else if data == b"fault" {
            return Err(Error::decoder(io.identity().clone(), "scripted fault"));
        } else {
            io.deliver(Message::from_parts([data.to_vec()]));
            self.state = ConnectionState::Active;
        }
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

// ============================================================================
// RecordingPolicy
// ============================================================================

/// Hook invocation as seen by [`RecordingPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEvent {
    NewClient(ConnectionId),
    Incoming(ConnectionId, Message),
    Removed(ConnectionId),
    Outgoing(Message),
}

/// Policy that records hook calls and routes one-to-one.
///
/// Outgoing messages carry the target identity as first part. A first
/// payload part of `stop-graceful` or `stop-now` stops the loop.
#[derive(Default, Clone)]
pub struct RecordingPolicy {
    events: Arc<Mutex<Vec<PolicyEvent>>>,
}

impl RecordingPolicy {
    pub fn events(&self) -> Vec<PolicyEvent> {
        self.events.lock().clone()
    }
}

impl GatewayPolicy for RecordingPolicy {
    fn on_outgoing_message(&mut self, message: Message, outlet: &mut Outlet<'_>) -> Result<()> {
        self.events.lock().push(PolicyEvent::Outgoing(message.clone()));

        let mut message = message;
        let Some(identity) = message.pop_identity() else {
            return Ok(());
        };

        match message.first() {
            Some(b"stop-graceful") => outlet.stop(true),
            Some(b"stop-now") => outlet.stop(false),
            _ => outlet.write_message(&identity, &message)?,
        }
        Ok(())
    }

    fn on_incoming_message(
        &mut self,
        identity: &ConnectionId,
        message: Message,
        outlet: &mut Outlet<'_>,
    ) -> Result<()> {
        self.events
            .lock()
            .push(PolicyEvent::Incoming(identity.clone(), message.clone()));
        outlet.write_incoming(message.with_identity(identity))
    }

    fn on_new_client(&mut self, identity: &ConnectionId, _outlet: &mut Outlet<'_>) -> Result<()> {
        self.events
            .lock()
            .push(PolicyEvent::NewClient(identity.clone()));
        Ok(())
    }

    fn on_client_removed(
        &mut self,
        identity: &ConnectionId,
        _outlet: &mut Outlet<'_>,
    ) -> Result<()> {
        self.events.lock().push(PolicyEvent::Removed(identity.clone()));
        Ok(())
    }
}
