//! Gateway policy capability.
//!
//! The event loop decides *when* things happen; a [`GatewayPolicy`] decides
//! *where* messages go. Policies are injected at construction, so the same
//! loop serves one-to-one routing, broadcast, or anything else.
//!
//! Every hook receives an [`Outlet`] for writing to clients, writing to the
//! bridge, and stopping the loop. Hooks run on the loop thread and must not
//! block.

// ============================================================================
// Imports
// ============================================================================

use tracing::trace;

use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::protocol::{Message, frame};
use crate::transport::{MessageSink, StreamSink};

use super::event_loop::StopSignal;

// ============================================================================
// GatewayPolicy
// ============================================================================

/// Routing hooks invoked by the event loop.
///
/// Returning an error from any hook terminates the worker.
pub trait GatewayPolicy: Send {
    /// Called with each message read from the bridge, in arrival order.
    fn on_outgoing_message(&mut self, message: Message, outlet: &mut Outlet<'_>) -> Result<()>;

    /// Called with each message a client's decoder produced.
    fn on_incoming_message(
        &mut self,
        identity: &ConnectionId,
        message: Message,
        outlet: &mut Outlet<'_>,
    ) -> Result<()>;

    /// Called when data first arrives from an identity not in the registry.
    fn on_new_client(&mut self, identity: &ConnectionId, outlet: &mut Outlet<'_>) -> Result<()>;

    /// Called after a closed client has been evicted from the registry.
    fn on_client_removed(&mut self, identity: &ConnectionId, outlet: &mut Outlet<'_>)
    -> Result<()>;
}

// ============================================================================
// Outlet
// ============================================================================

/// Write access handed to policy hooks.
pub struct Outlet<'a> {
    stream: &'a mut dyn StreamSink,
    bridge: &'a mut dyn MessageSink,
    stop: &'a mut StopSignal,
}

impl<'a> Outlet<'a> {
    /// Creates an outlet over the loop's sinks.
    pub fn new(
        stream: &'a mut dyn StreamSink,
        bridge: &'a mut dyn MessageSink,
        stop: &'a mut StopSignal,
    ) -> Self {
        Self {
            stream,
            bridge,
            stop,
        }
    }

    /// Frames one payload part and sends it to a client.
    ///
    /// `more` marks that further parts of the same logical message follow.
    pub fn write_outgoing(
        &mut self,
        identity: &ConnectionId,
        payload: &[u8],
        more: bool,
    ) -> Result<()> {
        trace!(%identity, bytes = payload.len(), more, "Writing frame");
        self.stream.send_to(identity, frame::encode(payload, more))
    }

    /// Frames every part of `message` and sends them to a client.
    ///
    /// All parts but the last carry the continuation flag. An empty message
    /// writes nothing.
    pub fn write_message(&mut self, identity: &ConnectionId, message: &Message) -> Result<()> {
        let last = message.len().saturating_sub(1);
        for (index, part) in message.iter().enumerate() {
            self.write_outgoing(identity, part, index < last)?;
        }
        Ok(())
    }

    /// Sends a message to the rest of the system over the bridge.
    pub fn write_incoming(&mut self, message: Message) -> Result<()> {
        self.bridge.send(message)
    }

    /// Closes a client connection at the transport level.
    pub fn disconnect(&mut self, identity: &ConnectionId) -> Result<()> {
        self.stream.send_to(identity, Vec::new())
    }

    /// Requests the loop to stop after the current handler.
    ///
    /// See [`StopSignal::request`].
    #[inline]
    pub fn stop(&mut self, graceful: bool) {
        self.stop.request(graceful);
    }

    /// Returns the stream sink for decoder I/O.
    #[inline]
    pub(crate) fn stream(&mut self) -> &mut dyn StreamSink {
        &mut *self.stream
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::shim::event_loop::StopMode;
    use crate::shim::testing::{RecordingBridge, RecordingStream};

    #[test]
    fn test_write_message_sets_continuation_flags() {
        let id = ConnectionId::from_sequence(1);
        let mut stream = RecordingStream::default();
        let mut bridge = RecordingBridge::default();
        let mut stop = StopSignal::default();

        let mut outlet = Outlet::new(&mut stream, &mut bridge, &mut stop);
        outlet
            .write_message(&id, &Message::from_parts(["a", "b"]))
            .expect("write");

        assert_eq!(
            stream.sent(),
            vec![
                (id.clone(), vec![0x82, 0x02, 0x01, b'a']),
                (id, vec![0x82, 0x02, 0x00, b'b']),
            ]
        );
    }

    #[test]
    fn test_write_incoming_and_stop() {
        let mut stream = RecordingStream::default();
        let mut bridge = RecordingBridge::default();
        let mut stop = StopSignal::default();

        let mut outlet = Outlet::new(&mut stream, &mut bridge, &mut stop);
        outlet
            .write_incoming(Message::from_parts(["up"]))
            .expect("bridge");
        outlet.stop(true);

        assert_eq!(bridge.sent(), vec![Message::from_parts(["up"])]);
        assert_eq!(stop.mode(), Some(StopMode::Graceful));
    }

    #[test]
    fn test_empty_message_writes_nothing() {
        let mut stream = RecordingStream::default();
        let mut bridge = RecordingBridge::default();
        let mut stop = StopSignal::default();

        let mut outlet = Outlet::new(&mut stream, &mut bridge, &mut stop);
        outlet
            .write_message(&ConnectionId::from_sequence(1), &Message::new())
            .expect("write");

        assert!(stream.sent().is_empty());
    }
}
