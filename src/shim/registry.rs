//! Client registry and connection lifecycle.
//!
//! Maps each live [`ConnectionId`] to its decoder. Driven by stream
//! readiness, one [`StreamFrame`] at a time:
//!
//! ```text
//!            first frame              frame, decoder still open
//! Unknown ───────────────► Active ◄──────────────────────────┐
//!    ▲                       │  └────────────────────────────┘
//!    │   evict + notify      │ decoder reports Closed after consume
//!    └───────────────────────┘
//! ```
//!
//! Within one frame the order is fixed: `on_new_client` (if unseen), then
//! consume, then every decoded message to `on_incoming_message`, then, if
//! the decoder closed, eviction and `on_client_removed`. A reappearing
//! identity after eviction is a new client.
//!
//! A disconnect frame for an identity with no entry is dropped: the
//! connection either never delivered data or has already been evicted.

// ============================================================================
// Imports
// ============================================================================

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::protocol::Message;
use crate::transport::StreamFrame;

use super::decoder::{ConnectionDecoder, DecoderFactory, DecoderIo};
use super::policy::{GatewayPolicy, Outlet};

// ============================================================================
// ClientRegistry
// ============================================================================

/// Live connections of one worker, keyed by identity.
pub struct ClientRegistry<D> {
    clients: FxHashMap<ConnectionId, D>,
    /// Messages delivered by the decoder during the current consume step.
    delivered: Vec<Message>,
}

impl<D> Default for ClientRegistry<D> {
    fn default() -> Self {
        Self {
            clients: FxHashMap::default(),
            delivered: Vec::new(),
        }
    }
}

impl<D: ConnectionDecoder> ClientRegistry<D> {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of active connections.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if no connection is active.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Returns `true` if `identity` has a live entry.
    #[inline]
    #[must_use]
    pub fn contains(&self, identity: &ConnectionId) -> bool {
        self.clients.contains_key(identity)
    }

    /// Processes one chunk of stream data.
    ///
    /// # Errors
    ///
    /// Decoder faults and policy errors propagate unchanged.
    pub fn handle_frame<F, P>(
        &mut self,
        frame: StreamFrame,
        factory: &mut F,
        policy: &mut P,
        outlet: &mut Outlet<'_>,
    ) -> Result<()>
    where
        F: DecoderFactory<Decoder = D>,
        P: GatewayPolicy + ?Sized,
    {
        if frame.is_disconnect() && !self.clients.contains_key(&frame.identity) {
            trace!(identity = %frame.identity, "Disconnect of unregistered connection");
            return Ok(());
        }

        let StreamFrame { identity, data } = frame;

        let decoder = match self.clients.entry(identity.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let decoder = entry.insert(factory.create(&identity));
                debug!(%identity, "Client connected");
                policy.on_new_client(&identity, outlet)?;
                decoder
            }
        };

        self.delivered.clear();
        let mut io = DecoderIo::new(&identity, outlet.stream(), &mut self.delivered);
        decoder.consume(&data, &mut io)?;
        let closed = decoder.state().is_closed();

        for message in self.delivered.drain(..) {
            policy.on_incoming_message(&identity, message, outlet)?;
        }

        if closed {
            self.clients.remove(&identity);
            debug!(%identity, remaining = self.clients.len(), "Client removed");
            policy.on_client_removed(&identity, outlet)?;
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
