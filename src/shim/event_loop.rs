//! Worker event loop.
//!
//! The [`Shim`] owns the three endpoints of a worker and is the only code
//! that ever touches them, the registry, or the policy. Each iteration waits
//! until at least one endpoint has data, then runs exactly one handler to
//! completion:
//!
//! | Ready endpoint | Handler |
//! |----------------|---------|
//! | control | [`CommandHandler::handle`] |
//! | bridge | policy `on_outgoing_message` |
//! | stream | [`ClientRegistry::handle_frame`] |
//!
//! Handlers never overlap, so no state needs a lock.
//!
//! # Stopping
//!
//! - Immediate (`END_PIPE`): exit after the current handler.
//! - Graceful: keep dispatching whatever is already ready, exit once
//!   nothing is.
//!
//! On every exit path, including errors, the bridge and then the stream are
//! released exactly once.

// ============================================================================
// Imports
// ============================================================================

use futures_util::FutureExt;
use tokio::task;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::error::Result;
use crate::protocol::command::READY_SIGNAL;
use crate::protocol::{ControlCommand, Message};
use crate::transport::{MessageSink, PairEndpoint, StreamEndpoint, StreamFrame};

use super::control::CommandHandler;
use super::decoder::DecoderFactory;
use super::policy::{GatewayPolicy, Outlet};
use super::registry::ClientRegistry;

// ============================================================================
// StopSignal
// ============================================================================

/// How the loop was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Drain already-ready endpoints first.
    Graceful,
    /// Abandon pending readiness.
    Immediate,
}

/// Pending stop request.
#[derive(Debug, Default)]
pub struct StopSignal {
    mode: Option<StopMode>,
}

impl StopSignal {
    /// Requests a stop. An immediate request overrides a graceful one.
    pub fn request(&mut self, graceful: bool) {
        let requested = if graceful {
            StopMode::Graceful
        } else {
            StopMode::Immediate
        };

        if self.mode != Some(StopMode::Immediate) {
            self.mode = Some(requested);
        }
    }

    /// Returns the requested mode, if any.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> Option<StopMode> {
        self.mode
    }
}

// ============================================================================
// Types
// ============================================================================

/// Data taken from whichever endpoint became ready.
enum Ready {
    Control(Message),
    Bridge(Message),
    Stream(StreamFrame),
}

// ============================================================================
// Shim
// ============================================================================

/// Single-threaded event loop of one worker.
pub struct Shim<P, F: DecoderFactory> {
    id: u32,
    // Field order is release order
    bridge: Box<dyn PairEndpoint>,
    stream: Box<dyn StreamEndpoint>,
    control: Box<dyn PairEndpoint>,
    commands: CommandHandler,
    registry: ClientRegistry<F::Decoder>,
    factory: F,
    policy: P,
    stop: StopSignal,
}

impl<P, F> Shim<P, F>
where
    P: GatewayPolicy,
    F: DecoderFactory,
{
    /// Creates a loop over the given endpoints.
    ///
    /// # Arguments
    ///
    /// * `id` - Worker id, used in logs
    /// * `control` - Control pipe end owned by the loop
    /// * `bridge` - Bridge pipe end owned by the loop
    /// * `stream` - Raw client stream, unbound
    /// * `policy` - Routing hooks
    /// * `factory` - Creates a decoder per new connection
    pub fn new(
        id: u32,
        control: impl PairEndpoint + 'static,
        bridge: impl PairEndpoint + 'static,
        stream: impl StreamEndpoint + 'static,
        policy: P,
        factory: F,
    ) -> Self {
        Self {
            id,
            bridge: Box::new(bridge),
            stream: Box::new(stream),
            control: Box::new(control),
            commands: CommandHandler::new(),
            registry: ClientRegistry::new(),
            factory,
            policy,
            stop: StopSignal::default(),
        }
    }

    /// Returns the worker id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the number of registered clients.
    #[inline]
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Requests the loop to stop.
    ///
    /// `graceful = false` abandons pending readiness; `true` drains it first.
    #[inline]
    pub fn stop(&mut self, graceful: bool) {
        self.stop.request(graceful);
    }

    /// Runs the loop until stopped or an endpoint fails.
    ///
    /// Sends the ready signal on the control pipe before the first wait.
    /// Consumes the shim; all endpoints are released before returning.
    ///
    /// # Errors
    ///
    /// - [`Error::EndpointClosed`](crate::Error::EndpointClosed) if any peer goes away
    /// - any decoder fault or policy error
    pub async fn run(mut self) -> Result<()> {
        let span = info_span!("shim", worker_id = self.id);

        async move {
            info!("Event loop started");

            let result = self.run_loop().await;

            match &result {
                Ok(()) => info!(clients = self.registry.len(), "Event loop stopped"),
                Err(e) => error!(error = %e, "Event loop failed"),
            }

            self.release();
            result
        }
        .instrument(span)
        .await
    }

    /// Dispatches until a stop request is honoured.
    async fn run_loop(&mut self) -> Result<()> {
        self.control.send(Message::from_parts([READY_SIGNAL]))?;

        loop {
            if let Some(mode) = self.stop.mode() {
                return match mode {
                    StopMode::Immediate => Ok(()),
                    StopMode::Graceful => self.drain().await,
                };
            }

            let ready = self.next_ready().await?;
            self.dispatch(ready).await?;
        }
    }

    /// Dispatches only what is ready without waiting.
    ///
    /// Polled outside the coop budget: a budgeted poll reports pending after
    /// a fixed number of receives even though data is queued.
    async fn drain(&mut self) -> Result<()> {
        debug!("Draining ready endpoints");

        while let Some(ready) = task::unconstrained(self.next_ready()).now_or_never() {
            self.dispatch(ready?).await?;

            if self.stop.mode() == Some(StopMode::Immediate) {
                break;
            }
        }

        Ok(())
    }

    /// Waits until any endpoint yields data.
    async fn next_ready(&mut self) -> Result<Ready> {
        let Self {
            control,
            bridge,
            stream,
            ..
        } = self;

        tokio::select! {
            message = control.recv() => Ok(Ready::Control(message?)),
            message = bridge.recv() => Ok(Ready::Bridge(message?)),
            frame = stream.recv() => Ok(Ready::Stream(frame?)),
        }
    }

    /// Runs the handler for one ready endpoint.
    async fn dispatch(&mut self, ready: Ready) -> Result<()> {
        match ready {
            Ready::Control(message) => self.on_control(message).await,
            Ready::Bridge(message) => self.on_bridge(message),
            Ready::Stream(frame) => self.on_stream(frame),
        }
    }

    async fn on_control(&mut self, message: Message) -> Result<()> {
        let command = match ControlCommand::parse(message) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed control message");
                return Ok(());
            }
        };

        debug!(?command, "Control command");
        self.commands
            .handle(
                command,
                &mut *self.control,
                &mut *self.stream,
                &mut self.stop,
            )
            .await
    }

    fn on_bridge(&mut self, message: Message) -> Result<()> {
        trace!(parts = message.len(), "Outgoing message");

        let mut outlet = Outlet::new(&mut *self.stream, &mut *self.bridge, &mut self.stop);
        self.policy.on_outgoing_message(message, &mut outlet)
    }

    fn on_stream(&mut self, frame: StreamFrame) -> Result<()> {
        trace!(identity = %frame.identity, bytes = frame.data.len(), "Stream data");

        let mut outlet = Outlet::new(&mut *self.stream, &mut *self.bridge, &mut self.stop);
        self.registry
            .handle_frame(frame, &mut self.factory, &mut self.policy, &mut outlet)
    }

    /// Releases the bridge, then the stream, then the control end.
    fn release(self) {
        let Self {
            control,
            bridge,
            stream,
            ..
        } = self;

        drop(bridge);
        drop(stream);
        debug!("Bridge and stream released");
        drop(control);
    }
}

// ============================================================================
// Tests
// ============================================================================
