//! Control command handler.
//!
//! Interprets requests arriving on the control pipe:
//!
//! - `BIND <address>`: rewrite `ws://` to `tcp://`, bind the stream
//!   endpoint, reply with the 4-byte status. Failures are reported, never
//!   raised.
//! - `END_PIPE`: stop the loop immediately; no reply.
//! - anything else: ignored.
//!
//! Binding is one-shot per worker. Once a bind has succeeded, further
//! `BIND` requests are answered with a nonzero status and leave the
//! existing binding alone.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{ControlCommand, Message, encode_status, to_transport_address};
use crate::transport::{MessageSink, StreamEndpoint};

use super::event_loop::StopSignal;

// ============================================================================
// CommandHandler
// ============================================================================

/// Handles control pipe commands for one worker.
#[derive(Debug, Default)]
pub struct CommandHandler {
    /// Transport address of the successful bind, if any.
    bound: Option<String>,
}

impl CommandHandler {
    /// Creates a handler for an unbound worker.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bound transport address.
    #[inline]
    #[must_use]
    pub fn bound_address(&self) -> Option<&str> {
        self.bound.as_deref()
    }

    /// Executes one command.
    ///
    /// # Errors
    ///
    /// Only failure to send the status reply; bind failures become statuses.
    pub async fn handle(
        &mut self,
        command: ControlCommand,
        control: &mut dyn MessageSink,
        stream: &mut dyn StreamEndpoint,
        stop: &mut StopSignal,
    ) -> Result<()> {
        match command {
            ControlCommand::Bind { address } => {
                let status = self.bind(&address, stream).await;
                control.send(Message::from_parts([encode_status(status)]))
            }
            ControlCommand::EndPipe => {
                debug!("END_PIPE received");
                stop.request(false);
                Ok(())
            }
            ControlCommand::Unknown(verb) => {
                warn!(%verb, "Ignoring unknown control command");
                Ok(())
            }
        }
    }

    /// Binds the stream and returns the status to reply with.
    async fn bind(&mut self, address: &str, stream: &mut dyn StreamEndpoint) -> i32 {
        let transport_address = to_transport_address(address);

        let result = match &self.bound {
            Some(existing) => Err(Error::already_bound(existing.clone())),
            None => stream.bind(&transport_address).await,
        };

        match result {
            Ok(()) => {
                info!(%address, %transport_address, "Bound");
                self.bound = Some(transport_address);
                0
            }
            Err(e) => {
                let status = e.status_code();
                warn!(%address, error = %e, status, "Bind failed");
                status
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::decode_status;
    use crate::shim::event_loop::StopMode;
    use crate::shim::testing::{RecordingBridge, RecordingStream};

    fn reply_status(control: &RecordingBridge, index: usize) -> i32 {
        let reply = &control.sent()[index];
        assert_eq!(reply.len(), 1);
        decode_status(reply.first().expect("status part")).expect("status")
    }

    #[tokio::test]
    async fn test_bind_rewrites_scheme_and_replies_zero() {
        let mut handler = CommandHandler::new();
        let mut control = RecordingBridge::default();
        let mut stream = RecordingStream::default();
        let binds = stream.binds_handle();
        let mut stop = StopSignal::default();

        handler
            .handle(
                ControlCommand::Bind {
                    address: "ws://127.0.0.1:8080".into(),
                },
                &mut control,
                &mut stream,
                &mut stop,
            )
            .await
            .expect("handle");

        assert_eq!(*binds.lock(), vec!["tcp://127.0.0.1:8080".to_string()]);
        assert_eq!(reply_status(&control, 0), 0);
        assert_eq!(handler.bound_address(), Some("tcp://127.0.0.1:8080"));
        assert_eq!(stop.mode(), None);
    }

    #[tokio::test]
    async fn test_bind_failure_replies_error_code() {
        let mut handler = CommandHandler::new();
        let mut control = RecordingBridge::default();
        let mut stream = RecordingStream::default().failing_bind(98);
        let mut stop = StopSignal::default();

        handler
            .handle(
                ControlCommand::Bind {
                    address: "ws://127.0.0.1:80".into(),
                },
                &mut control,
                &mut stream,
                &mut stop,
            )
            .await
            .expect("failure is not an error");

        assert_eq!(reply_status(&control, 0), 98);
        assert!(handler.bound_address().is_none());
        assert_eq!(stop.mode(), None);
    }

    #[tokio::test]
    async fn test_second_bind_is_refused() {
        let mut handler = CommandHandler::new();
        let mut control = RecordingBridge::default();
        let mut stream = RecordingStream::default();
        let binds = stream.binds_handle();
        let mut stop = StopSignal::default();

        for port in [1, 2] {
            handler
                .handle(
                    ControlCommand::Bind {
                        address: format!("ws://127.0.0.1:{port}"),
                    },
                    &mut control,
                    &mut stream,
                    &mut stop,
                )
                .await
                .expect("handle");
        }

        assert_eq!(reply_status(&control, 0), 0);
        assert_ne!(reply_status(&control, 1), 0);
        assert_eq!(binds.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_end_pipe_stops_without_reply() {
        let mut handler = CommandHandler::new();
        let mut control = RecordingBridge::default();
        let mut stream = RecordingStream::default();
        let mut stop = StopSignal::default();

        handler
            .handle(ControlCommand::EndPipe, &mut control, &mut stream, &mut stop)
            .await
            .expect("handle");

        assert_eq!(stop.mode(), Some(StopMode::Immediate));
        assert!(control.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_is_ignored() {
        let mut handler = CommandHandler::new();
        let mut control = RecordingBridge::default();
        let mut stream = RecordingStream::default();
        let mut stop = StopSignal::default();

        handler
            .handle(
                ControlCommand::Unknown("PING".into()),
                &mut control,
                &mut stream,
                &mut stop,
            )
            .await
            .expect("handle");

        assert!(control.sent().is_empty());
        assert_eq!(stop.mode(), None);
    }
}
