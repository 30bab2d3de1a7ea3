//! In-process pair pipes.
//!
//! A pipe is two connected ends. Each end sends whole [`Message`]s to the
//! other over an unbounded channel, so a multi-part message is delivered
//! atomically and in order.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::Message;

use super::endpoint::{MessageSink, PairEndpoint};

// ============================================================================
// PipeEnd
// ============================================================================

/// One end of a pair pipe.
#[derive(Debug)]
pub struct PipeEnd {
    /// Pipe name, used in errors and logs.
    name: &'static str,
    /// Outbound half.
    tx: mpsc::UnboundedSender<Message>,
    /// Inbound half.
    rx: mpsc::UnboundedReceiver<Message>,
}

/// Creates a connected pair of pipe ends.
#[must_use]
pub fn pair(name: &'static str) -> (PipeEnd, PipeEnd) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();

    (
        PipeEnd {
            name,
            tx: a_tx,
            rx: a_rx,
        },
        PipeEnd {
            name,
            tx: b_tx,
            rx: b_rx,
        },
    )
}

impl PipeEnd {
    /// Returns the pipe name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` once the other end has been dropped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns a message if one is already queued.
    ///
    /// # Errors
    ///
    /// - [`Error::EndpointClosed`] if the other end is gone and nothing is queued
    pub fn try_recv(&mut self) -> Result<Option<Message>> {
        match self.rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(Error::endpoint_closed(self.name)),
        }
    }
}

impl MessageSink for PipeEnd {
    fn send(&mut self, message: Message) -> Result<()> {
        trace!(pipe = self.name, parts = message.len(), "Pipe send");
        self.tx
            .send(message)
            .map_err(|_| Error::endpoint_closed(self.name))
    }
}

#[async_trait]
impl PairEndpoint for PipeEnd {
    async fn recv(&mut self) -> Result<Message> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| Error::endpoint_closed(self.name))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_test::task;
    use tokio_test::{assert_pending, assert_ready_err, assert_ready_ok};

    #[test]
    fn test_recv_wakes_on_send() {
        let (mut a, mut b) = pair("bridge");
        let mut recv = task::spawn(b.recv());

        assert_pending!(recv.poll());

        a.send(Message::from_parts(["wake"])).expect("send");
        assert!(recv.is_woken());
        assert_eq!(assert_ready_ok!(recv.poll()), Message::from_parts(["wake"]));
    }

    #[test]
    fn test_pending_recv_fails_when_peer_drops() {
        let (a, mut b) = pair("control");
        let mut recv = task::spawn(b.recv());

        assert_pending!(recv.poll());

        drop(a);
        assert!(recv.is_woken());
        let err = assert_ready_err!(recv.poll());
        assert!(err.is_endpoint_closed());
    }

    #[tokio::test]
    async fn test_messages_cross_the_pipe_in_order() {
        let (mut a, mut b) = pair("bridge");

        a.send(Message::from_parts(["one"])).expect("send");
        a.send(Message::from_parts(["two", "parts"])).expect("send");

        assert_eq!(b.recv().await.expect("recv"), Message::from_parts(["one"]));
        assert_eq!(
            b.recv().await.expect("recv"),
            Message::from_parts(["two", "parts"])
        );
    }

    #[tokio::test]
    async fn test_both_directions() {
        let (mut a, mut b) = pair("control");

        b.send(Message::from_parts(["ping"])).expect("send");
        assert_eq!(a.recv().await.expect("recv"), Message::from_parts(["ping"]));
    }

    #[tokio::test]
    async fn test_recv_after_peer_dropped() {
        let (mut a, b) = pair("bridge");
        drop(b);

        let err = a.recv().await.expect_err("peer gone");
        assert!(err.is_endpoint_closed());
        assert!(a.is_closed());
        assert!(a.send(Message::new()).is_err());
    }

    #[tokio::test]
    async fn test_try_recv() {
        let (mut a, mut b) = pair("bridge");
        assert!(b.try_recv().expect("open").is_none());

        a.send(Message::from_parts(["x"])).expect("send");
        assert!(b.try_recv().expect("open").is_some());
    }
}
