//! Worker handle.
//!
//! A [`Worker`] runs one [`Shim`] on a dedicated OS thread with its own
//! current-thread tokio runtime. The owner talks to it only through the
//! control and bridge pipes.
//!
//! ```text
//! owner thread                       worker thread "ws-gateway-{id}"
//! ────────────                       ───────────────────────────────
//! Worker::spawn ──── thread start ──► runtime.block_on(Shim::run)
//!       ◄──────────── "OK" ─────────── ready signal
//! bind()  ─── BIND <addr> ─────────► CommandHandler
//!       ◄──────────── status ────────
//! send()  ─── bridge message ──────► policy.on_outgoing_message
//! recv()  ◄── bridge message ─────── policy.on_incoming_message
//! terminate() ── END_PIPE ─────────► loop exits, endpoints released
//!       ◄──────────── Result ──────── thread joined
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::thread::{self, JoinHandle};

use tokio::runtime;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::protocol::command::READY_SIGNAL;
use crate::protocol::{ControlCommand, Message, decode_status};
use crate::shim::{DecoderFactory, GatewayPolicy, Shim};
use crate::transport::pipe::{self, PipeEnd};
use crate::transport::{MessageSink, PairEndpoint, TcpStreamEndpoint};

use super::options::WorkerOptions;

// ============================================================================
// Worker
// ============================================================================

/// Owner-side handle of a running gateway worker.
///
/// # Examples
///
/// ```ignore
/// use ws_gateway::{Worker, WorkerOptions};
///
/// let mut worker = Worker::spawn(WorkerOptions::new(1), policy, factory).await?;
/// assert_eq!(worker.bind("ws://127.0.0.1:8080").await?, 0);
///
/// worker.send(message)?;
/// let reply = worker.recv().await?;
///
/// worker.terminate().await?;
/// ```
pub struct Worker {
    options: WorkerOptions,
    /// Owner end of the control pipe.
    control: PipeEnd,
    /// Owner end of the bridge pipe.
    bridge: PipeEnd,
    /// Loop result, sent once by the worker thread.
    done: Option<oneshot::Receiver<Result<()>>>,
    thread: Option<JoinHandle<()>>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.options.id)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Worker - Lifecycle
// ============================================================================

impl Worker {
    /// Starts a worker thread and waits until its loop is ready.
    ///
    /// # Arguments
    ///
    /// * `options` - Worker configuration
    /// * `policy` - Routing hooks, moved to the worker thread
    /// * `factory` - Decoder factory, moved to the worker thread
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `options` fail validation
    /// - [`Error::WorkerSpawn`] if the thread or runtime cannot start
    /// - [`Error::Protocol`] if the first control message is not the ready signal
    pub async fn spawn<P, F>(options: WorkerOptions, policy: P, factory: F) -> Result<Self>
    where
        P: GatewayPolicy + 'static,
        F: DecoderFactory + 'static,
        F::Decoder: 'static,
    {
        options.validate()?;

        let (control, control_loop) = pipe::pair("control");
        let (bridge, bridge_loop) = pipe::pair("bridge");
        let (done_tx, done_rx) = oneshot::channel();

        let id = options.id;
        let read_buffer_size = options.read_buffer_size;
        let nodelay = options.nodelay;
        let pipe_address = options.pipe_address();

        let thread = thread::Builder::new()
            .name(options.thread_name())
            .spawn(move || {
                let result = runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| Error::worker_spawn(format!("runtime: {e}")))
                    .and_then(|rt| {
                        rt.block_on(async move {
                            debug!(worker_id = id, %pipe_address, "Worker thread running");
                            let stream = TcpStreamEndpoint::new(read_buffer_size, nodelay);
                            Shim::new(id, control_loop, bridge_loop, stream, policy, factory)
                                .run()
                                .await
                        })
                    });

                // Owner may already be gone
                let _ = done_tx.send(result);
            })
            .map_err(|e| Error::worker_spawn(format!("thread: {e}")))?;

        let mut worker = Self {
            options,
            control,
            bridge,
            done: Some(done_rx),
            thread: Some(thread),
        };

        worker.wait_ready().await?;
        info!(worker_id = id, "Worker started");

        Ok(worker)
    }

    /// Waits for the ready signal sent by the loop on startup.
    async fn wait_ready(&mut self) -> Result<()> {
        match self.control.recv().await {
            Ok(message) if message.first() == Some(READY_SIGNAL.as_bytes()) => Ok(()),
            Ok(message) => Err(Error::protocol(format!(
                "expected ready signal, got {} part(s)",
                message.len()
            ))),
            // Thread exited before signalling; report why
            Err(e) => match self.join().await {
                Err(join_error) => Err(join_error),
                Ok(()) => Err(e),
            },
        }
    }

    /// Stops the loop and waits for the thread to finish.
    ///
    /// Sends `END_PIPE`; already-queued commands are handled first.
    ///
    /// # Errors
    ///
    /// - the loop's own error if it failed
    /// - [`Error::WorkerPanicked`] if the thread panicked
    pub async fn terminate(mut self) -> Result<()> {
        if self.is_running() {
            // Loop may already have exited on its own
            let _ = self.control.send(ControlCommand::EndPipe.to_message());
        }

        let result = self.join().await;
        info!(worker_id = self.options.id, ok = result.is_ok(), "Worker terminated");
        result
    }

    /// Collects the loop result and joins the thread.
    async fn join(&mut self) -> Result<()> {
        let Some(done) = self.done.take() else {
            return Ok(());
        };

        let outcome = done.await;
        let panicked = self.thread.take().is_some_and(|thread| thread.join().is_err());

        if panicked {
            error!(worker_id = self.options.id, "Worker thread panicked");
            return Err(Error::WorkerPanicked {
                id: self.options.id,
            });
        }

        // Sender dropped without a result surfaces as `ChannelClosed`
        outcome?
    }
}

// ============================================================================
// Worker - Commands
// ============================================================================

impl Worker {
    /// Binds the worker's stream endpoint.
    ///
    /// `ws://` addresses are served as `tcp://`. Returns the status reply:
    /// `0` on success, nonzero on failure. A failed bind leaves the worker
    /// running.
    ///
    /// # Errors
    ///
    /// Only transport failures; a refused bind is a nonzero status.
    pub async fn bind(&mut self, address: &str) -> Result<i32> {
        self.control.send(
            ControlCommand::Bind {
                address: address.to_string(),
            }
            .to_message(),
        )?;

        let reply = self.control.recv().await?;
        let status = reply
            .first()
            .ok_or_else(|| Error::protocol("empty BIND reply"))
            .and_then(decode_status)?;

        if status != 0 {
            warn!(worker_id = self.options.id, %address, status, "Worker bind refused");
        }
        Ok(status)
    }

    /// Sends a message to the policy's outgoing hook.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndpointClosed`] if the worker has stopped.
    pub fn send(&mut self, message: Message) -> Result<()> {
        self.bridge.send(message)
    }

    /// Receives the next message the policy wrote to the bridge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndpointClosed`] once the worker has stopped and
    /// every queued message has been read.
    pub async fn recv(&mut self) -> Result<Message> {
        self.bridge.recv().await
    }

    /// Returns the next bridge message if one is queued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndpointClosed`] if the worker has stopped.
    pub fn try_recv(&mut self) -> Result<Option<Message>> {
        self.bridge.try_recv()
    }
}

// ============================================================================
// Worker - Accessors
// ============================================================================

impl Worker {
    /// Returns the worker id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.options.id
    }

    /// Returns the worker options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    /// Returns `true` while the loop still holds its end of the control pipe.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.control.is_closed()
    }
}

// ============================================================================
// Drop
// ============================================================================

impl Drop for Worker {
    fn drop(&mut self) {
        if self.thread.is_some() && self.is_running() {
            debug!(worker_id = self.options.id, "Worker dropped while running");
            let _ = self.control.send(ControlCommand::EndPipe.to_message());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::TcpListener as StdTcpListener;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    use crate::identifiers::ConnectionId;
    use crate::protocol::frame;
    use crate::shim::testing::{RecordingPolicy, ScriptedDecoder};

    fn factory() -> impl DecoderFactory<Decoder = ScriptedDecoder> {
        |_: &ConnectionId| ScriptedDecoder::default()
    }

    fn free_port() -> u16 {
        StdTcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .expect("free port")
            .port()
    }

    async fn spawn(id: u32) -> Worker {
        Worker::spawn(WorkerOptions::new(id), RecordingPolicy::default(), factory())
            .await
            .expect("spawn")
    }

    #[tokio::test]
    async fn test_spawn_and_terminate() {
        let worker = spawn(1).await;
        assert!(worker.is_running());
        assert_eq!(worker.id(), 1);

        worker.terminate().await.expect("terminate");
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let options = WorkerOptions::new(2).with_read_buffer_size(0);
        let err = Worker::spawn(options, RecordingPolicy::default(), factory())
            .await
            .expect_err("invalid");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_bind_status_and_one_shot() {
        let mut worker = spawn(3).await;
        let port = free_port();

        let status = worker
            .bind(&format!("ws://127.0.0.1:{port}"))
            .await
            .expect("bind");
        assert_eq!(status, 0);

        let status = worker
            .bind(&format!("ws://127.0.0.1:{}", free_port()))
            .await
            .expect("bind");
        assert_ne!(status, 0);

        worker.terminate().await.expect("terminate");
    }

    #[tokio::test]
    async fn test_bad_scheme_status() {
        let mut worker = spawn(4).await;

        let status = worker.bind("udp://127.0.0.1:1").await.expect("bind");
        assert_ne!(status, 0);
        assert!(worker.is_running());

        worker.terminate().await.expect("terminate");
    }

    #[tokio::test]
    async fn test_client_roundtrip() {
        let mut worker = spawn(5).await;
        let port = free_port();
        assert_eq!(
            worker
                .bind(&format!("ws://127.0.0.1:{port}"))
                .await
                .expect("bind"),
            0
        );

        let mut client = TcpStream::connect(("127.0.0.1", port))
            .await
            .expect("connect");
        client.write_all(b"hello").await.expect("write");

        let inbound = timeout(Duration::from_secs(5), worker.recv())
            .await
            .expect("inbound in time")
            .expect("inbound");
        let mut inbound = inbound;
        let identity = inbound.pop_identity().expect("identity");
        assert_eq!(inbound, Message::from_parts(["hello"]));

        worker
            .send(Message::from_parts(["reply"]).with_identity(&identity))
            .expect("send");

        let expected = frame::encode(b"reply", false);
        let mut received = vec![0u8; expected.len()];
        timeout(Duration::from_secs(5), client.read_exact(&mut received))
            .await
            .expect("reply in time")
            .expect("read");
        assert_eq!(received, expected);

        worker.terminate().await.expect("terminate");
    }

    #[tokio::test]
    async fn test_drop_stops_worker() {
        let worker = spawn(6).await;
        drop(worker);
    }
}
