//! WebSocket gateway shim.
//!
//! A gateway worker sits between raw client connections and the rest of an
//! application. It owns a single-threaded event loop that multiplexes three
//! endpoints and never runs two handlers at once.
//!
//! # Architecture
//!
//! - **Control pipe**: `BIND <address>` and `END_PIPE` from the owner
//! - **Bridge pipe**: application messages in both directions
//! - **Stream endpoint**: raw bytes from clients, keyed by connection identity
//!
//! Per-connection decoding is delegated to a [`ConnectionDecoder`] created by
//! a [`DecoderFactory`]. Routing is delegated to a [`GatewayPolicy`]; outbound
//! payloads are framed as binary WebSocket frames by [`protocol::frame`].
//!
//! # Quick Start
//!
//! ```ignore
//! use ws_gateway::{Message, Result, Worker, WorkerOptions};
//!
//! async fn run(policy: MyPolicy) -> Result<()> {
//!     let mut worker =
//!         Worker::spawn(WorkerOptions::new(1), policy, |_: &_| MyDecoder::new()).await?;
//!
//!     let status = worker.bind("ws://127.0.0.1:8080").await?;
//!     assert_eq!(status, 0);
//!
//!     let inbound = worker.recv().await?;
//!     worker.send(inbound)?;
//!
//!     worker.terminate().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types, [`Result`] alias, bind status codes |
//! | [`identifiers`] | [`ConnectionId`] |
//! | [`protocol`] | Frame encoder, [`Message`], control commands |
//! | [`shim`] | Event loop, registry, command handler, policy and decoder traits |
//! | [`transport`] | Endpoint traits, pair pipes, TCP stream endpoint |
//! | [`worker`] | [`Worker`] thread handle and [`WorkerOptions`] |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Connection identity.
pub mod identifiers;

/// Wire frames, application messages and control commands.
pub mod protocol;

/// Single-threaded gateway core.
///
/// Holds the [`Shim`] event loop and the capabilities it is parameterized by.
pub mod shim;

/// Endpoint transports.
pub mod transport;

/// Worker thread handle and configuration.
pub mod worker;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Protocol types
pub use protocol::{ControlCommand, Message};

// Shim types
pub use shim::{
    ConnectionDecoder, ConnectionState, DecoderFactory, DecoderIo, GatewayPolicy, Outlet, Shim,
};

// Transport types
pub use transport::{
    MessageSink, PairEndpoint, PipeEnd, StreamEndpoint, StreamFrame, StreamSink,
    TcpStreamEndpoint,
};

// Worker types
pub use worker::{Worker, WorkerOptions};
