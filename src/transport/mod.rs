//! Endpoint transports.
//!
//! This module defines the three endpoints a worker multiplexes over and
//! the implementations shipped with the crate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   control pipe   ┌──────────────────────┐   TCP    ┌─────────┐
//! │ Worker owner │◄────────────────►│                      │◄────────►│ client  │
//! │              │   bridge pipe    │  Shim (event loop)   │◄────────►│ client  │
//! │              │◄────────────────►│                      │◄────────►│ client  │
//! └──────────────┘                  └──────────────────────┘          └─────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `endpoint` | Endpoint and sink traits, [`StreamFrame`] |
//! | `pipe` | In-process pair pipes (control, bridge) |
//! | `stream` | TCP raw stream endpoint |

// ============================================================================
// Submodules
// ============================================================================

/// Endpoint and sink traits.
pub mod endpoint;

/// In-process pair pipes.
pub mod pipe;

/// TCP raw stream endpoint.
pub mod stream;

// ============================================================================
// Re-exports
// ============================================================================

pub use endpoint::{MessageSink, PairEndpoint, StreamEndpoint, StreamFrame, StreamSink};
pub use pipe::PipeEnd;
pub use stream::TcpStreamEndpoint;
