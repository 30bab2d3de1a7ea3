//! Wire-level message types.
//!
//! This module defines what travels over each endpoint of a worker.
//!
//! # Protocol Overview
//!
//! | Type | Endpoint | Direction |
//! |------|----------|-----------|
//! | [`ControlCommand`] | control | owner → loop (status reply for `BIND`) |
//! | [`Message`] | bridge | both ways, verbatim |
//! | frame ([`frame::encode`]) | stream | loop → client |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Control verbs, address rewriting, status replies |
//! | `frame` | Outbound wire frame encoder |
//! | `message` | Multi-part application message |

// ============================================================================
// Submodules
// ============================================================================

/// Control pipe commands.
pub mod command;

/// Outbound wire frame encoder.
pub mod frame;

/// Multi-part application message.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    BIND_COMMAND, ControlCommand, END_PIPE, decode_status, encode_status, to_transport_address,
};
pub use message::Message;
