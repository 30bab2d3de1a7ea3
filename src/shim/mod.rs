//! Gateway shim.
//!
//! The shim is the single-threaded core of a worker. It multiplexes the
//! control pipe, the bridge pipe and the raw client stream, tracks client
//! connections, and hands routing decisions to a [`GatewayPolicy`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `control` | `BIND` / `END_PIPE` handling |
//! | `decoder` | Per-connection decoder capability |
//! | `event_loop` | [`Shim`] event loop and stop requests |
//! | `policy` | [`GatewayPolicy`] hooks and [`Outlet`] |
//! | `registry` | Client registry and connection lifecycle |

// ============================================================================
// Submodules
// ============================================================================

/// Control command handler.
pub mod control;

/// Per-connection decoder capability.
pub mod decoder;

/// Worker event loop.
pub mod event_loop;

/// Routing hooks.
pub mod policy;

/// Client registry.
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use control::CommandHandler;
pub use decoder::{ConnectionDecoder, ConnectionState, DecoderFactory, DecoderIo};
pub use event_loop::{Shim, StopMode, StopSignal};
pub use policy::{GatewayPolicy, Outlet};
pub use registry::ClientRegistry;
