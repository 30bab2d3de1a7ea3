//! Error types for the WebSocket gateway.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_gateway::{Result, Worker};
//!
//! async fn example(worker: &mut Worker) -> Result<()> {
//!     let status = worker.bind("ws://127.0.0.1:8080").await?;
//!     assert_eq!(status, 0);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Bind | [`Error::InvalidAddress`], [`Error::UnsupportedScheme`], [`Error::AlreadyBound`] |
//! | Endpoint | [`Error::EndpointClosed`], [`Error::Protocol`] |
//! | Connection | [`Error::Decoder`], [`Error::Policy`] |
//! | Worker | [`Error::WorkerSpawn`], [`Error::WorkerPanicked`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::ChannelClosed`] |
//!
//! # Bind Status Codes
//!
//! `BIND` replies carry a signed status integer. [`Error::status_code`] maps
//! a bind failure onto that integer; it never returns `0`.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::ConnectionId;

// ============================================================================
// Constants
// ============================================================================

/// Status for an address that cannot be parsed (`EINVAL`).
pub const STATUS_INVALID_ADDRESS: i32 = 22;

/// Status for a transport scheme the stream endpoint cannot serve (`EPROTONOSUPPORT`).
pub const STATUS_UNSUPPORTED_SCHEME: i32 = 93;

/// Status for an address already in use, or a worker already bound (`EADDRINUSE`).
pub const STATUS_ADDRESS_IN_USE: i32 = 98;

/// Status when no more specific code is available.
pub const STATUS_UNKNOWN: i32 = -1;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when worker options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Bind Errors
    // ========================================================================
    /// Bind address could not be parsed.
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress {
        /// The address as received.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Bind address uses a scheme the stream endpoint does not serve.
    #[error("Unsupported transport scheme: {scheme}")]
    UnsupportedScheme {
        /// The offending scheme.
        scheme: String,
    },

    /// The stream endpoint has already been bound once.
    #[error("Stream already bound to {address}")]
    AlreadyBound {
        /// Address of the existing binding.
        address: String,
    },

    // ========================================================================
    // Endpoint Errors
    // ========================================================================
    /// An endpoint's peer went away.
    ///
    /// Returned by `recv` on any endpoint; fatal to the event loop.
    #[error("Endpoint closed: {endpoint}")]
    EndpointClosed {
        /// Which endpoint closed (`control`, `bridge`, `stream`).
        endpoint: &'static str,
    },

    /// Protocol violation on the control pipe.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Uncaught fault raised by a connection decoder.
    #[error("Decoder fault for {identity}: {message}")]
    Decoder {
        /// Connection whose decoder failed.
        identity: ConnectionId,
        /// Description of the fault.
        message: String,
    },

    /// Fault raised by a gateway policy hook.
    #[error("Policy error: {message}")]
    Policy {
        /// Description of the fault.
        message: String,
    },

    // ========================================================================
    // Worker Errors
    // ========================================================================
    /// Worker thread or runtime could not be started.
    #[error("Failed to spawn worker: {message}")]
    WorkerSpawn {
        /// Description of the spawn failure.
        message: String,
    },

    /// Worker thread panicked.
    #[error("Worker {id} panicked")]
    WorkerPanicked {
        /// Worker id.
        id: u32,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid address error.
    #[inline]
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unsupported scheme error.
    #[inline]
    pub fn unsupported_scheme(scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            scheme: scheme.into(),
        }
    }

    /// Creates an already bound error.
    #[inline]
    pub fn already_bound(address: impl Into<String>) -> Self {
        Self::AlreadyBound {
            address: address.into(),
        }
    }

    /// Creates an endpoint closed error.
    #[inline]
    pub fn endpoint_closed(endpoint: &'static str) -> Self {
        Self::EndpointClosed { endpoint }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a decoder fault.
    #[inline]
    pub fn decoder(identity: ConnectionId, message: impl Into<String>) -> Self {
        Self::Decoder {
            identity,
            message: message.into(),
        }
    }

    /// Creates a policy error.
    #[inline]
    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy {
            message: message.into(),
        }
    }

    /// Creates a worker spawn error.
    #[inline]
    pub fn worker_spawn(message: impl Into<String>) -> Self {
        Self::WorkerSpawn {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error came out of a bind attempt.
    #[inline]
    #[must_use]
    pub fn is_bind_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. }
                | Self::UnsupportedScheme { .. }
                | Self::AlreadyBound { .. }
                | Self::Io(_)
        )
    }

    /// Returns `true` if an endpoint closed underneath the loop.
    #[inline]
    #[must_use]
    pub fn is_endpoint_closed(&self) -> bool {
        matches!(self, Self::EndpointClosed { .. })
    }

    /// Returns the `BIND` status integer for this error.
    ///
    /// Always nonzero.
    #[must_use]
    pub fn status_code(&self) -> i32 {
        match self {
            Self::InvalidAddress { .. } => STATUS_INVALID_ADDRESS,
            Self::UnsupportedScheme { .. } => STATUS_UNSUPPORTED_SCHEME,
            Self::AlreadyBound { .. } => STATUS_ADDRESS_IN_USE,
            Self::Io(err) => match err.raw_os_error() {
                Some(code) if code != 0 => code,
                _ => STATUS_UNKNOWN,
            },
            _ => STATUS_UNKNOWN,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
