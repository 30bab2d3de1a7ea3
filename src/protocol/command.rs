//! Control pipe commands.
//!
//! The control pipe carries string-framed requests from the owner of a
//! worker to its event loop.
//!
//! | Command | Request parts | Reply |
//! |---------|---------------|-------|
//! | `BIND` | `["BIND", address]` | one part: 4-byte signed status, `0` = success |
//! | `END_PIPE` | `["endPipe"]` | none, the loop stops |
//!
//! Any other verb parses to [`ControlCommand::Unknown`] and is ignored by
//! the loop.

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::protocol::Message;

// ============================================================================
// Constants
// ============================================================================

/// Verb for binding the raw stream endpoint.
pub const BIND_COMMAND: &str = "BIND";

/// Sentinel verb that terminates the worker.
pub const END_PIPE: &str = "endPipe";

/// Signal sent on the control pipe once the loop is ready to serve.
pub const READY_SIGNAL: &str = "OK";

/// Public scheme accepted in bind addresses.
pub const WEBSOCKET_SCHEME: &str = "ws://";

/// Scheme the raw stream endpoint binds with.
pub const TRANSPORT_SCHEME: &str = "tcp://";

// ============================================================================
// ControlCommand
// ============================================================================

/// A parsed control pipe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Bind the stream endpoint to an address.
    Bind {
        /// Address as sent by the owner (may still carry `ws://`).
        address: String,
    },
    /// Stop the loop without draining.
    EndPipe,
    /// Any other verb.
    Unknown(String),
}

impl ControlCommand {
    /// Parses a control pipe message.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the message is empty or the verb is not UTF-8
    ///
    /// A `BIND` without a readable address parses with an empty address so
    /// that the bind fails and the caller still gets a status reply.
    pub fn parse(mut message: Message) -> Result<Self> {
        let verb = message
            .pop_front()
            .ok_or_else(|| Error::protocol("Empty control message"))?;
        let verb = String::from_utf8(verb)
            .map_err(|_| Error::protocol("Control verb is not UTF-8"))?;

        match verb.as_str() {
            BIND_COMMAND => {
                let address = message
                    .pop_front()
                    .map(|part| String::from_utf8_lossy(&part).into_owned())
                    .unwrap_or_default();
                Ok(Self::Bind { address })
            }
            END_PIPE => Ok(Self::EndPipe),
            _ => Ok(Self::Unknown(verb)),
        }
    }

    /// Converts the command to its wire message.
    #[must_use]
    pub fn to_message(&self) -> Message {
        match self {
            Self::Bind { address } => Message::from_parts([BIND_COMMAND, address.as_str()]),
            Self::EndPipe => Message::from_parts([END_PIPE]),
            Self::Unknown(verb) => Message::from_parts([verb.as_str()]),
        }
    }
}

// ============================================================================
// Address Rewriting
// ============================================================================

/// Rewrites a leading `ws://` to the transport scheme.
///
/// Other schemes pass through unchanged.
#[must_use]
pub fn to_transport_address(address: &str) -> String {
    match address.strip_prefix(WEBSOCKET_SCHEME) {
        Some(rest) => format!("{TRANSPORT_SCHEME}{rest}"),
        None => address.to_string(),
    }
}

// ============================================================================
// Status Reply
// ============================================================================

/// Encodes a bind status as its 4-byte reply part (little-endian).
#[inline]
#[must_use]
pub fn encode_status(status: i32) -> [u8; 4] {
    status.to_le_bytes()
}

/// Decodes a bind status reply part.
///
/// # Errors
///
/// - [`Error::Protocol`] if the part is not exactly 4 bytes
pub fn decode_status(part: &[u8]) -> Result<i32> {
    let bytes: [u8; 4] = part
        .try_into()
        .map_err(|_| Error::protocol(format!("Status reply has {} bytes", part.len())))?;
    Ok(i32::from_le_bytes(bytes))
}

// ============================================================================
// Tests
// ============================================================================
