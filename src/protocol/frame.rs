//! Outbound wire frame encoder.
//!
//! Produces one server-to-client frame per payload part. The layout is the
//! standard unmasked binary WebSocket frame, except that a one-byte
//! continuation flag is prepended to the payload and counted in the length:
//!
//! ```text
//! ┌──────┬─────────────┬──────────────────┬──────┬─────────────┐
//! │ 0x82 │ MASK=0|len7 │ ext len (0/2/8B) │ more │ payload ... │
//! └──────┴─────────────┴──────────────────┴──────┴─────────────┘
//!            len = payload.len() + 1
//! ```
//!
//! | `payload.len() + 1` | `len7` | Extended length |
//! |---------------------|--------|-----------------|
//! | `0..=125`           | value  | none            |
//! | `126..=65535`       | `126`  | 2 bytes BE      |
//! | larger              | `127`  | 8 bytes BE      |
//!
//! Peers need the matching decoder; a generic WebSocket client sees the
//! flag as a leading payload byte.

// ============================================================================
// Constants
// ============================================================================

/// First header byte: FIN set, opcode 2 (binary).
pub const FIN_BINARY: u8 = 0x82;

/// Largest length that fits in the 7-bit field.
pub const MAX_INLINE_LENGTH: usize = 125;

/// Largest length that fits in the 16-bit extended field.
pub const MAX_SHORT_LENGTH: usize = 0xFFFF;

/// 7-bit marker for a 16-bit extended length.
const LENGTH_16: u8 = 126;

/// 7-bit marker for a 64-bit extended length.
const LENGTH_64: u8 = 127;

/// Continuation flag value: more parts follow.
pub const MORE: u8 = 1;

/// Continuation flag value: final part of the logical message.
pub const FINAL: u8 = 0;

// ============================================================================
// Encoding
// ============================================================================

/// Returns the header length (bytes before the continuation flag).
#[inline]
#[must_use]
pub const fn header_len(payload_len: usize) -> usize {
    let length = payload_len + 1;
    if length <= MAX_INLINE_LENGTH {
        2
    } else if length <= MAX_SHORT_LENGTH {
        4
    } else {
        10
    }
}

/// Returns the total encoded size of a frame carrying `payload_len` bytes.
#[inline]
#[must_use]
pub const fn encoded_len(payload_len: usize) -> usize {
    header_len(payload_len) + 1 + payload_len
}

/// Encodes one frame.
///
/// # Example
///
/// ```
/// use ws_gateway::protocol::frame::encode;
///
/// let frame = encode(b"ABC", false);
/// assert_eq!(frame, [0x82, 0x04, 0x00, 0x41, 0x42, 0x43]);
/// ```
#[must_use]
pub fn encode(payload: &[u8], more: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(payload.len()));
    encode_into(&mut buf, payload, more);
    buf
}

/// Appends one encoded frame to `buf`.
pub fn encode_into(buf: &mut Vec<u8>, payload: &[u8], more: bool) {
    let length = payload.len() + 1;

    buf.reserve(encoded_len(payload.len()));
    buf.push(FIN_BINARY);

    // MASK bit stays clear on server frames
    if length <= MAX_INLINE_LENGTH {
        buf.push(length as u8);
    } else if length <= MAX_SHORT_LENGTH {
        buf.push(LENGTH_16);
        buf.extend_from_slice(&(length as u16).to_be_bytes());
    } else {
        buf.push(LENGTH_64);
        buf.extend_from_slice(&(length as u64).to_be_bytes());
    }

    buf.push(if more { MORE } else { FINAL });
    buf.extend_from_slice(payload);
}

// ============================================================================
// Tests
// ============================================================================
