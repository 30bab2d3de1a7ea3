//! Type-safe identifiers.
//!
//! The transport assigns every physical connection an opaque byte
//! identity. [`ConnectionId`] wraps those bytes in an immutable value type
//! whose equality and hash are defined by content, so two identities read
//! from separate frames find the same registry entry.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

// ============================================================================
// ConnectionId
// ============================================================================

/// Opaque per-connection identity assigned by the stream transport.
///
/// Cloning is cheap (shared buffer). Comparison and hashing use the bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Arc<[u8]>);

impl ConnectionId {
    /// Creates an identity from raw bytes.
    #[inline]
    #[must_use]
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// Creates the 5-byte identity used by the TCP stream endpoint.
    ///
    /// Layout: `0x00` followed by the big-endian sequence number.
    #[must_use]
    pub fn from_sequence(sequence: u32) -> Self {
        let mut bytes = [0u8; 5];
        bytes[1..].copy_from_slice(&sequence.to_be_bytes());
        Self::new(bytes.to_vec())
    }

    /// Returns the identity bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the identity length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the identity is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for ConnectionId {
    #[inline]
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for ConnectionId {
    #[inline]
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for ConnectionId {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({self})")
    }
}

// ============================================================================
// Tests
// ============================================================================
