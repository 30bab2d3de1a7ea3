//! Multi-part application message.
//!
//! The bridge exchanges messages with the rest of the system verbatim: an
//! ordered list of opaque byte parts. Routing policies conventionally put
//! the client identity in the first part.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use crate::identifiers::ConnectionId;

// ============================================================================
// Message
// ============================================================================

/// Ordered sequence of opaque byte parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    parts: VecDeque<Vec<u8>>,
}

// ============================================================================
// Constructors
// ============================================================================

impl Message {
    /// Creates an empty message.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message from its parts.
    #[must_use]
    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl Message {
    /// Returns the number of parts.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` if the message has no parts.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns the first part.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&[u8]> {
        self.parts.front().map(Vec::as_slice)
    }

    /// Iterates over the parts in order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[u8]> {
        self.parts.iter().map(Vec::as_slice)
    }

    /// Returns the total payload size across all parts.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.parts.iter().map(Vec::len).sum()
    }
}

// ============================================================================
// Mutation
// ============================================================================

impl Message {
    /// Appends a part.
    #[inline]
    pub fn push_back(&mut self, part: impl Into<Vec<u8>>) {
        self.parts.push_back(part.into());
    }

    /// Prepends a part.
    #[inline]
    pub fn push_front(&mut self, part: impl Into<Vec<u8>>) {
        self.parts.push_front(part.into());
    }

    /// Removes and returns the first part.
    #[inline]
    pub fn pop_front(&mut self) -> Option<Vec<u8>> {
        self.parts.pop_front()
    }

    /// Removes the first part and reads it as a connection identity.
    ///
    /// Returns `None` if the message is empty.
    pub fn pop_identity(&mut self) -> Option<ConnectionId> {
        self.parts.pop_front().map(ConnectionId::from)
    }

    /// Adds an identity as the first part (builder style).
    #[must_use]
    pub fn with_identity(mut self, identity: &ConnectionId) -> Self {
        self.push_front(identity.as_bytes().to_vec());
        self
    }
}

impl IntoIterator for Message {
    type Item = Vec<u8>;
    type IntoIter = std::collections::vec_deque::IntoIter<Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.into_iter()
    }
}

impl FromIterator<Vec<u8>> for Message {
    fn from_iter<T: IntoIterator<Item = Vec<u8>>>(iter: T) -> Self {
        Self {
            parts: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
