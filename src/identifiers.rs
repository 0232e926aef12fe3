//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing a page session with a DOM node or a
//! native host connection at compile time.
//!
//! | Type | Identifies |
//! |------|------------|
//! | [`SessionId`] | One page's connection into the relay |
//! | [`ConnectionId`] | One native host connection (a fresh one per open) |
//! | [`NodeId`] | An element handle handed out by a [`Dom`](crate::dom::Dom) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

// ============================================================================
// SessionId
// ============================================================================

/// Identity of a page session.
///
/// Allocated from a process-wide counter; never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(NonZeroU32);

static NEXT_SESSION: AtomicU32 = AtomicU32::new(1);

impl SessionId {
    /// Allocates the next session ID.
    #[must_use]
    pub fn next() -> Self {
        loop {
            let raw = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
            if let Some(id) = NonZeroU32::new(raw) {
                return Self(id);
            }
        }
    }

    /// Wraps a raw value, rejecting zero.
    #[inline]
    #[must_use]
    pub fn from_u32(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Generation counter for native host connections.
///
/// Used to ignore late events from a connection that has already been
/// replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    /// Allocates the next connection ID.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native-{}", self.0)
    }
}

// ============================================================================
// NodeId
// ============================================================================

/// Opaque handle to an element in a page.
///
/// Only meaningful to the [`Dom`](crate::dom::Dom) that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Wraps a raw handle value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
