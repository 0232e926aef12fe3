//! Error types for the bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cpterm_bridge::{Result, Error};
//!
//! async fn example(scraper: &dyn Scraper) -> Result<()> {
//!     let cases = scraper.run_tests().await?;
//!     println!("{} cases", cases.len());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::NoScraper`] |
//! | Page | [`Error::Timeout`], [`Error::UnexpectedDomStructure`], [`Error::ObserverClosed`] |
//! | Native host | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::HandshakeTimeout`], [`Error::VersionMismatch`] |
//! | Protocol | [`Error::Protocol`], [`Error::MessageTooLarge`] |
//! | External | [`Error::Io`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::SessionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by builders when required settings are missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// No scraper variant recognizes the page.
    #[error("No scraper for page: {url}")]
    NoScraper {
        /// URL of the unrecognized page.
        url: String,
    },

    // ========================================================================
    // Page Errors
    // ========================================================================
    /// An awaited page condition never became true.
    #[error("Timed out after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the awaited condition.
        operation: String,
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
    },

    /// An element the scraper relies on is absent.
    ///
    /// Fatal for the current harvest; never retried.
    #[error("Unexpected DOM structure: {context}")]
    UnexpectedDomStructure {
        /// What was expected to exist.
        context: String,
    },

    /// The page stopped delivering change notifications mid-observation.
    #[error("Change notifications closed while waiting for: {operation}")]
    ObserverClosed {
        /// Description of the awaited condition.
        operation: String,
    },

    // ========================================================================
    // Native Host Errors
    // ========================================================================
    /// Native host connection failed.
    #[error("Native host connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Native host connection closed.
    #[error("Native host connection closed")]
    ConnectionClosed,

    /// The native host never announced its version.
    #[error("Native host handshake timed out after {timeout_ms}ms")]
    HandshakeTimeout {
        /// Milliseconds waited for the version message.
        timeout_ms: u64,
    },

    /// The native host announced an unexpected version.
    #[error("Native host version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this bridge speaks.
        expected: String,
        /// Version announced by the host.
        actual: String,
    },

    /// Session is not registered with the relay.
    #[error("Session not found: {session_id}")]
    SessionNotFound {
        /// The unknown session.
        session_id: SessionId,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Frame length exceeds the native messaging limit.
    #[error("Message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge {
        /// Announced or encoded frame size.
        size: usize,
        /// Maximum accepted size.
        limit: usize,
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

    /// Creates a no-scraper error.
    #[inline]
    pub fn no_scraper(url: impl Into<String>) -> Self {
        Self::NoScraper { url: url.into() }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates an unexpected DOM structure error.
    #[inline]
    pub fn dom_structure(context: impl Into<String>) -> Self {
        Self::UnexpectedDomStructure {
            context: context.into(),
        }
    }

    /// Creates an observer-closed error.
    #[inline]
    pub fn observer_closed(operation: impl Into<String>) -> Self {
        Self::ObserverClosed {
            operation: operation.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a handshake timeout error.
    #[inline]
    pub fn handshake_timeout(timeout_ms: u64) -> Self {
        Self::HandshakeTimeout { timeout_ms }
    }

    /// Creates a version mismatch error.
    #[inline]
    pub fn version_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::VersionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a session not found error.
    #[inline]
    pub fn session_not_found(session_id: SessionId) -> Self {
        Self::SessionNotFound { session_id }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a message-too-large error.
    #[inline]
    pub fn message_too_large(size: usize, limit: usize) -> Self {
        Self::MessageTooLarge { size, limit }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::HandshakeTimeout { .. })
    }

    /// Returns `true` if this error concerns the native host connection.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::HandshakeTimeout { .. }
                | Self::VersionMismatch { .. }
        )
    }

    /// Returns `true` if this error aborts a harvest.
    ///
    /// Every page error does: a harvest is never retried.
    #[inline]
    #[must_use]
    pub fn is_page_error(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::UnexpectedDomStructure { .. } | Self::ObserverClosed { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
