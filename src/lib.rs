//! cpterm bridge - coding-judge pages to a native editor host.
//!
//! This library scrapes competitive programming pages (HackerRank, LeetCode)
//! for the current problem, drives their run/submit buttons, harvests the
//! resulting test cases, and relays everything to a native host process
//! over native-messaging frames.
//!
//! # Architecture
//!
//! The bridge has two halves:
//!
//! - **Page side**: a [`ScraperHost`] per page owns a [`Scraper`] that reads
//!   the page through the [`Dom`] trait and waits on it with [`Observation`]
//! - **Relay side**: a single [`Relay`] multiplexes every page session onto
//!   one native host connection and shuts the host down when idle
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use cpterm_bridge::{Dom, Relay, Result, ScraperHost};
//! use futures_util::stream;
//!
//! async fn attach(dom: Arc<dyn Dom>) -> Result<()> {
//!     let relay = Relay::builder()
//!         .native_host("/usr/local/bin/cpterm-host")
//!         .build()?;
//!
//!     let (outbound, inbound) = relay.connect().into_parts();
//!     let host = ScraperHost::attach(dom, outbound, Default::default())?;
//!     host.activate()?;
//!     host.run(inbound, stream::pending()).await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dom`] | Page boundary: [`Dom`], [`By`], [`ObserveScope`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | Per-page [`ScraperHost`] |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`observe`] | Wait for a page condition |
//! | [`protocol`] | [`Message`] union and frame codec |
//! | [`relay`] | Session manager and native host lifecycle |
//! | [`scraper`] | [`Scraper`] trait and site variants |

// ============================================================================
// Modules
// ============================================================================

/// Page boundary.
///
/// The embedder implements [`Dom`] over a real page.
pub mod dom;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Per-page scraper host.
pub mod host;

/// Type-safe identifiers.
pub mod identifiers;

/// Page observation.
pub mod observe;

/// Message protocol and framing.
pub mod protocol;

/// Session relay for the native host.
pub mod relay;

/// Site scrapers.
///
/// Use [`select_scraper`] to pick one for a page.
pub mod scraper;

// ============================================================================
// Re-exports
// ============================================================================

// Page types
pub use dom::{By, CodeEditor, Dom, MutationBatch, ObserveScope};

// Error types
pub use error::{Error, Result};

// Host types
pub use host::{HostOptions, Hotkey, KeyPress, PageEvent, ScraperHost};

// Identifier types
pub use identifiers::{ConnectionId, NodeId, SessionId};

// Observation
pub use observe::{Observation, observe_until, wait_until_true};

// Protocol types
pub use protocol::{CommandKind, LogLevel, Message, NewProblem, TestCase, TestCases, TestResults};

// Relay types
pub use relay::{
    JsonFilePreferenceStore, MemoryPreferenceStore, NativeLauncher, PagePort, PreferenceStore,
    ProcessLauncher, Relay, RelayBuilder,
};

// Scraper types
pub use scraper::{HackerRank, LeetCode, Scraper, Site, select_scraper};
