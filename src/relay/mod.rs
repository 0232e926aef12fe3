//! Connection and session manager for the native host.
//!
//! Pages talk to the [`Relay`] through [`PagePort`]s. The relay launches the
//! native host on first use, forwards page traffic to it, broadcasts
//! everything it sends back, and shuts it down once no page has been
//! connected for a while.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cpterm_bridge::relay::{JsonFilePreferenceStore, Relay};
//!
//! # async fn example() -> cpterm_bridge::Result<()> {
//! let relay = Relay::builder()
//!     .native_host("/usr/local/bin/cpterm-host")
//!     .preferences(Arc::new(JsonFilePreferenceStore::new("prefs.json")))
//!     .build()?;
//!
//! let port = relay.connect();
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | [`RelayBuilder`] and [`RelayConfig`] |
//! | `connection` | Framed connection with handshake and quit |
//! | `core` | [`Relay`] sessions, forwarding, idle shutdown |
//! | `launcher` | [`NativeLauncher`] and [`ProcessLauncher`] |
//! | `port` | [`PagePort`] |
//! | `prefs` | [`PreferenceStore`] implementations |

// ============================================================================
// Submodules
// ============================================================================

/// Relay configuration and builder.
pub mod config;

/// Framed native host connection.
mod connection;

/// Relay core.
mod core;

/// Native host launching.
pub mod launcher;

/// Page side of a session.
pub mod port;

/// Preference stores.
pub mod prefs;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_IDLE_SHUTDOWN, HOST_PROTOCOL_VERSION, RelayBuilder,
    RelayConfig,
};
pub use self::core::Relay;
pub use launcher::{NativeChannel, NativeLauncher, ProcessLauncher};
pub use port::PagePort;
pub use prefs::{
    JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceChange, PreferenceChanges,
    PreferenceStore, Preferences,
};
