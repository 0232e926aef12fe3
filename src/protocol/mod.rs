//! Message protocol shared by pages, the relay, and the native host.
//!
//! Every message is a JSON object discriminated by its `type` field.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `command` | Page → Host, Host → Page | Control verb (`keepAlive`, `run`, `submit`, `quit`) |
//! | `logEntry` | Host/Relay → Page | Diagnostic or alert text |
//! | `newProblem` | Page → Host | Captured problem |
//! | `setCode` | Host → Page | Overwrite the editor contents |
//! | `setPrefs` | Relay → Host | Preference snapshot or delta |
//! | `testResults` | Page → Host | Harvested test cases or an error |
//! | `version` | Host → Relay | Handshake announcement |
//!
//! # Framing
//!
//! Between the relay and the native host each message travels as one
//! native-messaging frame: a little-endian `u32` byte length followed by
//! the JSON body.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | [`Message`] union and its payload types |
//! | `results` | [`TestResults`] and [`TestCase`] |
//! | `codec` | Frame encoding and decoding |

// ============================================================================
// Submodules
// ============================================================================

/// Frame encoding and decoding.
pub mod codec;

/// Message union and payload types.
pub mod message;

/// Test case results.
pub mod results;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{MAX_FRAME_LEN, decode_frame, encode_frame, read_frame, write_frame};
pub use message::{CommandKind, LogLevel, Message, NewProblem};
pub use results::{TestCase, TestCases, TestResults};
