//! Message union and payload types.
//!
//! # Format
//!
//! ```json
//! { "type": "command", "command": "keepAlive" }
//! { "type": "logEntry", "messageType": "error", "message": "..." }
//! { "type": "newProblem", "problem": "<div>..</div>", "code": "...", "language": "Python 3", "url": "...", "name": "two-sum" }
//! { "type": "setCode", "code": "..." }
//! { "type": "setPrefs", "prefs": { "editor": "vim" } }
//! { "type": "testResults", "cases": { "Case 1": { ... } }, "error": null }
//! { "type": "version", "version": "1.0.0" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::results::{TestCases, TestResults};

// ============================================================================
// Message
// ============================================================================

/// A protocol message, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Control verb.
    Command {
        /// The verb.
        command: CommandKind,
    },

    /// Diagnostic or alert text.
    LogEntry {
        /// Severity; `error` is rendered as an alert by the page.
        #[serde(rename = "messageType")]
        message_type: LogLevel,
        /// Text to show.
        message: String,
    },

    /// A captured problem.
    NewProblem(NewProblem),

    /// Instruction to overwrite the page's editor.
    SetCode {
        /// New editor contents.
        code: String,
    },

    /// Preference snapshot or delta.
    SetPrefs {
        /// Preference values by key.
        prefs: BTreeMap<String, String>,
    },

    /// Outcome of a run or submit.
    TestResults(TestResults),

    /// Native host version announcement (first frame after open).
    Version {
        /// Version string of the host.
        version: String,
    },
}

// ============================================================================
// Message - Constructors
// ============================================================================

impl Message {
    /// Creates a command message.
    #[inline]
    #[must_use]
    pub fn command(command: CommandKind) -> Self {
        Self::Command { command }
    }

    /// Creates a `keepAlive` command.
    #[inline]
    #[must_use]
    pub fn keep_alive() -> Self {
        Self::command(CommandKind::KeepAlive)
    }

    /// Creates an `error` log entry.
    #[inline]
    #[must_use]
    pub fn log_error(message: impl Into<String>) -> Self {
        Self::LogEntry {
            message_type: LogLevel::Error,
            message: message.into(),
        }
    }

    /// Creates an `info` log entry.
    #[inline]
    #[must_use]
    pub fn log_info(message: impl Into<String>) -> Self {
        Self::LogEntry {
            message_type: LogLevel::Info,
            message: message.into(),
        }
    }

    /// Creates a `setCode` message.
    #[inline]
    #[must_use]
    pub fn set_code(code: impl Into<String>) -> Self {
        Self::SetCode { code: code.into() }
    }

    /// Creates a `setPrefs` message.
    #[inline]
    #[must_use]
    pub fn set_prefs(prefs: BTreeMap<String, String>) -> Self {
        Self::SetPrefs { prefs }
    }

    /// Creates a successful `testResults` message.
    #[inline]
    #[must_use]
    pub fn test_results(cases: TestCases) -> Self {
        Self::TestResults(TestResults::from_cases(cases))
    }

    /// Creates a failed `testResults` message.
    #[inline]
    #[must_use]
    pub fn test_error(error: impl Into<String>) -> Self {
        Self::TestResults(TestResults::from_error(error))
    }

    /// Creates a `version` message.
    #[inline]
    #[must_use]
    pub fn version(version: impl Into<String>) -> Self {
        Self::Version {
            version: version.into(),
        }
    }
}

// ============================================================================
// Message - Accessors
// ============================================================================

impl Message {
    /// Returns the wire `type` of this message.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::LogEntry { .. } => "logEntry",
            Self::NewProblem(_) => "newProblem",
            Self::SetCode { .. } => "setCode",
            Self::SetPrefs { .. } => "setPrefs",
            Self::TestResults(_) => "testResults",
            Self::Version { .. } => "version",
        }
    }

    /// Returns `true` for `command(keepAlive)`.
    #[inline]
    #[must_use]
    pub fn is_keep_alive(&self) -> bool {
        matches!(
            self,
            Self::Command {
                command: CommandKind::KeepAlive
            }
        )
    }

    /// Returns `true` for a log entry of either level.
    #[inline]
    #[must_use]
    pub fn is_log_entry(&self) -> bool {
        matches!(self, Self::LogEntry { .. })
    }
}

// ============================================================================
// CommandKind
// ============================================================================

/// Control verbs carried by `command` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandKind {
    /// Only cancels a pending idle shutdown when one is armed. Otherwise it
    /// is forwarded to the host like any other message.
    KeepAlive,
    /// Run the page's sample tests.
    Run,
    /// Submit the code for judging.
    Submit,
    /// Ask the native host to terminate.
    Quit,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::KeepAlive => "keepAlive",
            Self::Run => "run",
            Self::Submit => "submit",
            Self::Quit => "quit",
        };
        f.write_str(s)
    }
}

// ============================================================================
// LogLevel
// ============================================================================

/// Severity of a `logEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Passive log line.
    Info,
    /// Intrusive alert.
    Error,
}

// ============================================================================
// NewProblem
// ============================================================================

/// A captured problem.
///
/// All fields are trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProblem {
    /// Problem statement markup.
    pub problem: String,
    /// Starter code from the editor.
    pub code: String,
    /// Editor language label.
    pub language: String,
    /// Page URL.
    pub url: String,
    /// URL-derived slug.
    pub name: String,
}

impl NewProblem {
    /// Creates a problem, trimming every field.
    #[must_use]
    pub fn new(
        problem: &str,
        code: &str,
        language: &str,
        url: &str,
        name: &str,
    ) -> Self {
        Self {
            problem: problem.trim().to_string(),
            code: code.trim().to_string(),
            language: language.trim().to_string(),
            url: url.trim().to_string(),
            name: name.trim().to_string(),
        }
    }
}

impl From<NewProblem> for Message {
    #[inline]
    fn from(problem: NewProblem) -> Self {
        Self::NewProblem(problem)
    }
}

// ============================================================================
// Tests
// ============================================================================
