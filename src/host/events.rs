//! Page events and host options.

use std::fmt;
use std::time::Duration;

use crate::observe::DEFAULT_OBSERVE_TIMEOUT;

// ============================================================================
// PageEvent
// ============================================================================

/// Something the user or the page did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// The capture button was clicked.
    CaptureClicked,
    /// A key was released.
    KeyUp(KeyPress),
    /// Client-side navigation finished.
    NavigationSettled,
}

// ============================================================================
// KeyPress
// ============================================================================

/// A released key and the modifiers held with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPress {
    /// Key value as reported by the page (`"C"`, `"Enter"`).
    pub key: String,
    /// Alt was held.
    pub alt: bool,
    /// Shift was held.
    pub shift: bool,
    /// Control was held.
    pub ctrl: bool,
}

impl KeyPress {
    /// Creates a key press without modifiers.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Holds Alt.
    #[must_use]
    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    /// Holds Shift.
    #[must_use]
    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Holds Control.
    #[must_use]
    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }
}

// ============================================================================
// Hotkey
// ============================================================================

/// Key combination that triggers a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    /// Key, compared case-insensitively.
    pub key: char,
    /// Alt must be held.
    pub alt: bool,
    /// Shift must be held.
    pub shift: bool,
    /// Control must be held.
    pub ctrl: bool,
}

impl Hotkey {
    /// Returns `true` if `press` is exactly this combination.
    #[must_use]
    pub fn matches(&self, press: &KeyPress) -> bool {
        let mut chars = press.key.chars();
        let key_matches = match (chars.next(), chars.next()) {
            (Some(c), None) => c.eq_ignore_ascii_case(&self.key),
            _ => false,
        };
        key_matches && press.alt == self.alt && press.shift == self.shift && press.ctrl == self.ctrl
    }
}

impl Default for Hotkey {
    /// Alt+Shift+C.
    fn default() -> Self {
        Self {
            key: 'C',
            alt: true,
            shift: true,
            ctrl: false,
        }
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        write!(f, "{}", self.key.to_ascii_uppercase())
    }
}

// ============================================================================
// HostOptions
// ============================================================================

/// Configuration for a [`ScraperHost`](super::ScraperHost).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOptions {
    /// Label of the capture button.
    pub capture_label: String,
    /// Key combination that triggers a capture.
    pub hotkey: Hotkey,
    /// How long a capture waits for the problem to load.
    pub ready_timeout: Duration,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            capture_label: "Open problem".to_string(),
            hotkey: Hotkey::default(),
            ready_timeout: DEFAULT_OBSERVE_TIMEOUT,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hotkey() {
        let hotkey = Hotkey::default();
        assert!(hotkey.matches(&KeyPress::new("C").alt().shift()));
        assert!(hotkey.matches(&KeyPress::new("c").alt().shift()));
        assert!(!hotkey.matches(&KeyPress::new("C").alt()));
        assert!(!hotkey.matches(&KeyPress::new("C").alt().shift().ctrl()));
        assert!(!hotkey.matches(&KeyPress::new("Control").alt().shift()));
        assert_eq!(hotkey.to_string(), "Alt+Shift+C");
    }

    #[test]
    fn test_default_options() {
        let options = HostOptions::default();
        assert_eq!(options.capture_label, "Open problem");
        assert_eq!(options.ready_timeout, Duration::from_secs(60));
    }
}
