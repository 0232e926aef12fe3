//! Element locator strategies.
//!
//! # Example
//!
//! ```ignore
//! use cpterm_bridge::By;
//!
//! // CSS selector (default)
//! let run = dom.find(doc, &By::css("button[data-e2e-locator='console-run-button']"));
//!
//! // By ID
//! let container = dom.find(doc, &By::id("qd-content"));
//!
//! // By class (like getElementsByClassName)
//! let tabs = dom.find_all(wrapper, &By::class("tab-item"));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// By Enum
// ============================================================================

/// Element locator strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value")]
pub enum By {
    /// CSS selector.
    ///
    /// # Example
    /// ```ignore
    /// By::Css("pre.compile-message".into())
    /// By::Css("[data-e2e-locator='console-result']".into())
    /// ```
    #[serde(rename = "css")]
    Css(String),

    /// Element ID (`getElementById`).
    #[serde(rename = "id")]
    Id(String),

    /// Single class name (`getElementsByClassName`).
    #[serde(rename = "class")]
    Class(String),

    /// Tag name.
    #[serde(rename = "tag")]
    Tag(String),
}

impl By {
    /// Creates a CSS selector.
    #[inline]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Creates an ID selector.
    #[inline]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Creates a class selector.
    #[inline]
    pub fn class(class: impl Into<String>) -> Self {
        Self::Class(class.into())
    }

    /// Creates a tag selector.
    #[inline]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(tag.into())
    }

    /// Returns the strategy name.
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::Id(_) => "id",
            Self::Class(_) => "class",
            Self::Tag(_) => "tag",
        }
    }

    /// Returns the raw selector value.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(v) | Self::Id(v) | Self::Class(v) | Self::Tag(v) => v,
        }
    }

    /// Returns an equivalent CSS selector.
    #[must_use]
    pub fn to_css(&self) -> String {
        match self {
            Self::Css(v) | Self::Tag(v) => v.clone(),
            Self::Id(v) => format!("#{v}"),
            Self::Class(v) => format!(".{v}"),
        }
    }
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy(), self.value())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_css() {
        assert_eq!(By::id("qd-content").to_css(), "#qd-content");
        assert_eq!(By::class("tab-item").to_css(), ".tab-item");
        assert_eq!(By::css("div.cursor-pointer").to_css(), "div.cursor-pointer");
    }

    #[test]
    fn test_display() {
        assert_eq!(By::class("tab-item").to_string(), "class:tab-item");
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&By::id("x")).unwrap();
        assert_eq!(json, r#"{"strategy":"id","value":"x"}"#);
    }
}
