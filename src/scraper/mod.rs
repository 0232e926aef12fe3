//! Site-specific problem scrapers.
//!
//! One [`Scraper`] implementation per judge site, chosen once per page by
//! [`select_scraper`].
//!
//! | Variant | Host name contains |
//! |---------|--------------------|
//! | [`HackerRank`] | `hackerrank.com` |
//! | [`LeetCode`] | `leetcode.com` |
//!
//! # Harvesting
//!
//! [`Scraper::run_tests`] and [`Scraper::run_submit_tests`] click the page's
//! run or submit control and wait for fresh results before reading them.
//! Results are keyed by the label of their tab. A compile or runtime error
//! yields a single case keyed `"0"`. An empty map means the page showed no
//! cases and no error, which usually means everything passed.
//!
//! A missing element that the harvest depends on fails the call with
//! [`Error::UnexpectedDomStructure`](crate::Error::UnexpectedDomStructure).

// ============================================================================
// Submodules
// ============================================================================

/// Lazily resolved code editor.
pub mod editor;

/// HackerRank scraper.
pub mod hackerrank;

/// LeetCode scraper.
pub mod leetcode;

mod util;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::dom::Dom;
use crate::error::Result;
use crate::protocol::TestCases;

pub use editor::EditorBinding;
pub use hackerrank::{HackerRank, HackerRankSelectors};
pub use leetcode::{LeetCode, LeetCodeSelectors};

// ============================================================================
// Site
// ============================================================================

/// Supported judge sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    /// hackerrank.com
    HackerRank,
    /// leetcode.com
    LeetCode,
}

impl Site {
    /// Recognizes the site serving `url`.
    #[must_use]
    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        if host.contains("hackerrank.com") {
            Some(Self::HackerRank)
        } else if host.contains("leetcode.com") {
            Some(Self::LeetCode)
        } else {
            None
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HackerRank => f.write_str("HackerRank"),
            Self::LeetCode => f.write_str("LeetCode"),
        }
    }
}

// ============================================================================
// Scraper
// ============================================================================

/// Reads problems from, and drives, one judge page.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Site this scraper handles.
    fn site(&self) -> Site;

    /// Whether the page currently shows a problem.
    fn is_problem_page(&self) -> bool;

    /// URL-derived problem slug, or empty.
    fn problem_name(&self) -> String;

    /// Problem statement markup, or empty.
    fn problem_statement(&self) -> String;

    /// Editor language label, or empty.
    fn editor_language(&self) -> String;

    /// Editor contents, or empty if the editor is not ready.
    fn code(&self) -> String;

    /// Replaces the editor contents; no-op if the editor is not ready.
    fn set_code(&self, code: &str);

    /// Drops the cached editor binding after navigation.
    fn invalidate_editor(&self);

    /// Runs the sample tests and harvests their results.
    async fn run_tests(&self) -> Result<TestCases>;

    /// Submits the code and harvests the judged results.
    async fn run_submit_tests(&self) -> Result<TestCases>;
}

// ============================================================================
// Selection
// ============================================================================

/// Picks the scraper for `url`, if the site is supported.
#[must_use]
pub fn select_scraper(url: &Url, dom: Arc<dyn Dom>) -> Option<Arc<dyn Scraper>> {
    let site = Site::from_url(url)?;
    debug!(%site, %url, "Scraper selected");
    let scraper: Arc<dyn Scraper> = match site {
        Site::HackerRank => Arc::new(HackerRank::new(dom)),
        Site::LeetCode => Arc::new(LeetCode::new(dom)),
    };
    Some(scraper)
}

// ============================================================================
// Tests
// ============================================================================
