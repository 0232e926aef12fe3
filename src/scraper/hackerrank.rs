//! HackerRank scraper.
//!
//! Problem pages live under `/challenges/<slug>/problem`. Results render in a
//! tabbed wrapper; each tab's content is swapped in place and labelled with
//! the active tab's id through `aria-labelledby`.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::dom::{By, Dom, ObserveScope, first_rendered_sibling};
use crate::error::Result;
use crate::identifiers::NodeId;
use crate::observe::{DEFAULT_OBSERVE_TIMEOUT, Observation};
use crate::protocol::{TestCase, TestCases};

use super::editor::EditorBinding;
use super::util::{first_by_class, require, slug, text_of};
use super::{Scraper, Site};

// ============================================================================
// Constants
// ============================================================================

static CHALLENGE_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"challenges/([^/]+)").expect("valid challenge pattern"));

// ============================================================================
// HackerRankSelectors
// ============================================================================

/// Page selectors used by [`HackerRank`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HackerRankSelectors {
    /// Class of the problem statement element.
    pub statement_class: String,
    /// Class of the language picker.
    pub language_class: String,
    /// "Run Code" button.
    pub run_button: String,
    /// "Submit Code" button.
    pub submit_button: String,
    /// Wrapper around the result tabs.
    pub result_wrapper: String,
    /// Marker that precedes a compile error panel.
    pub compile_error_wrapper: String,
    /// Compile error text inside the panel.
    pub compile_message: String,
    /// Tab content area inside the wrapper.
    pub tab_content: String,
    /// Class of each result tab.
    pub tab_item_class: String,
    /// Class shown instead of values for locked cases.
    pub unlock_wrapper_class: String,
    /// Class of a rendered value block.
    pub lines_container_class: String,
    /// Input value block.
    pub stdin: String,
    /// Program output block.
    pub stdout: String,
    /// Expected output block.
    pub expected_output: String,
    /// Error output block.
    pub stderr: String,
    /// Marker on a tab whose case failed.
    pub failed_marker: String,
}

impl Default for HackerRankSelectors {
    fn default() -> Self {
        Self {
            statement_class: "challenge-body-html".into(),
            language_class: "select-language".into(),
            run_button: ".hr-monaco-compile".into(),
            submit_button: ".hr-monaco-submit".into(),
            result_wrapper: ".testcases-result-wrapper".into(),
            compile_error_wrapper: ".compile-error-wrapper".into(),
            compile_message: "pre.compile-message".into(),
            tab_content: ".tab-content".into(),
            tab_item_class: "tab-item".into(),
            unlock_wrapper_class: "unlock-wrapper".into(),
            lines_container_class: "lines-container".into(),
            stdin: ".stdin .lines-container".into(),
            stdout: ".stdout .lines-container".into(),
            expected_output: ".expected-output .lines-container".into(),
            stderr: ".stderr .lines-container".into(),
            failed_marker: "svg[aria-label='Failed']".into(),
        }
    }
}

// ============================================================================
// HackerRank
// ============================================================================

/// Result panel that appeared after a run.
enum Panel {
    Results(NodeId),
    CompileError(NodeId),
}

/// Scraper for hackerrank.com.
pub struct HackerRank {
    dom: Arc<dyn Dom>,
    editor: EditorBinding,
    selectors: HackerRankSelectors,
    timeout: Duration,
}

impl HackerRank {
    /// Creates a scraper with the default selectors.
    pub fn new(dom: Arc<dyn Dom>) -> Self {
        Self::with_selectors(dom, HackerRankSelectors::default())
    }

    /// Creates a scraper with custom selectors.
    pub fn with_selectors(dom: Arc<dyn Dom>, selectors: HackerRankSelectors) -> Self {
        Self {
            editor: EditorBinding::new(Arc::clone(&dom)),
            dom,
            selectors,
            timeout: DEFAULT_OBSERVE_TIMEOUT,
        }
    }

    /// Sets how long each harvest step may wait.
    #[must_use]
    pub fn harvest_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn harvest(&self, button: &str) -> Result<TestCases> {
        let dom = &*self.dom;
        let sel = &self.selectors;
        let doc = dom.document();
        let button = require(dom.find(doc, &By::css(button)), "HackerRank run/submit button")?;
        let wrapper = By::css(&sel.result_wrapper);
        let compile_error = By::css(&sel.compile_error_wrapper);

        Observation::new(dom, doc)
            .describe("previous HackerRank results to clear")
            .timeout(self.timeout)
            .on_start(move || dom.click(button))
            .until_true(|| dom.find(doc, &wrapper).is_none())
            .await?;

        let panel = Observation::new(dom, doc)
            .describe("HackerRank test results")
            .timeout(self.timeout)
            .until(|| {
                if let Some(found) = dom.find(doc, &wrapper) {
                    return Some(Panel::Results(found));
                }
                dom.find(doc, &compile_error)
                    .and_then(|marker| first_rendered_sibling(dom, marker))
                    .map(Panel::CompileError)
            })
            .await?;

        match panel {
            Panel::CompileError(node) => {
                let message = text_of(dom, node, &sel.compile_message).unwrap_or_default();
                debug!("HackerRank reported a compile error");
                Ok(TestCases::from([("0".to_string(), TestCase::error("", &message))]))
            }
            Panel::Results(wrapper) => self.read_tabs(wrapper).await,
        }
    }

    async fn read_tabs(&self, wrapper: NodeId) -> Result<TestCases> {
        let dom = &*self.dom;
        let sel = &self.selectors;
        let content = require(dom.find(wrapper, &By::css(&sel.tab_content)), "HackerRank tab content")?;
        let unlock = By::class(&sel.unlock_wrapper_class);
        let lines = By::class(&sel.lines_container_class);

        let mut cases = TestCases::new();
        for tab in dom.find_all(wrapper, &By::class(&sel.tab_item_class)) {
            let tab_id = require(dom.attribute(tab, "id"), "HackerRank tab id")?;

            Observation::new(dom, content)
                .describe(format!("HackerRank tab {tab_id}"))
                .scope(ObserveScope::subtree().with_attributes(["aria-labelledby"]))
                .timeout(self.timeout)
                .on_start(move || dom.click(tab))
                .until_true(|| {
                    dom.attribute(content, "aria-labelledby").as_deref() == Some(tab_id.as_str())
                        && (dom.find(content, &unlock).is_some() || dom.find(content, &lines).is_some())
                })
                .await?;

            cases.insert(dom.text(tab), self.read_case(content, tab));
        }

        debug!(cases = cases.len(), "HackerRank results harvested");
        Ok(cases)
    }

    fn read_case(&self, content: NodeId, tab: NodeId) -> TestCase {
        let dom = &*self.dom;
        let sel = &self.selectors;
        let stdin = text_of(dom, content, &sel.stdin).unwrap_or_default();

        if let Some(stderr) = text_of(dom, content, &sel.stderr)
            && !stderr.trim().is_empty()
        {
            return TestCase::error(&stdin, &stderr);
        }

        let expected = text_of(dom, content, &sel.expected_output);
        let output = match text_of(dom, content, &sel.stdout) {
            Some(stdout) => Some(stdout),
            None if dom.find(tab, &By::css(&sel.failed_marker)).is_some() => Some(String::new()),
            None => expected.clone(),
        };
        TestCase::executed(&stdin, output.as_deref(), expected.as_deref())
    }
}

#[async_trait]
impl Scraper for HackerRank {
    fn site(&self) -> Site {
        Site::HackerRank
    }

    fn is_problem_page(&self) -> bool {
        self.dom.url().path().ends_with("problem")
    }

    fn problem_name(&self) -> String {
        slug(&CHALLENGE_SLUG, self.dom.url().path())
    }

    fn problem_statement(&self) -> String {
        first_by_class(&*self.dom, &self.selectors.statement_class, |n| self.dom.outer_html(n))
    }

    fn editor_language(&self) -> String {
        first_by_class(&*self.dom, &self.selectors.language_class, |n| self.dom.text(n))
    }

    fn code(&self) -> String {
        self.editor.get()
    }

    fn set_code(&self, code: &str) {
        self.editor.set(code);
    }

    fn invalidate_editor(&self) {
        self.editor.invalidate();
    }

    async fn run_tests(&self) -> Result<TestCases> {
        self.harvest(&self.selectors.run_button).await
    }

    async fn run_submit_tests(&self) -> Result<TestCases> {
        self.harvest(&self.selectors.submit_button).await
    }
}

// ============================================================================
// Tests
// ============================================================================
