//! LeetCode scraper.
//!
//! LeetCode lays its panes out in a flex layout addressed by
//! `data-layout-path`. Run results appear in a fixed pane; submission
//! results open a new tab whose content pane path is derived from the tab
//! button's path (`…/tb<N>` becomes `…/t<N>`).
//!
//! Value boxes are located through their visible labels (`Input`, `Output`,
//! `Expected`), so the label texts live in [`LeetCodeSelectors`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::dom::{By, Dom, ObserveScope, closest_with_attribute, first_rendered_sibling};
use crate::error::Result;
use crate::identifiers::NodeId;
use crate::observe::{DEFAULT_OBSERVE_TIMEOUT, Observation};
use crate::protocol::{TestCase, TestCases};

use super::editor::EditorBinding;
use super::util::{require, slug};
use super::{Scraper, Site};

// ============================================================================
// Constants
// ============================================================================

static PROBLEM_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/problems/.+/").expect("valid problem path pattern"));

static PROBLEM_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"problems/([^/]+)").expect("valid problem slug pattern"));

static TAB_BUTTON_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tb(\d+)$").expect("valid tab suffix pattern"));

// ============================================================================
// LeetCodeSelectors
// ============================================================================

/// Page selectors and result labels used by [`LeetCode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeetCodeSelectors {
    /// Problem description container.
    pub description: String,
    /// Language picker button inside the editor.
    pub language_button: String,
    /// "Test Result" pane.
    pub result_pane: String,
    /// "Run" button.
    pub run_button: String,
    /// "Submit" button.
    pub submit_button: String,
    /// Result headline in the run pane.
    pub console_result: String,
    /// Result headline in a submission pane.
    pub submit_console_result: String,
    /// Verdict element of a submission.
    pub submission_result: String,
    /// Value labels in the run pane.
    pub run_labels: String,
    /// Value labels in a submission pane.
    pub submit_labels: String,
    /// Compile or runtime error text.
    pub error_box: String,
    /// Test case tab buttons.
    pub case_tab: String,
    /// Class of the selected case tab.
    pub selected_tab_class: String,
    /// Class of a failed verdict.
    pub error_class: String,
    /// Class around an accepted verdict.
    pub accepted_class: String,
    /// Failed verdict that still shows cases.
    pub wrong_answer_label: String,
    /// Label of the input box.
    pub input_label: String,
    /// Prefix of the input label for the case that crashed.
    pub last_input_label: String,
    /// Label of the output box.
    pub output_label: String,
    /// Label of the expected output box.
    pub expected_label: String,
    /// ID of the submission detail tab button.
    pub submission_tab_id: String,
    /// ID of the content area below the header.
    pub content_id: String,
    /// Attribute addressing layout panes.
    pub layout_path_attribute: String,
}

impl Default for LeetCodeSelectors {
    fn default() -> Self {
        Self {
            description: "div[data-track-load='description_content']".into(),
            language_button: "#editor button:has(div svg[data-icon*='down'])".into(),
            result_pane: "div[data-layout-path='/c1/ts1/t1']".into(),
            run_button: "button[data-e2e-locator='console-run-button']".into(),
            submit_button: "button[data-e2e-locator='console-submit-button']".into(),
            console_result: "[data-e2e-locator='console-result']".into(),
            submit_console_result: "span[data-e2e-locator='console-result']".into(),
            submission_result: "span[data-e2e-locator='submission-result']".into(),
            run_labels: "div.text-label-3".into(),
            submit_labels: "div.text-label-3, div.text-text-tertiary".into(),
            error_box: ".whitespace-pre-wrap".into(),
            case_tab: "div.cursor-pointer".into(),
            selected_tab_class: "bg-fill-3".into(),
            error_class: "text-red-s".into(),
            accepted_class: "text-green-s".into(),
            wrong_answer_label: "Wrong Answer".into(),
            input_label: "Input".into(),
            last_input_label: "Last Executed Input".into(),
            output_label: "Output".into(),
            expected_label: "Expected".into(),
            submission_tab_id: "submission-detail_tab".into(),
            content_id: "qd-content".into(),
            layout_path_attribute: "data-layout-path".into(),
        }
    }
}

// ============================================================================
// ValueBoxes
// ============================================================================

/// Input, output and expected value elements found through their labels.
#[derive(Debug, Default, Clone, Copy)]
struct ValueBoxes {
    input: Option<NodeId>,
    output: Option<NodeId>,
    expected: Option<NodeId>,
}

impl ValueBoxes {
    fn trio(&self) -> Option<(NodeId, NodeId, NodeId)> {
        Some((self.input?, self.output?, self.expected?))
    }
}

// ============================================================================
// LeetCode
// ============================================================================

/// Scraper for leetcode.com.
pub struct LeetCode {
    dom: Arc<dyn Dom>,
    editor: EditorBinding,
    selectors: LeetCodeSelectors,
    timeout: Duration,
}

impl LeetCode {
    /// Creates a scraper with the default selectors.
    pub fn new(dom: Arc<dyn Dom>) -> Self {
        Self::with_selectors(dom, LeetCodeSelectors::default())
    }

    /// Creates a scraper with custom selectors.
    pub fn with_selectors(dom: Arc<dyn Dom>, selectors: LeetCodeSelectors) -> Self {
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

    /// Locates value boxes through their labels under `scope`.
    ///
    /// In a submission pane the crashed-input label sits inside a wrapper,
    /// so its value is the wrapper's sibling.
    fn value_boxes(&self, scope: NodeId, labels: &str, submission: bool) -> ValueBoxes {
        let dom = &*self.dom;
        let sel = &self.selectors;
        let mut boxes = ValueBoxes::default();

        for label in dom.find_all(scope, &By::css(labels)) {
            let text = dom.text(label);
            if text == sel.input_label {
                boxes.input = first_rendered_sibling(dom, label);
            } else if text.starts_with(&sel.last_input_label) {
                boxes.input = if submission {
                    dom.parent(label).and_then(|p| first_rendered_sibling(dom, p))
                } else {
                    first_rendered_sibling(dom, label)
                };
            } else if text == sel.output_label {
                boxes.output = first_rendered_sibling(dom, label);
            } else if text == sel.expected_label {
                boxes.expected = first_rendered_sibling(dom, label);
            }
        }
        boxes
    }

    /// Builds the single error case for a failed run.
    fn error_case(&self, scope: NodeId, console: NodeId, input: Option<NodeId>) -> TestCases {
        let dom = &*self.dom;
        let error = match dom.find(scope, &By::css(&self.selectors.error_box)) {
            Some(found) if input.is_some_and(|i| dom.contains(i, found)) => dom.text(console),
            Some(found) => dom.text(found),
            None => String::new(),
        };
        let input = input.map(|i| dom.text(i)).unwrap_or_default();
        debug!("LeetCode reported a compile or runtime error");
        TestCases::from([("0".to_string(), TestCase::error(&input, &error))])
    }

    /// Layout path of the pane that holds a submission's results.
    fn results_path(&self, tab: NodeId) -> Result<String> {
        let attribute = &self.selectors.layout_path_attribute;
        let holder = require(
            closest_with_attribute(&*self.dom, tab, attribute),
            "LeetCode submission pane path",
        )?;
        let path = self.dom.attribute(holder, attribute).unwrap_or_default();
        Ok(TAB_BUTTON_SUFFIX.replace(&path, "t${1}").into_owned())
    }

    async fn close_submission_tab(&self) -> Result<()> {
        let dom = &*self.dom;
        let sel = &self.selectors;
        let doc = dom.document();
        let Some(tab) = dom.find(doc, &By::id(&sel.submission_tab_id)) else {
            return Ok(());
        };
        let holder = require(
            closest_with_attribute(dom, tab, &sel.layout_path_attribute),
            "LeetCode submission pane path",
        )?;
        let path = dom.attribute(holder, &sel.layout_path_attribute).unwrap_or_default();
        let close = dom.find(doc, &By::css(format!("div[{}='{path}/button/close']", sel.layout_path_attribute)));

        Observation::new(dom, doc)
            .describe("previous LeetCode submission to close")
            .timeout(self.timeout)
            .on_start(move || {
                if let Some(close) = close {
                    dom.click(close);
                }
            })
            .until_true(|| !dom.is_rendered(holder))
            .await
    }
}

#[async_trait]
impl Scraper for LeetCode {
    fn site(&self) -> Site {
        Site::LeetCode
    }

    fn is_problem_page(&self) -> bool {
        PROBLEM_PATH.is_match(self.dom.url().path())
            && self
                .dom
                .find(self.dom.document(), &By::css(&self.selectors.description))
                .is_some_and(|d| self.dom.is_rendered(d))
    }

    fn problem_name(&self) -> String {
        slug(&PROBLEM_SLUG, self.dom.url().path())
    }

    fn problem_statement(&self) -> String {
        self.dom
            .find(self.dom.document(), &By::css(&self.selectors.description))
            .map(|d| self.dom.outer_html(d))
            .unwrap_or_default()
    }

    fn editor_language(&self) -> String {
        self.dom
            .find(self.dom.document(), &By::css(&self.selectors.language_button))
            .map(|b| self.dom.text(b))
            .unwrap_or_default()
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
        let dom = &*self.dom;
        let sel = &self.selectors;
        let doc = dom.document();
        let results = require(dom.find(doc, &By::css(&sel.result_pane)), "LeetCode test result pane")?;
        let run = require(dom.find(doc, &By::css(&sel.run_button)), "LeetCode run button")?;
        let console = By::css(&sel.console_result);
        let scope = ObserveScope::subtree().with_attributes(["data-e2e-locator"]);

        Observation::new(dom, results)
            .describe("previous LeetCode result to clear")
            .scope(scope.clone())
            .timeout(self.timeout)
            .on_start(move || dom.click(run))
            .until_true(|| !dom.find(results, &console).is_some_and(|c| dom.is_rendered(c)))
            .await?;

        let verdict = Observation::new(dom, results)
            .describe("LeetCode run result")
            .scope(scope)
            .timeout(self.timeout)
            .until(|| dom.find(results, &console).filter(|c| dom.is_rendered(*c)))
            .await?;

        let boxes = self.value_boxes(results, &sel.run_labels, false);
        if dom.has_class(verdict, &sel.error_class) && dom.text(verdict) != sel.wrong_answer_label {
            return Ok(self.error_case(results, verdict, boxes.input));
        }

        let mut cases = TestCases::new();
        let Some((input, output, expected)) = boxes.trio() else {
            debug!("LeetCode run shows no cases");
            return Ok(cases);
        };

        for tab in dom.find_all(results, &By::css(&sel.case_tab)) {
            let label = dom.text(tab);
            if label.is_empty() {
                continue;
            }
            if !dom.has_class(tab, &sel.selected_tab_class) {
                let previous = dom.text(input);
                Observation::new(dom, results)
                    .describe(format!("LeetCode {label} input"))
                    .timeout(self.timeout)
                    .on_start(move || dom.click(tab))
                    .until_true(|| dom.text(input) != previous)
                    .await?;
            }
            let case = TestCase::executed(
                &dom.text(input),
                Some(&dom.text(output)),
                Some(&dom.text(expected)),
            );
            cases.insert(label, case);
        }

        debug!(cases = cases.len(), "LeetCode results harvested");
        Ok(cases)
    }

    async fn run_submit_tests(&self) -> Result<TestCases> {
        let dom = &*self.dom;
        let sel = &self.selectors;
        let doc = dom.document();

        self.close_submission_tab().await?;

        let container = require(dom.find(doc, &By::id(&sel.content_id)), "LeetCode content area")?;
        let submit = require(dom.find(doc, &By::css(&sel.submit_button)), "LeetCode submit button")?;
        let detail_tab = By::id(&sel.submission_tab_id);

        let tab = Observation::new(dom, container)
            .describe("LeetCode submission tab")
            .timeout(self.timeout)
            .on_start(move || dom.click(submit))
            .until(|| dom.find(doc, &detail_tab).filter(|t| dom.is_rendered(*t)))
            .await?;

        let pane = By::css(format!("div[{}='{}']", sel.layout_path_attribute, self.results_path(tab)?));
        let results = Observation::new(dom, container)
            .describe("LeetCode submission results")
            .timeout(self.timeout)
            .until(|| dom.find(container, &pane))
            .await?;

        let console = By::css(&sel.submit_console_result);
        let verdict = By::css(&sel.submission_result);
        let mut boxes = ValueBoxes::default();
        let mut console_result = None;

        Observation::new(dom, results)
            .describe("LeetCode submission verdict")
            .timeout(self.timeout)
            .until_true(|| {
                boxes = self.value_boxes(results, &sel.submit_labels, true);
                if boxes.trio().is_some() {
                    return true;
                }
                let accepted = dom
                    .find(results, &verdict)
                    .and_then(|v| dom.parent(v))
                    .is_some_and(|p| dom.has_class(p, &sel.accepted_class));
                if accepted {
                    return true;
                }
                console_result = dom.find(results, &console);
                console_result.is_some()
            })
            .await?;

        if let Some((input, output, expected)) = boxes.trio() {
            let case = TestCase::executed(
                &dom.text(input),
                Some(&dom.text(output)),
                Some(&dom.text(expected)),
            );
            return Ok(TestCases::from([("0".to_string(), case)]));
        }
        if let Some(console) = console_result
            && dom.has_class(console, &sel.error_class)
        {
            return Ok(self.error_case(results, console, boxes.input));
        }

        debug!("LeetCode submission shows no failing case");
        Ok(TestCases::new())
    }
}

// ============================================================================
// Tests
// ============================================================================
