//! Waiting for page state.
//!
//! An [`Observation`] evaluates a predicate against the page, and if the
//! predicate does not hold yet, re-evaluates it after every change
//! notification until it yields a value or the timeout elapses.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cpterm_bridge::{By, Observation};
//!
//! let doc = dom.document();
//! let wrapper = Observation::new(&*dom, doc)
//!     .describe("test results")
//!     .timeout(Duration::from_secs(30))
//!     .on_start(|| dom.click(run_button))
//!     .until(|| dom.find(doc, &By::class("testcases-result-wrapper")))
//!     .await?;
//! ```
//!
//! # Start Hook
//!
//! The `on_start` hook runs exactly once per observation. When the predicate
//! already holds it runs right after that first evaluation; otherwise it runs
//! after the subscription is in place, so changes it triggers are not missed.
//!
//! # Cleanup
//!
//! The subscription is dropped on every exit path: success, timeout, and
//! cancellation of the returned future.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, trace};

use crate::dom::{Dom, ObserveScope};
use crate::error::{Error, Result};
use crate::identifiers::NodeId;

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for a page condition.
pub const DEFAULT_OBSERVE_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Observation
// ============================================================================

type StartHook<'a> = Box<dyn FnOnce() + Send + 'a>;

/// A pending wait on page state.
#[must_use = "an observation does nothing until `until` is awaited"]
pub struct Observation<'a> {
    dom: &'a dyn Dom,
    root: NodeId,
    scope: ObserveScope,
    timeout: Duration,
    operation: Cow<'static, str>,
    on_start: Option<StartHook<'a>>,
}

impl<'a> Observation<'a> {
    /// Observes the subtree under `root` with the default timeout.
    pub fn new(dom: &'a dyn Dom, root: NodeId) -> Self {
        Self {
            dom,
            root,
            scope: ObserveScope::subtree(),
            timeout: DEFAULT_OBSERVE_TIMEOUT,
            operation: Cow::Borrowed("page condition"),
            on_start: None,
        }
    }

    /// Sets which changes trigger re-evaluation.
    pub fn scope(mut self, scope: ObserveScope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the maximum wait.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Names the awaited condition for errors and logs.
    pub fn describe(mut self, operation: impl Into<Cow<'static, str>>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Sets an action to run once observation has begun.
    pub fn on_start(mut self, hook: impl FnOnce() + Send + 'a) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Waits until `predicate` yields a value.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the predicate never yields within the timeout
    /// - [`Error::ObserverClosed`] if the page stops delivering changes
    pub async fn until<T, F>(self, mut predicate: F) -> Result<T>
    where
        F: FnMut() -> Option<T> + Send,
        T: Send,
    {
        let Self {
            dom,
            root,
            scope,
            timeout,
            operation,
            on_start,
        } = self;

        if let Some(value) = predicate() {
            if let Some(hook) = on_start {
                hook();
            }
            trace!(%operation, "Condition already satisfied");
            return Ok(value);
        }

        let mut changes = dom.observe(root, &scope);
        if let Some(hook) = on_start {
            hook();
        }

        let deadline = sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                batch = changes.recv() => {
                    if batch.is_none() {
                        return Err(Error::observer_closed(operation));
                    }
                    if let Some(value) = predicate() {
                        debug!(%operation, "Condition satisfied");
                        return Ok(value);
                    }
                }
                () = &mut deadline => {
                    debug!(%operation, timeout_ms = timeout.as_millis() as u64, "Condition timed out");
                    return Err(Error::timeout(operation, timeout.as_millis() as u64));
                }
            }
        }
    }

    /// Waits until `condition` returns `true`.
    ///
    /// # Errors
    ///
    /// Same as [`until`](Self::until).
    pub async fn until_true<F>(self, mut condition: F) -> Result<()>
    where
        F: FnMut() -> bool + Send,
    {
        self.until(move || condition().then_some(())).await
    }
}

// ============================================================================
// Shorthands
// ============================================================================

/// Waits under `root` until `predicate` yields a value, with default settings.
pub async fn observe_until<T, F>(dom: &dyn Dom, root: NodeId, predicate: F) -> Result<T>
where
    F: FnMut() -> Option<T> + Send,
    T: Send,
{
    Observation::new(dom, root).until(predicate).await
}

/// Waits under `root` until `condition` holds, with default settings.
pub async fn wait_until_true<F>(dom: &dyn Dom, root: NodeId, condition: F) -> Result<()>
where
    F: FnMut() -> bool + Send,
{
    Observation::new(dom, root).until_true(condition).await
}

// ============================================================================
// Tests
// ============================================================================
