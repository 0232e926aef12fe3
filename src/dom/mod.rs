//! Boundary to the live third-party page.
//!
//! The bridge never touches a browser directly. An embedder (a content
//! script compiled to wasm, a WebDriver-backed tab, a test double) implements
//! [`Dom`] and hands element handles out as [`NodeId`]s.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`Dom`] | Read-only queries, clicks, change subscriptions |
//! | [`CodeEditor`] | The page's code editor model |
//! | [`ObserveScope`] | Which changes a subscription reports |
//! | [`By`] | Element locator strategy |
//!
//! # Change Notifications
//!
//! [`Dom::observe`] returns a receiver of [`MutationBatch`]es. The
//! subscription lives exactly as long as the receiver: dropping it
//! unsubscribes, and implementors must stop delivering to (and forget)
//! closed senders.

// ============================================================================
// Submodules
// ============================================================================

/// Element locator strategies.
pub mod selector;

/// Scripted in-memory page for tests.
#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use crate::identifiers::NodeId;

pub use selector::By;

// ============================================================================
// Types
// ============================================================================

/// Stream of change notifications for one subscription.
pub type MutationReceiver = mpsc::UnboundedReceiver<MutationBatch>;

/// One delivery of change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationBatch {
    /// Number of change records in the batch.
    pub records: usize,
}

// ============================================================================
// ObserveScope
// ============================================================================

/// Which changes under the observed node are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveScope {
    /// Report child insertions and removals.
    pub child_list: bool,
    /// Extend reporting to all descendants.
    pub subtree: bool,
    /// Report attribute changes.
    pub attributes: bool,
    /// Only report these attributes; empty means all.
    pub attribute_filter: Vec<String>,
}

impl ObserveScope {
    /// Child-list changes anywhere under the node.
    #[inline]
    #[must_use]
    pub fn subtree() -> Self {
        Self {
            child_list: true,
            subtree: true,
            attributes: false,
            attribute_filter: Vec::new(),
        }
    }

    /// Adds attribute changes, limited to `filter` when non-empty.
    #[must_use]
    pub fn with_attributes<I, S>(mut self, filter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = true;
        self.attribute_filter = filter.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `true` if a change to `attribute` is reported.
    #[must_use]
    pub fn reports_attribute(&self, attribute: &str) -> bool {
        self.attributes
            && (self.attribute_filter.is_empty()
                || self.attribute_filter.iter().any(|a| a == attribute))
    }
}

impl Default for ObserveScope {
    fn default() -> Self {
        Self::subtree()
    }
}

// ============================================================================
// Dom
// ============================================================================

/// Access to one page.
///
/// Reads are synchronous snapshots of the current document. Handles for
/// nodes that have since been detached stay valid; a detached node is never
/// rendered and is not found by queries scoped above it.
pub trait Dom: Send + Sync {
    /// Current page URL.
    fn url(&self) -> Url;

    /// The document node.
    fn document(&self) -> NodeId;

    /// The `<body>` element, once parsed.
    fn body(&self) -> Option<NodeId>;

    /// First descendant of `scope` matching `by`.
    fn find(&self, scope: NodeId, by: &By) -> Option<NodeId>;

    /// All descendants of `scope` matching `by`, in document order.
    fn find_all(&self, scope: NodeId, by: &By) -> Vec<NodeId>;

    /// Rendered text (`innerText`).
    fn text(&self, node: NodeId) -> String;

    /// Serialized markup including the node itself (`outerHTML`).
    fn outer_html(&self, node: NodeId) -> String;

    /// Attribute value.
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Whether the class list contains `class`.
    fn has_class(&self, node: NodeId, class: &str) -> bool;

    /// Whether the node takes part in layout (`offsetParent` is set).
    fn is_rendered(&self, node: NodeId) -> bool;

    /// Next element sibling.
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    /// Parent element.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Whether `node` is `ancestor` or lies beneath it.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool;

    /// Simulates a user click.
    fn click(&self, node: NodeId);

    /// Subscribes to changes under `target`.
    fn observe(&self, target: NodeId, scope: &ObserveScope) -> MutationReceiver;

    /// The page's code editor, if it has initialized one.
    fn editor(&self) -> Option<Arc<dyn CodeEditor>>;

    /// Shows an intrusive alert.
    fn alert(&self, message: &str);

    /// Mounts a fixed button; clicks come back as page events.
    fn mount_button(&self, label: &str);
}

// ============================================================================
// CodeEditor
// ============================================================================

/// The page's code editor model.
pub trait CodeEditor: Send + Sync {
    /// Current contents.
    fn value(&self) -> String;

    /// Replaces the contents.
    fn set_value(&self, value: &str);
}

// ============================================================================
// Helpers
// ============================================================================

/// First following sibling that is rendered.
#[must_use]
pub fn first_rendered_sibling(dom: &dyn Dom, node: NodeId) -> Option<NodeId> {
    let mut next = dom.next_sibling(node);
    while let Some(candidate) = next {
        if dom.is_rendered(candidate) {
            return Some(candidate);
        }
        next = dom.next_sibling(candidate);
    }
    None
}

/// Nearest ancestor-or-self that carries `attribute`.
#[must_use]
pub fn closest_with_attribute(dom: &dyn Dom, node: NodeId, attribute: &str) -> Option<NodeId> {
    let mut current = Some(node);
    while let Some(candidate) = current {
        if dom.attribute(candidate, attribute).is_some() {
            return Some(candidate);
        }
        current = dom.parent(candidate);
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
