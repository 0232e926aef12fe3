//! Scripted in-memory page.
//!
//! Builds a small element tree, lets tests mutate it and attach click
//! handlers, and delivers change notifications the way a browser would:
//! synchronously at the point of mutation, filtered by each subscription's
//! [`ObserveScope`].
//!
//! CSS selectors are matched literally. A node matches a CSS string that
//! equals one of its aliases, `#id`, `.class`, `tag.class`, or its tag.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use url::Url;

use crate::identifiers::NodeId;

use super::{By, CodeEditor, Dom, MutationBatch, MutationReceiver, ObserveScope};

// ============================================================================
// Types
// ============================================================================

type ClickHandler = Arc<dyn Fn(&ScriptedDom) + Send + Sync>;

enum Change {
    ChildList,
    Attribute(String),
}

struct Subscription {
    target: NodeId,
    scope: ObserveScope,
    tx: mpsc::UnboundedSender<MutationBatch>,
}

#[derive(Default)]
struct NodeData {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    text: String,
    html: Option<String>,
    aliases: Vec<String>,
    hidden: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

// ============================================================================
// NodeSpec
// ============================================================================

/// Description of an element to append.
#[derive(Default)]
pub(crate) struct NodeSpec {
    data: NodeData,
}

/// Starts an element description.
pub(crate) fn el(tag: &str) -> NodeSpec {
    NodeSpec {
        data: NodeData {
            tag: tag.to_string(),
            ..NodeData::default()
        },
    }
}

impl NodeSpec {
    pub(crate) fn id(mut self, id: &str) -> Self {
        self.data.id = Some(id.to_string());
        self
    }

    pub(crate) fn class(mut self, class: &str) -> Self {
        self.data.classes.push(class.to_string());
        self
    }

    pub(crate) fn attr(mut self, name: &str, value: &str) -> Self {
        self.data.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub(crate) fn text(mut self, text: &str) -> Self {
        self.data.text = text.to_string();
        self
    }

    pub(crate) fn html(mut self, html: &str) -> Self {
        self.data.html = Some(html.to_string());
        self
    }

    /// Makes the node match `selector` when queried as CSS.
    pub(crate) fn matches(mut self, selector: &str) -> Self {
        self.data.aliases.push(selector.to_string());
        self
    }

    pub(crate) fn hidden(mut self) -> Self {
        self.data.hidden = true;
        self
    }
}

// ============================================================================
// ScriptedEditor
// ============================================================================

pub(crate) struct ScriptedEditor {
    value: Mutex<String>,
}

impl CodeEditor for ScriptedEditor {
    fn value(&self) -> String {
        self.value.lock().clone()
    }

    fn set_value(&self, value: &str) {
        *self.value.lock() = value.to_string();
    }
}

// ============================================================================
// ScriptedDom
// ============================================================================

struct PageState {
    url: Url,
    nodes: Vec<NodeData>,
    subscriptions: Vec<Subscription>,
    handlers: FxHashMap<NodeId, ClickHandler>,
    editor: Option<Arc<ScriptedEditor>>,
    editor_lookups: usize,
    observe_calls: usize,
    clicks: Vec<NodeId>,
    alerts: Vec<String>,
    buttons: Vec<String>,
}

/// Scripted page for tests.
pub(crate) struct ScriptedDom {
    state: Mutex<PageState>,
}

const DOCUMENT: NodeId = NodeId::new(0);
const BODY: NodeId = NodeId::new(1);

impl ScriptedDom {
    /// Creates a page with an empty `<body>`.
    pub(crate) fn new(url: &str) -> Self {
        let document = NodeData {
            tag: "#document".to_string(),
            children: vec![BODY],
            ..NodeData::default()
        };
        let body = NodeData {
            tag: "body".to_string(),
            parent: Some(DOCUMENT),
            ..NodeData::default()
        };

        Self {
            state: Mutex::new(PageState {
                url: Url::parse(url).expect("valid test url"),
                nodes: vec![document, body],
                subscriptions: Vec::new(),
                handlers: FxHashMap::default(),
                editor: None,
                editor_lookups: 0,
                observe_calls: 0,
                clicks: Vec::new(),
                alerts: Vec::new(),
                buttons: Vec::new(),
            }),
        }
    }

    pub(crate) fn body_id(&self) -> NodeId {
        BODY
    }

    pub(crate) fn set_url(&self, url: &str) {
        self.state.lock().url = Url::parse(url).expect("valid test url");
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    pub(crate) fn append(&self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let mut state = self.state.lock();
        let id = NodeId::new(state.nodes.len() as u64);
        let mut data = spec.data;
        data.parent = Some(parent);
        state.nodes.push(data);
        state.node_mut(parent).children.push(id);
        state.notify(parent, &Change::ChildList);
        id
    }

    pub(crate) fn remove(&self, node: NodeId) {
        let mut state = self.state.lock();
        let Some(parent) = state.node(node).parent else {
            return;
        };
        state.node_mut(parent).children.retain(|c| *c != node);
        state.node_mut(node).parent = None;
        state.notify(parent, &Change::ChildList);
    }

    /// Replaces the node's text, reported as a child-list change.
    pub(crate) fn set_text(&self, node: NodeId, text: &str) {
        let mut state = self.state.lock();
        state.node_mut(node).text = text.to_string();
        state.notify(node, &Change::ChildList);
    }

    pub(crate) fn set_attr(&self, node: NodeId, name: &str, value: Option<&str>) {
        let mut state = self.state.lock();
        let attrs = &mut state.node_mut(node).attrs;
        match value {
            Some(value) => attrs.insert(name.to_string(), value.to_string()),
            None => attrs.remove(name),
        };
        state.notify(node, &Change::Attribute(name.to_string()));
    }

    pub(crate) fn set_class(&self, node: NodeId, class: &str, present: bool) {
        let mut state = self.state.lock();
        let classes = &mut state.node_mut(node).classes;
        classes.retain(|c| c != class);
        if present {
            classes.push(class.to_string());
        }
        state.notify(node, &Change::Attribute("class".to_string()));
    }

    pub(crate) fn set_hidden(&self, node: NodeId, hidden: bool) {
        let mut state = self.state.lock();
        state.node_mut(node).hidden = hidden;
        state.notify(node, &Change::Attribute("style".to_string()));
    }

    pub(crate) fn on_click(&self, node: NodeId, handler: impl Fn(&ScriptedDom) + Send + Sync + 'static) {
        self.state.lock().handlers.insert(node, Arc::new(handler));
    }

    pub(crate) fn set_editor(&self, value: &str) {
        self.state.lock().editor = Some(Arc::new(ScriptedEditor {
            value: Mutex::new(value.to_string()),
        }));
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub(crate) fn editor_value(&self) -> Option<String> {
        self.state.lock().editor.as_ref().map(|e| e.value())
    }

    pub(crate) fn editor_lookups(&self) -> usize {
        self.state.lock().editor_lookups
    }

    pub(crate) fn clicks(&self) -> Vec<NodeId> {
        self.state.lock().clicks.clone()
    }

    pub(crate) fn alerts(&self) -> Vec<String> {
        self.state.lock().alerts.clone()
    }

    pub(crate) fn buttons(&self) -> Vec<String> {
        self.state.lock().buttons.clone()
    }

    pub(crate) fn observe_calls(&self) -> usize {
        self.state.lock().observe_calls
    }

    /// Subscriptions whose receiver is still alive.
    pub(crate) fn live_subscriptions(&self) -> usize {
        let mut state = self.state.lock();
        state.subscriptions.retain(|s| !s.tx.is_closed());
        state.subscriptions.len()
    }
}

// ============================================================================
// PageState
// ============================================================================

impl PageState {
    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_u64() as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_u64() as usize]
    }

    /// `node` and its ancestors, innermost first.
    fn chain(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = vec![node];
        let mut current = self.node(node).parent;
        while let Some(id) = current {
            chain.push(id);
            current = self.node(id).parent;
        }
        chain
    }

    fn is_attached(&self, node: NodeId) -> bool {
        self.chain(node).last() == Some(&DOCUMENT)
    }

    fn is_rendered(&self, node: NodeId) -> bool {
        let chain = self.chain(node);
        chain.last() == Some(&DOCUMENT) && chain.iter().all(|id| !self.node(*id).hidden)
    }

    fn matches(&self, node: NodeId, by: &By) -> bool {
        let data = self.node(node);
        match by {
            By::Id(id) => data.id.as_deref() == Some(id.as_str()),
            By::Class(class) => data.classes.iter().any(|c| c == class),
            By::Tag(tag) => data.tag == *tag,
            By::Css(css) => {
                data.aliases.iter().any(|a| a == css)
                    || data.tag == *css
                    || data.id.as_ref().is_some_and(|id| *css == format!("#{id}"))
                    || data.classes.iter().any(|c| {
                        *css == format!(".{c}") || *css == format!("{}.{c}", data.tag)
                    })
            }
        }
    }

    fn collect(&self, scope: NodeId, by: &By, first_only: bool, out: &mut Vec<NodeId>) {
        for child in &self.node(scope).children {
            if first_only && !out.is_empty() {
                return;
            }
            if self.matches(*child, by) {
                out.push(*child);
            }
            self.collect(*child, by, first_only, out);
        }
    }

    fn text(&self, node: NodeId) -> String {
        let data = self.node(node);
        if !data.text.is_empty() || data.children.is_empty() {
            return data.text.clone();
        }
        data.children
            .iter()
            .filter(|c| !self.node(**c).hidden)
            .map(|c| self.text(*c))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn notify(&mut self, node: NodeId, change: &Change) {
        let chain = self.chain(node);
        self.subscriptions.retain(|s| !s.tx.is_closed());

        for sub in &self.subscriptions {
            let in_reach = if sub.target == node {
                true
            } else {
                sub.scope.subtree && chain.contains(&sub.target)
            };
            let wanted = match change {
                Change::ChildList => sub.scope.child_list,
                Change::Attribute(name) => sub.scope.reports_attribute(name),
            };
            if in_reach && wanted {
                let _ = sub.tx.send(MutationBatch { records: 1 });
            }
        }
    }
}

// ============================================================================
// Dom
// ============================================================================

impl Dom for ScriptedDom {
    fn url(&self) -> Url {
        self.state.lock().url.clone()
    }

    fn document(&self) -> NodeId {
        DOCUMENT
    }

    fn body(&self) -> Option<NodeId> {
        Some(BODY)
    }

    fn find(&self, scope: NodeId, by: &By) -> Option<NodeId> {
        let state = self.state.lock();
        let mut out = Vec::new();
        state.collect(scope, by, true, &mut out);
        out.first().copied()
    }

    fn find_all(&self, scope: NodeId, by: &By) -> Vec<NodeId> {
        let state = self.state.lock();
        let mut out = Vec::new();
        state.collect(scope, by, false, &mut out);
        out
    }

    fn text(&self, node: NodeId) -> String {
        self.state.lock().text(node)
    }

    fn outer_html(&self, node: NodeId) -> String {
        let state = self.state.lock();
        let data = state.node(node);
        data.html
            .clone()
            .unwrap_or_else(|| format!("<{0}>{1}</{0}>", data.tag, state.text(node)))
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.state.lock().node(node).attrs.get(name).cloned()
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.state.lock().node(node).classes.iter().any(|c| c == class)
    }

    fn is_rendered(&self, node: NodeId) -> bool {
        self.state.lock().is_rendered(node)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let state = self.state.lock();
        let parent = state.node(node).parent?;
        let siblings = &state.node(parent).children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.state.lock().node(node).parent
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.state.lock().chain(node).contains(&ancestor)
    }

    fn click(&self, node: NodeId) {
        let handler = {
            let mut state = self.state.lock();
            state.clicks.push(node);
            if !state.is_attached(node) {
                return;
            }
            state.handlers.get(&node).cloned()
        };
        if let Some(handler) = handler {
            handler(self);
        }
    }

    fn observe(&self, target: NodeId, scope: &ObserveScope) -> MutationReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        state.observe_calls += 1;
        state.subscriptions.push(Subscription {
            target,
            scope: scope.clone(),
            tx,
        });
        rx
    }

    fn editor(&self) -> Option<Arc<dyn CodeEditor>> {
        let mut state = self.state.lock();
        state.editor_lookups += 1;
        state.editor.clone().map(|e| e as Arc<dyn CodeEditor>)
    }

    fn alert(&self, message: &str) {
        self.state.lock().alerts.push(message.to_string());
    }

    fn mount_button(&self, label: &str) {
        self.state.lock().buttons.push(label.to_string());
    }
}
