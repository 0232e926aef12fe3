//! Lazily resolved code editor.
//!
//! Judge pages create their editor some time after load and recreate it on
//! client-side navigation. The binding resolves on first use and is
//! dropped with [`EditorBinding::invalidate`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::dom::{CodeEditor, Dom};

// ============================================================================
// EditorBinding
// ============================================================================

/// Cached handle to the page's code editor.
pub struct EditorBinding {
    dom: Arc<dyn Dom>,
    cached: Mutex<Option<Arc<dyn CodeEditor>>>,
}

impl EditorBinding {
    /// Creates an unresolved binding.
    pub fn new(dom: Arc<dyn Dom>) -> Self {
        Self {
            dom,
            cached: Mutex::new(None),
        }
    }

    fn resolve(&self) -> Option<Arc<dyn CodeEditor>> {
        let mut cached = self.cached.lock();
        if cached.is_none() {
            *cached = self.dom.editor();
        }
        cached.clone()
    }

    /// Editor contents, or empty if the page has no editor yet.
    #[must_use]
    pub fn get(&self) -> String {
        self.resolve().map(|e| e.value()).unwrap_or_default()
    }

    /// Replaces the editor contents.
    ///
    /// Returns `false` if the page has no editor yet.
    pub fn set(&self, code: &str) -> bool {
        match self.resolve() {
            Some(editor) => {
                editor.set_value(code);
                true
            }
            None => {
                debug!("No editor to receive code");
                false
            }
        }
    }

    /// Forgets the resolved editor.
    pub fn invalidate(&self) {
        self.cached.lock().take();
    }

    /// Returns `true` if an editor is currently cached.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.cached.lock().is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
