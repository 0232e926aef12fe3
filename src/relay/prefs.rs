//! Preference stores.
//!
//! The relay reads a full snapshot when it opens a connection and forwards
//! individual changes while one is open.
//!
//! | Store | Backing |
//! |-------|---------|
//! | [`MemoryPreferenceStore`] | In-process map, publishes changes |
//! | [`JsonFilePreferenceStore`] | JSON object on disk |

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::Result;

// ============================================================================
// Types
// ============================================================================

/// Full preference snapshot.
pub type Preferences = BTreeMap<String, String>;

/// Changed preferences keyed by name.
pub type PreferenceChanges = BTreeMap<String, PreferenceChange>;

/// Capacity of the change channel of [`MemoryPreferenceStore`].
const CHANGE_CAPACITY: usize = 16;

/// New value of a single preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceChange {
    /// `None` when the preference was removed.
    pub new_value: Option<String>,
}

impl PreferenceChange {
    /// A preference set to `value`.
    #[must_use]
    pub fn set(value: impl Into<String>) -> Self {
        Self {
            new_value: Some(value.into()),
        }
    }

    /// A removed preference.
    #[must_use]
    pub fn removed() -> Self {
        Self { new_value: None }
    }
}

// ============================================================================
// PreferenceStore
// ============================================================================

/// Source of user preferences for the native host.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Reads every stored preference.
    async fn get_all(&self) -> Result<Preferences>;

    /// Subscribes to changes, if the store publishes them.
    fn subscribe(&self) -> Option<broadcast::Receiver<PreferenceChanges>> {
        None
    }
}

// ============================================================================
// MemoryPreferenceStore
// ============================================================================

/// In-memory preference store.
#[derive(Debug)]
pub struct MemoryPreferenceStore {
    values: RwLock<Preferences>,
    changes: broadcast::Sender<PreferenceChanges>,
}

impl Default for MemoryPreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPreferenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            values: RwLock::new(Preferences::new()),
            changes,
        }
    }

    /// Creates a store holding `values`.
    #[must_use]
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        *store.values.write() = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        store
    }

    /// Returns a single preference.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Sets a preference and publishes the change.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        self.values.write().insert(key.clone(), value.clone());
        self.publish(key, PreferenceChange::set(value));
    }

    /// Removes a preference and publishes the change if it existed.
    pub fn remove(&self, key: &str) {
        if self.values.write().remove(key).is_some() {
            self.publish(key.to_string(), PreferenceChange::removed());
        }
    }

    fn publish(&self, key: String, change: PreferenceChange) {
        let mut changes = PreferenceChanges::new();
        changes.insert(key, change);
        // No subscribers is fine.
        let _ = self.changes.send(changes);
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get_all(&self) -> Result<Preferences> {
        Ok(self.values.read().clone())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<PreferenceChanges>> {
        Some(self.changes.subscribe())
    }
}

// ============================================================================
// JsonFilePreferenceStore
// ============================================================================

/// Preferences stored as a flat JSON object.
///
/// A missing file reads as no preferences. Non-string values are kept in
/// their JSON text form.
#[derive(Debug, Clone)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
}

impl JsonFilePreferenceStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `prefs` to the file, replacing its contents.
    pub async fn save(&self, prefs: &Preferences) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(prefs)?;
        tokio::fs::write(&self.path, bytes).await?;
        debug!(path = %self.path.display(), count = prefs.len(), "Preferences saved");
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    async fn get_all(&self) -> Result<Preferences> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No preference file");
                return Ok(Preferences::new());
            }
            Err(e) => return Err(e.into()),
        };

        let object: serde_json::Map<String, Value> = serde_json::from_slice(&bytes)?;
        Ok(object
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_publishes_changes() {
        let store = MemoryPreferenceStore::with_values([("theme", "dark")]);
        let mut changes = store.subscribe().unwrap();

        store.set("editor", "vim");
        store.remove("theme");
        store.remove("missing");

        let first = changes.recv().await.unwrap();
        assert_eq!(first["editor"], PreferenceChange::set("vim"));
        let second = changes.recv().await.unwrap();
        assert_eq!(second["theme"], PreferenceChange::removed());
        assert!(changes.try_recv().is_err());

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(store.get("editor").as_deref(), Some("vim"));
    }

    #[tokio::test]
    async fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFilePreferenceStore::new(dir.path().join("prefs.json"));
        assert!(store.get_all().await.unwrap().is_empty());
        assert!(store.subscribe().is_none());
    }

    #[tokio::test]
    async fn test_json_store_reads_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, r#"{"editor": "nvim", "tabs": 4, "wrap": false}"#).unwrap();

        let prefs = JsonFilePreferenceStore::new(&path).get_all().await.unwrap();
        assert_eq!(prefs["editor"], "nvim");
        assert_eq!(prefs["tabs"], "4");
        assert_eq!(prefs["wrap"], "false");
    }

    #[tokio::test]
    async fn test_json_store_save_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFilePreferenceStore::new(dir.path().join("prefs.json"));
        let mut prefs = Preferences::new();
        prefs.insert("theme".into(), "light".into());

        store.save(&prefs).await.unwrap();
        assert_eq!(store.get_all().await.unwrap(), prefs);
    }

    #[tokio::test]
    async fn test_json_store_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let err = JsonFilePreferenceStore::new(&path).get_all().await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Json(_)));
    }

    #[test]
    fn test_change_wire_shape() {
        let json = serde_json::to_value(PreferenceChange::set("x")).unwrap();
        assert_eq!(json, serde_json::json!({"newValue": "x"}));
    }
}
