//! Collections, namespaces, and the namespace store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{CollectionError, Result};
use crate::index::VectorIndex;

/// Name used when an operation leaves the namespace empty.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Storage backing one namespace: texts, labels, and the external-id
/// assignment. In-memory by default; pluggable so a persistent store can
/// be swapped in underneath the same collection code.
pub trait NamespaceStore: Send + Sync {
    /// Inserts or overwrites texts by key. `labels` is either empty or
    /// parallel to `keys`/`texts`. External ids are assigned on first
    /// insert of a key and never change afterwards.
    fn insert_texts(&mut self, keys: &[String], texts: &[String], labels: &[Vec<String>])
        -> Result<()>;

    /// Removes a key's text, labels, and external id.
    fn delete_text(&mut self, key: &str) -> Result<()>;

    /// The text stored under `key`.
    fn get_text(&self, key: &str) -> Result<String>;

    /// A snapshot of every key and text.
    fn text_map(&self) -> HashMap<String, String>;

    /// Labels stored under `key`; empty if none.
    fn labels(&self, key: &str) -> Vec<String>;

    /// The external id assigned to `key`.
    fn external_id(&self, key: &str) -> Result<i64>;

    /// Reverse lookup from external id to key.
    fn key_for_id(&self, id: i64) -> Option<String>;

    /// Number of live keys.
    fn len(&self) -> usize;

    /// Whether the namespace holds no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory namespace store.
#[derive(Default)]
pub struct InMemoryNamespace {
    texts: HashMap<String, String>,
    labels: HashMap<String, Vec<String>>,
    external_ids: HashMap<String, i64>,
    keys_by_id: HashMap<i64, String>,
    next_id: i64,
}

impl InMemoryNamespace {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NamespaceStore for InMemoryNamespace {
    fn insert_texts(
        &mut self,
        keys: &[String],
        texts: &[String],
        labels: &[Vec<String>],
    ) -> Result<()> {
        for (i, key) in keys.iter().enumerate() {
            self.texts.insert(key.clone(), texts[i].clone());
            if let Some(key_labels) = labels.get(i) {
                self.labels.insert(key.clone(), key_labels.clone());
            }

            // assigned exactly once per key; ids are never reused, even
            // after the key is deleted
            if !self.external_ids.contains_key(key) {
                self.next_id += 1;
                self.external_ids.insert(key.clone(), self.next_id);
                self.keys_by_id.insert(self.next_id, key.clone());
            }
        }
        Ok(())
    }

    fn delete_text(&mut self, key: &str) -> Result<()> {
        if self.texts.remove(key).is_none() {
            return Err(CollectionError::KeyNotFound(key.to_string()));
        }
        self.labels.remove(key);
        if let Some(id) = self.external_ids.remove(key) {
            self.keys_by_id.remove(&id);
        }
        Ok(())
    }

    fn get_text(&self, key: &str) -> Result<String> {
        self.texts
            .get(key)
            .cloned()
            .ok_or_else(|| CollectionError::KeyNotFound(key.to_string()))
    }

    fn text_map(&self) -> HashMap<String, String> {
        self.texts.clone()
    }

    fn labels(&self, key: &str) -> Vec<String> {
        self.labels.get(key).cloned().unwrap_or_default()
    }

    fn external_id(&self, key: &str) -> Result<i64> {
        self.external_ids
            .get(key)
            .copied()
            .ok_or_else(|| CollectionError::KeyNotFound(key.to_string()))
    }

    fn key_for_id(&self, id: i64) -> Option<String> {
        self.keys_by_id.get(&id).cloned()
    }

    fn len(&self) -> usize {
        self.texts.len()
    }
}

/// One namespace: its store plus one vector index per search method.
/// Guarded as a unit by the owning collection's per-namespace lock.
pub struct CollectionNamespace {
    pub store: Box<dyn NamespaceStore>,
    pub indices: HashMap<String, Box<dyn VectorIndex>>,
}

impl CollectionNamespace {
    pub fn new(store: Box<dyn NamespaceStore>) -> Self {
        Self {
            store,
            indices: HashMap::new(),
        }
    }

    /// The index for a search method.
    pub fn index(&self, method: &str) -> Result<&dyn VectorIndex> {
        self.indices
            .get(method)
            .map(|b| b.as_ref())
            .ok_or_else(|| CollectionError::IndexNotFound(method.to_string()))
    }

    /// Mutable access to the index for a search method.
    pub fn index_mut(&mut self, method: &str) -> Result<&mut Box<dyn VectorIndex>> {
        self.indices
            .get_mut(method)
            .ok_or_else(|| CollectionError::IndexNotFound(method.to_string()))
    }
}

/// A named collection: namespace name to namespace, created on demand.
pub struct Collection {
    name: String,
    namespaces: RwLock<HashMap<String, Arc<Mutex<CollectionNamespace>>>>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up an existing namespace.
    pub fn find_namespace(&self, namespace: &str) -> Result<Arc<Mutex<CollectionNamespace>>> {
        self.namespaces
            .read()
            .ok()
            .and_then(|map| map.get(namespace).cloned())
            .ok_or_else(|| CollectionError::NamespaceNotFound(namespace.to_string()))
    }

    /// Looks up a namespace, creating an empty in-memory one if absent.
    pub fn find_or_create_namespace(&self, namespace: &str) -> Arc<Mutex<CollectionNamespace>> {
        if let Ok(map) = self.namespaces.read() {
            if let Some(ns) = map.get(namespace) {
                return ns.clone();
            }
        }

        let mut map = match self.namespaces.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(namespace.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(CollectionNamespace::new(Box::new(
                    InMemoryNamespace::new(),
                ))))
            })
            .clone()
    }

    /// Names of all namespaces in this collection.
    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces
            .read()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Registry of collections, keyed by name.
#[derive(Default)]
pub struct CollectionRegistry {
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a collection by name.
    pub fn insert(&self, collection: Arc<Collection>) {
        if let Ok(mut map) = self.collections.write() {
            map.insert(collection.name().to_string(), collection);
        }
    }

    /// Looks up a collection by name.
    pub fn find(&self, name: &str) -> Result<Arc<Collection>> {
        self.collections
            .read()
            .ok()
            .and_then(|map| map.get(name).cloned())
            .ok_or_else(|| CollectionError::CollectionNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_ids_assigned_once_and_never_reused() {
        let mut store = InMemoryNamespace::new();
        store
            .insert_texts(
                &["a".to_string(), "b".to_string()],
                &["text a".to_string(), "text b".to_string()],
                &[],
            )
            .unwrap();

        let id_a = store.external_id("a").unwrap();
        let id_b = store.external_id("b").unwrap();
        assert_ne!(id_a, id_b);

        // re-inserting a key keeps its id
        store
            .insert_texts(&["a".to_string()], &["updated".to_string()], &[])
            .unwrap();
        assert_eq!(store.external_id("a").unwrap(), id_a);
        assert_eq!(store.get_text("a").unwrap(), "updated");

        // deleting then re-inserting assigns a fresh id
        store.delete_text("a").unwrap();
        assert!(store.external_id("a").is_err());
        store
            .insert_texts(&["a".to_string()], &["again".to_string()], &[])
            .unwrap();
        let id_a2 = store.external_id("a").unwrap();
        assert_ne!(id_a2, id_a);
        assert_ne!(id_a2, id_b);
    }

    #[test]
    fn test_len_counts_live_keys() {
        let mut store = InMemoryNamespace::new();
        store
            .insert_texts(
                &["a".to_string(), "b".to_string()],
                &["1".to_string(), "2".to_string()],
                &[],
            )
            .unwrap();
        assert_eq!(store.len(), 2);

        store.delete_text("a").unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.key_for_id(1).is_none() || store.key_for_id(1) == Some("b".to_string()));
    }

    #[test]
    fn test_labels_roundtrip() {
        let mut store = InMemoryNamespace::new();
        store
            .insert_texts(
                &["a".to_string()],
                &["text".to_string()],
                &[vec!["red".to_string(), "warm".to_string()]],
            )
            .unwrap();

        assert_eq!(store.labels("a"), vec!["red", "warm"]);
        assert!(store.labels("missing").is_empty());
    }

    #[test]
    fn test_find_or_create_namespace() {
        let collection = Collection::new("docs");
        assert!(collection.find_namespace("default").is_err());

        let ns = collection.find_or_create_namespace("default");
        assert!(ns.lock().unwrap().store.is_empty());
        assert!(collection.find_namespace("default").is_ok());
        assert_eq!(collection.namespace_names(), vec!["default".to_string()]);
    }
}
