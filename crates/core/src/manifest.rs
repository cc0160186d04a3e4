//! Collection manifest: the read-only projection of configured collections
//! and their search methods.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// The collections portion of the runtime manifest.
///
/// Loaded once at startup and never mutated; collection operations consult
/// it for search-method configuration (embedder function and index
/// parameters).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionManifest {
    /// Collections, keyed by name.
    #[serde(default)]
    pub collections: HashMap<String, CollectionInfo>,
}

/// A single configured collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    /// Search methods, keyed by name.
    #[serde(default)]
    pub search_methods: HashMap<String, SearchMethodInfo>,
}

/// A search method within a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMethodInfo {
    /// Name of the guest function that embeds texts for this method.
    pub embedder: String,

    /// Parameters of the vector index backing this method.
    #[serde(default)]
    pub index: IndexParams,
}

/// Vector index parameters, tagged by index kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IndexParams {
    /// Flat-scan index; exact search, no build-time parameters.
    Sequential,
}

impl Default for IndexParams {
    fn default() -> Self {
        IndexParams::Sequential
    }
}

impl CollectionManifest {
    /// Loads a manifest from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::Manifest(e.to_string()))
    }

    /// Looks up a collection by name.
    pub fn collection(&self, name: &str) -> Option<&CollectionInfo> {
        self.collections.get(name)
    }

    /// Looks up a search method within a collection.
    pub fn search_method(&self, collection: &str, method: &str) -> Option<&SearchMethodInfo> {
        self.collections
            .get(collection)?
            .search_methods
            .get(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let json = r#"{
            "collections": {
                "docs": {
                    "searchMethods": {
                        "searchMethod1": {
                            "embedder": "embed",
                            "index": {"type": "sequential"}
                        }
                    }
                }
            }
        }"#;

        let manifest = CollectionManifest::from_json(json).unwrap();
        let method = manifest.search_method("docs", "searchMethod1").unwrap();
        assert_eq!(method.embedder, "embed");
        assert!(matches!(method.index, IndexParams::Sequential));
    }

    #[test]
    fn test_index_params_default() {
        let json = r#"{
            "collections": {
                "docs": {
                    "searchMethods": {
                        "sm": {"embedder": "embed"}
                    }
                }
            }
        }"#;

        let manifest = CollectionManifest::from_json(json).unwrap();
        let method = manifest.search_method("docs", "sm").unwrap();
        assert!(matches!(method.index, IndexParams::Sequential));
    }

    #[test]
    fn test_unknown_lookups() {
        let manifest = CollectionManifest::default();
        assert!(manifest.collection("missing").is_none());
        assert!(manifest.search_method("missing", "sm").is_none());
    }
}
