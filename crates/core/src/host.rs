//! Host capability traits and the payloads they exchange.
//!
//! The plugin runtime's host functions need server-side capabilities that
//! live in other crates (collections, the GraphQL engine, model-provider
//! clients). The traits are declared here so implementations can be
//! injected at composition time without crate cycles; `HostEnv` bundles
//! them together and is handed to every module instantiation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::context::ExecutionContext;
use crate::error::Result;

/// Invokes guest functions by name and validates embedder signatures.
///
/// Implemented by the engine over the plugin registry; consumed by the
/// collection subsystem, whose embedders are themselves guest functions.
pub trait FunctionInvoker: Send + Sync {
    /// Checks that `name` resolves to a function whose signature is
    /// `(string[]) -> f32[][]` or `(string[]) -> f64[][]`.
    fn validate_embedder(&self, name: &str) -> Result<()>;

    /// Invokes the named guest function with positional arguments, mapped
    /// onto its declared parameters in order, and returns its decoded
    /// result.
    fn call(&self, ctx: &ExecutionContext, name: &str, args: Vec<Value>) -> Result<Value>;
}

/// Re-enters the GraphQL engine for nested query execution.
pub trait GraphQlExecutor: Send + Sync {
    /// Executes a GraphQL query with JSON-encoded variables and returns
    /// the raw response document.
    fn execute(&self, ctx: &ExecutionContext, query: &str, variables: &str) -> Result<String>;
}

/// Client interface to the configured model providers.
///
/// Providers handle authentication, transport, and response parsing; the
/// runtime only relays typed requests from guests.
pub trait ModelProvider: Send + Sync {
    /// Resolves a model name to its provider-qualified info.
    fn lookup_model(&self, name: &str) -> Result<ModelInfo>;

    /// Invokes a model with a raw string payload.
    fn invoke_model(&self, ctx: &ExecutionContext, model: &str, input: &str) -> Result<String>;

    /// Computes embeddings for a map of sentences, keyed by caller ids.
    fn compute_embedding(
        &self,
        ctx: &ExecutionContext,
        model: &str,
        sentences: &HashMap<String, String>,
    ) -> Result<HashMap<String, Vec<f64>>>;

    /// Classifies a map of sentences, keyed by caller ids.
    fn invoke_classifier(
        &self,
        ctx: &ExecutionContext,
        model: &str,
        sentences: &HashMap<String, String>,
    ) -> Result<HashMap<String, ClassificationResult>>;

    /// Generates text from an instruction and an input sentence.
    fn invoke_text_generator(
        &self,
        ctx: &ExecutionContext,
        model: &str,
        instruction: &str,
        sentence: &str,
        format: &str,
    ) -> Result<String>;
}

/// The vector collection operations exposed to guests.
pub trait CollectionService: Send + Sync {
    fn upsert(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        keys: Vec<String>,
        texts: Vec<String>,
        labels: Vec<Vec<String>>,
    ) -> Result<CollectionMutationResult>;

    fn delete(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        key: &str,
    ) -> Result<CollectionMutationResult>;

    fn search(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        namespaces: Vec<String>,
        search_method: &str,
        text: &str,
        limit: i32,
        return_text: bool,
    ) -> Result<CollectionSearchResult>;

    fn nn_classify(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        search_method: &str,
        text: &str,
    ) -> Result<CollectionClassificationResult>;

    fn compute_distance(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        search_method: &str,
        key1: &str,
        key2: &str,
    ) -> Result<CollectionSearchResultObject>;

    fn recompute_search_method(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        search_method: &str,
    ) -> Result<SearchMethodMutationResult>;

    fn get_text(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        key: &str,
    ) -> Result<String>;

    fn get_texts(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
    ) -> Result<HashMap<String, String>>;

    fn list_namespaces(&self, ctx: &ExecutionContext, collection: &str) -> Result<Vec<String>>;
}

/// The host environment injected into every module instance.
#[derive(Clone)]
pub struct HostEnv {
    /// Model-provider clients.
    pub models: Arc<dyn ModelProvider>,

    /// Nested GraphQL execution.
    pub graphql: Arc<dyn GraphQlExecutor>,

    /// The vector collection service.
    pub collections: Arc<dyn CollectionService>,

    /// Runtime configuration (HTTP allow-list, timeouts).
    pub config: RuntimeConfig,
}

/// Provider-qualified model information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    pub full_name: String,
}

/// Result of a classifier invocation for one sentence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub probabilities: Vec<ClassificationProbability>,
}

/// A single classifier label with its probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationProbability {
    pub label: String,
    pub probability: f64,
}

/// Result of a collection upsert or delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMutationResult {
    pub collection: String,
    pub operation: String,
    pub status: String,
    pub keys: Vec<String>,
    pub error: String,
}

/// Result of a collection search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSearchResult {
    pub collection: String,
    pub search_method: String,
    pub status: String,
    pub objects: Vec<CollectionSearchResultObject>,
}

/// One search hit. `score` is `1 - distance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSearchResultObject {
    pub namespace: String,
    pub key: String,
    pub text: String,
    pub distance: f64,
    pub score: f64,
}

/// Result of a nearest-neighbor classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionClassificationResult {
    pub collection: String,
    pub search_method: String,
    pub status: String,
    pub labels_result: Vec<CollectionClassificationLabelObject>,
    pub cluster: Vec<CollectionClassificationResultObject>,
}

/// A label with its classification confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionClassificationLabelObject {
    pub label: String,
    pub confidence: f64,
}

/// A retained neighbor in the classification cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionClassificationResultObject {
    pub key: String,
    pub labels: Vec<String>,
    pub distance: f64,
    pub score: f64,
}

/// Result of a search-method recompute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMethodMutationResult {
    pub collection: String,
    pub operation: String,
    pub status: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_serialize_camel_case() {
        let result = CollectionSearchResult {
            collection: "docs".to_string(),
            search_method: "sm".to_string(),
            status: "success".to_string(),
            objects: vec![CollectionSearchResultObject {
                namespace: "default".to_string(),
                key: "k".to_string(),
                text: "t".to_string(),
                distance: 0.25,
                score: 0.75,
            }],
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["searchMethod"], "sm");
        assert_eq!(json["objects"][0]["key"], "k");
        assert_eq!(json["objects"][0]["score"], 0.75);
    }

    #[test]
    fn test_labels_result_field_name() {
        let result = CollectionClassificationResult {
            collection: "docs".to_string(),
            search_method: "sm".to_string(),
            status: "success".to_string(),
            labels_result: vec![CollectionClassificationLabelObject {
                label: "red".to_string(),
                confidence: 1.0,
            }],
            cluster: Vec::new(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["labelsResult"][0]["label"], "red");
    }
}
