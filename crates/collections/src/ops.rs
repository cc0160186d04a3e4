//! Collection operations.
//!
//! Embeddings come from guest functions: each search method names an
//! embedder export, validated before use and invoked through the injected
//! [`FunctionInvoker`]. Embeddings are always computed before any
//! namespace lock is taken, so an upsert can insert texts and vectors
//! under one lock without re-entering the guest.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use uuid::Uuid;

use borealis_core::{
    CollectionClassificationLabelObject, CollectionClassificationResult,
    CollectionClassificationResultObject, CollectionManifest, CollectionMutationResult,
    CollectionSearchResult, CollectionSearchResultObject, CollectionService, ExecutionContext,
    FunctionInvoker, IndexParams, SearchMethodMutationResult,
};

use crate::error::{CollectionError, Result};
use crate::index::create_index;
use crate::namespace::{
    Collection, CollectionNamespace, CollectionRegistry, DEFAULT_NAMESPACE,
};
use crate::utils::to_f32_2d;

/// Batch size for re-embedding during a recompute.
const RECOMPUTE_BATCH: usize = 50;

/// The collection service: manifest projection, collection registry, and
/// the guest-function invoker used for embedding.
pub struct CollectionRuntime {
    manifest: CollectionManifest,
    registry: CollectionRegistry,
    invoker: Arc<dyn FunctionInvoker>,
}

impl CollectionRuntime {
    /// Creates the runtime, registering one collection per manifest entry.
    pub fn new(manifest: CollectionManifest, invoker: Arc<dyn FunctionInvoker>) -> Self {
        let registry = CollectionRegistry::new();
        for name in manifest.collections.keys() {
            registry.insert(Arc::new(Collection::new(name.clone())));
        }

        Self {
            manifest,
            registry,
            invoker,
        }
    }

    /// The manifest this runtime was configured from.
    pub fn manifest(&self) -> &CollectionManifest {
        &self.manifest
    }

    /// Resolves and validates the embedder for a search method.
    fn embedder_for(&self, collection: &str, method: &str) -> Result<String> {
        let info = self
            .manifest
            .collection(collection)
            .ok_or_else(|| CollectionError::CollectionNotFound(collection.to_string()))?;

        let search_method = info.search_methods.get(method).ok_or_else(|| {
            CollectionError::SearchMethodNotFound {
                collection: collection.to_string(),
                method: method.to_string(),
            }
        })?;

        if search_method.embedder.is_empty() {
            return Err(CollectionError::EmbedderNotConfigured {
                collection: collection.to_string(),
                method: method.to_string(),
            });
        }

        self.invoker.validate_embedder(&search_method.embedder)?;
        Ok(search_method.embedder.clone())
    }

    /// Invokes an embedder over a batch of texts.
    fn embed(
        &self,
        ctx: &ExecutionContext,
        embedder: &str,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        let args = vec![serde_json::to_value(texts).map_err(|e| {
            CollectionError::MalformedEmbedding(embedder.to_string(), e.to_string())
        })?];

        let result: Value = self.invoker.call(ctx, embedder, args)?;
        let vectors = to_f32_2d(embedder, &result)?;

        if vectors.len() != texts.len() {
            return Err(CollectionError::EmbeddingCountMismatch(embedder.to_string()));
        }
        Ok(vectors)
    }
}

fn normalize_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    }
}

fn lock_namespace(ns: &Arc<Mutex<CollectionNamespace>>) -> MutexGuard<'_, CollectionNamespace> {
    match ns.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn ensure_active(ctx: &ExecutionContext) -> Result<()> {
    if ctx.is_cancelled() {
        Err(CollectionError::Cancelled)
    } else {
        Ok(())
    }
}

impl CollectionService for CollectionRuntime {
    fn upsert(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        mut keys: Vec<String>,
        texts: Vec<String>,
        labels: Vec<Vec<String>>,
    ) -> borealis_core::Result<CollectionMutationResult> {
        let coll = self.registry.find(collection)?;
        let namespace = normalize_namespace(namespace);

        if keys.is_empty() {
            keys = texts.iter().map(|_| Uuid::now_v7().to_string()).collect();
        } else if keys.len() != texts.len() {
            return Err(CollectionError::KeyCountMismatch {
                keys: keys.len(),
                texts: texts.len(),
            }
            .into());
        }

        if !labels.is_empty() && labels.len() != texts.len() {
            return Err(CollectionError::LabelCountMismatch {
                labels: labels.len(),
                texts: texts.len(),
            }
            .into());
        }

        // compute embeddings for every configured search method before
        // taking the namespace lock
        let mut method_vectors: Vec<(String, IndexParams, Vec<Vec<f32>>)> = Vec::new();
        if let Some(info) = self.manifest.collection(collection) {
            for (method_name, method) in &info.search_methods {
                ensure_active(ctx)?;

                let embedder = self.embedder_for(collection, method_name)?;
                let vectors = self.embed(ctx, &embedder, &texts)?;
                method_vectors.push((method_name.clone(), method.index.clone(), vectors));
            }
        }

        // one critical section for texts and vectors, so no reader sees a
        // text without its vectors
        let ns = coll.find_or_create_namespace(namespace);
        let mut guard = lock_namespace(&ns);

        guard.store.insert_texts(&keys, &texts, &labels)?;

        let mut ids = Vec::with_capacity(keys.len());
        for key in &keys {
            ids.push(guard.store.external_id(key)?);
        }

        for (method_name, params, vectors) in method_vectors {
            if !guard.indices.contains_key(&method_name) {
                tracing::debug!(collection, namespace, method = %method_name, "creating vector index");
                guard
                    .indices
                    .insert(method_name.clone(), create_index(&params));
            }
            guard.index_mut(&method_name)?.insert_vectors(&ids, vectors)?;
        }

        Ok(CollectionMutationResult {
            collection: collection.to_string(),
            operation: "upsert".to_string(),
            status: "success".to_string(),
            keys,
            error: String::new(),
        })
    }

    fn delete(
        &self,
        _ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        key: &str,
    ) -> borealis_core::Result<CollectionMutationResult> {
        let coll = self.registry.find(collection)?;
        let namespace = normalize_namespace(namespace);

        let ns = coll.find_namespace(namespace)?;
        let mut guard = lock_namespace(&ns);

        let id = guard.store.external_id(key)?;
        for index in guard.indices.values_mut() {
            index.delete_vector(id)?;
        }
        guard.store.delete_text(key)?;

        Ok(CollectionMutationResult {
            collection: collection.to_string(),
            operation: "delete".to_string(),
            status: "success".to_string(),
            keys: vec![key.to_string()],
            error: String::new(),
        })
    }

    fn search(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        mut namespaces: Vec<String>,
        search_method: &str,
        text: &str,
        limit: i32,
        return_text: bool,
    ) -> borealis_core::Result<CollectionSearchResult> {
        let coll = self.registry.find(collection)?;
        if namespaces.is_empty() {
            namespaces.push(DEFAULT_NAMESPACE.to_string());
        }

        let embedder = self.embedder_for(collection, search_method)?;
        let vectors = self.embed(ctx, &embedder, &[text.to_string()])?;
        let query = vectors
            .first()
            .ok_or_else(|| CollectionError::NoEmbeddings(embedder.clone()))?;

        let limit = limit.max(0) as usize;
        let mut merged: Vec<CollectionSearchResultObject> =
            Vec::with_capacity(namespaces.len() * limit);

        for namespace in &namespaces {
            ensure_active(ctx)?;

            let ns = coll.find_namespace(namespace)?;
            let guard = lock_namespace(&ns);
            let index = guard.index(search_method)?;

            for m in index.search(query, limit, None)? {
                let key = guard
                    .store
                    .key_for_id(m.id)
                    .ok_or(CollectionError::VectorNotFound(m.id))?;
                let text = if return_text {
                    guard.store.get_text(&key)?
                } else {
                    String::new()
                };

                merged.push(CollectionSearchResultObject {
                    namespace: namespace.clone(),
                    key,
                    text,
                    distance: m.distance,
                    score: 1.0 - m.distance,
                });
            }
        }

        merged.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        merged.truncate(limit);

        Ok(CollectionSearchResult {
            collection: collection.to_string(),
            search_method: search_method.to_string(),
            status: "success".to_string(),
            objects: merged,
        })
    }

    fn nn_classify(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        search_method: &str,
        text: &str,
    ) -> borealis_core::Result<CollectionClassificationResult> {
        let coll = self.registry.find(collection)?;
        let namespace = normalize_namespace(namespace);

        let embedder = self.embedder_for(collection, search_method)?;
        let vectors = self.embed(ctx, &embedder, &[text.to_string()])?;
        let query = vectors
            .first()
            .ok_or_else(|| CollectionError::NoEmbeddings(embedder.clone()))?;

        let ns = coll.find_namespace(namespace)?;
        let guard = lock_namespace(&ns);
        let index = guard.index(search_method)?;

        // neighborhood size scales with the log of the namespace size
        let n = guard.store.len();
        let k = if n == 0 {
            1
        } else {
            let l = (n as f64).log10().floor().max(0.0) as usize;
            (l * l).max(1)
        };

        let nns = index.search(query, k, None)?;

        let (mean, std_dev) = if nns.is_empty() {
            (0.0, 0.0)
        } else {
            let sum: f64 = nns.iter().map(|m| m.distance).sum();
            let mean = sum / nns.len() as f64;
            let variance: f64 = nns
                .iter()
                .map(|m| (m.distance - mean).powi(2))
                .sum::<f64>()
                / nns.len() as f64;
            (mean, variance.sqrt())
        };

        // keep the neighbors within two standard deviations and tally
        // their labels
        let mut label_counts: HashMap<String, usize> = HashMap::new();
        let mut total_labels = 0usize;
        let mut cluster = Vec::new();

        for m in &nns {
            if (m.distance - mean).abs() > 2.0 * std_dev {
                continue;
            }

            let key = guard
                .store
                .key_for_id(m.id)
                .ok_or(CollectionError::VectorNotFound(m.id))?;
            let labels = guard.store.labels(&key);

            for label in &labels {
                *label_counts.entry(label.clone()).or_default() += 1;
                total_labels += 1;
            }

            cluster.push(CollectionClassificationResultObject {
                key,
                labels,
                distance: m.distance,
                score: 1.0 - m.distance,
            });
        }

        let mut labels_result: Vec<CollectionClassificationLabelObject> = label_counts
            .into_iter()
            .map(|(label, count)| CollectionClassificationLabelObject {
                label,
                confidence: count as f64 / total_labels as f64,
            })
            .collect();

        labels_result.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.label.cmp(&b.label))
        });

        Ok(CollectionClassificationResult {
            collection: collection.to_string(),
            search_method: search_method.to_string(),
            status: "success".to_string(),
            labels_result,
            cluster,
        })
    }

    fn compute_distance(
        &self,
        _ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        search_method: &str,
        key1: &str,
        key2: &str,
    ) -> borealis_core::Result<CollectionSearchResultObject> {
        let coll = self.registry.find(collection)?;
        let namespace = normalize_namespace(namespace);

        let ns = coll.find_namespace(namespace)?;
        let guard = lock_namespace(&ns);
        let index = guard.index(search_method)?;

        let id1 = guard.store.external_id(key1)?;
        let id2 = guard.store.external_id(key2)?;
        let v1 = index.get_vector(id1)?;
        let v2 = index.get_vector(id2)?;

        let distance = crate::utils::cosine_distance(&v1, &v2)?;

        Ok(CollectionSearchResultObject {
            namespace: namespace.to_string(),
            key: String::new(),
            text: String::new(),
            distance,
            score: 1.0 - distance,
        })
    }

    fn recompute_search_method(
        &self,
        ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        search_method: &str,
    ) -> borealis_core::Result<SearchMethodMutationResult> {
        let coll = self.registry.find(collection)?;
        let namespace = normalize_namespace(namespace);
        let embedder = self.embedder_for(collection, search_method)?;

        // snapshot the texts, then embed without holding the lock
        let ns = coll.find_namespace(namespace)?;
        let snapshot: Vec<(String, String)> = {
            let guard = lock_namespace(&ns);
            guard.index(search_method)?;
            guard.store.text_map().into_iter().collect()
        };

        let mut embedded: Vec<(String, Vec<f32>)> = Vec::with_capacity(snapshot.len());
        for batch in snapshot.chunks(RECOMPUTE_BATCH) {
            ensure_active(ctx)?;

            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let vectors = self.embed(ctx, &embedder, &texts)?;
            for ((key, _), vector) in batch.iter().zip(vectors) {
                embedded.push((key.clone(), vector));
            }
        }

        let mut guard = lock_namespace(&ns);
        let mut ids = Vec::with_capacity(embedded.len());
        let mut vectors = Vec::with_capacity(embedded.len());
        for (key, vector) in embedded {
            // keys deleted while embedding are skipped
            if let Ok(id) = guard.store.external_id(&key) {
                ids.push(id);
                vectors.push(vector);
            }
        }
        guard.index_mut(search_method)?.insert_vectors(&ids, vectors)?;

        Ok(SearchMethodMutationResult {
            collection: collection.to_string(),
            operation: "recompute".to_string(),
            status: "success".to_string(),
            error: String::new(),
        })
    }

    fn get_text(
        &self,
        _ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
        key: &str,
    ) -> borealis_core::Result<String> {
        let coll = self.registry.find(collection)?;
        let ns = coll.find_namespace(normalize_namespace(namespace))?;
        let guard = lock_namespace(&ns);
        Ok(guard.store.get_text(key)?)
    }

    fn get_texts(
        &self,
        _ctx: &ExecutionContext,
        collection: &str,
        namespace: &str,
    ) -> borealis_core::Result<HashMap<String, String>> {
        let coll = self.registry.find(collection)?;
        let ns = coll.find_namespace(normalize_namespace(namespace))?;
        let guard = lock_namespace(&ns);
        Ok(guard.store.text_map())
    }

    fn list_namespaces(
        &self,
        _ctx: &ExecutionContext,
        collection: &str,
    ) -> borealis_core::Result<Vec<String>> {
        let coll = self.registry.find(collection)?;
        Ok(coll.namespace_names())
    }
}
