//! End-to-end collection behavior against a deterministic stub embedder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;

use borealis_collections::CollectionRuntime;
use borealis_core::{
    CollectionManifest, CollectionService, CoreError, ExecutionContext, FunctionInvoker,
};

/// Deterministic embedder: texts starting with "red"/"blue" map near the
/// respective cluster axis; anything else is spread by byte sum. Identical
/// inputs always produce identical vectors.
fn embed_text(text: &str) -> Vec<f32> {
    let sum: u32 = text.bytes().map(u32::from).sum();
    let jitter = (sum % 10) as f32 * 0.001;

    if text.starts_with("red") {
        vec![1.0, jitter, 0.0]
    } else if text.starts_with("blue") {
        vec![jitter, 1.0, 0.0]
    } else {
        vec![
            (sum % 7 + 1) as f32,
            (sum % 13 + 1) as f32,
            (sum % 17 + 1) as f32,
        ]
    }
}

struct StubInvoker {
    calls: AtomicUsize,
}

impl StubInvoker {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl FunctionInvoker for StubInvoker {
    fn validate_embedder(&self, name: &str) -> borealis_core::Result<()> {
        if name == "embed" {
            Ok(())
        } else {
            Err(CoreError::Collection(
                "invalid embedder function signature".to_string(),
            ))
        }
    }

    fn call(
        &self,
        _ctx: &ExecutionContext,
        _name: &str,
        args: Vec<Value>,
    ) -> borealis_core::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let texts: Vec<String> = serde_json::from_value(args[0].clone())
            .map_err(|e| CoreError::Invocation(e.to_string()))?;
        let vectors: Vec<Vec<f32>> = texts.iter().map(|t| embed_text(t)).collect();
        serde_json::to_value(vectors).map_err(|e| CoreError::Invocation(e.to_string()))
    }
}

fn manifest(embedder: &str) -> CollectionManifest {
    CollectionManifest::from_json(&format!(
        r#"{{
            "collections": {{
                "docs": {{
                    "searchMethods": {{
                        "searchMethod1": {{
                            "embedder": "{embedder}",
                            "index": {{"type": "sequential"}}
                        }}
                    }}
                }}
            }}
        }}"#
    ))
    .unwrap()
}

fn runtime() -> CollectionRuntime {
    CollectionRuntime::new(manifest("embed"), StubInvoker::new())
}

fn upsert(
    runtime: &CollectionRuntime,
    keys: &[&str],
    texts: &[&str],
    labels: &[&[&str]],
) -> Vec<String> {
    let ctx = ExecutionContext::new();
    let result = runtime
        .upsert(
            &ctx,
            "docs",
            "",
            keys.iter().map(|s| s.to_string()).collect(),
            texts.iter().map(|s| s.to_string()).collect(),
            labels
                .iter()
                .map(|l| l.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
        .unwrap();
    assert_eq!(result.status, "success");
    result.keys
}

#[test]
fn test_upsert_then_search_finds_exact_text() {
    let runtime = runtime();
    let ctx = ExecutionContext::new();

    let keys = upsert(&runtime, &[], &["a", "b"], &[]);
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);

    let result = runtime
        .search(&ctx, "docs", vec![], "searchMethod1", "a", 1, true)
        .unwrap();

    assert_eq!(result.objects.len(), 1);
    assert_eq!(result.objects[0].text, "a");
    assert!(result.objects[0].score >= 0.99);
    assert_eq!(result.objects[0].namespace, "default");
}

#[test]
fn test_search_clamps_limit_to_merged_count() {
    let runtime = runtime();
    let ctx = ExecutionContext::new();

    upsert(&runtime, &[], &["a", "b"], &[]);

    let result = runtime
        .search(&ctx, "docs", vec![], "searchMethod1", "a", 10, false)
        .unwrap();
    assert_eq!(result.objects.len(), 2);

    // ascending by distance
    assert!(result.objects[0].distance <= result.objects[1].distance);
}

#[test]
fn test_search_never_returns_deleted_keys() {
    let runtime = runtime();
    let ctx = ExecutionContext::new();

    upsert(&runtime, &["k1", "k2"], &["a", "b"], &[]);

    let deleted = runtime.delete(&ctx, "docs", "", "k1").unwrap();
    assert_eq!(deleted.keys, vec!["k1"]);

    let result = runtime
        .search(&ctx, "docs", vec![], "searchMethod1", "a", 10, true)
        .unwrap();
    assert!(result.objects.iter().all(|o| o.key != "k1"));

    let texts = runtime.get_texts(&ctx, "docs", "").unwrap();
    assert_eq!(texts.len(), 1);
    assert!(texts.contains_key("k2"));
}

#[test]
fn test_delete_missing_key_fails() {
    let runtime = runtime();
    let ctx = ExecutionContext::new();

    upsert(&runtime, &["k1"], &["a"], &[]);
    let err = runtime.delete(&ctx, "docs", "", "missing").unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_label_count_mismatch() {
    let runtime = runtime();
    let ctx = ExecutionContext::new();

    let err = runtime
        .upsert(
            &ctx,
            "docs",
            "",
            vec![],
            vec!["a".to_string(), "b".to_string()],
            vec![vec!["only-one".to_string()]],
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "mismatch in number of labels and texts: 1 != 2"
    );
}

#[test]
fn test_invalid_embedder_rejected_before_embedding() {
    let runtime = CollectionRuntime::new(manifest("not_an_embedder"), StubInvoker::new());
    let ctx = ExecutionContext::new();

    let err = runtime
        .upsert(&ctx, "docs", "", vec![], vec!["a".to_string()], vec![])
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid embedder function signature");
}

#[test]
fn test_unknown_collection() {
    let runtime = runtime();
    let ctx = ExecutionContext::new();

    let err = runtime
        .search(&ctx, "nope", vec![], "searchMethod1", "a", 1, false)
        .unwrap_err();
    assert!(err.to_string().contains("nope"));
}

#[test]
fn test_nn_classify_majority_label() {
    let runtime = runtime();
    let ctx = ExecutionContext::new();

    let mut texts = Vec::new();
    let mut labels: Vec<&[&str]> = Vec::new();
    let red: Vec<String> = (0..100).map(|i| format!("red item {i}")).collect();
    let blue: Vec<String> = (0..100).map(|i| format!("blue item {i}")).collect();
    for t in &red {
        texts.push(t.as_str());
        labels.push(&["red"]);
    }
    for t in &blue {
        texts.push(t.as_str());
        labels.push(&["blue"]);
    }

    upsert(&runtime, &[], &texts, &labels);

    let result = runtime
        .nn_classify(&ctx, "docs", "", "searchMethod1", "red query")
        .unwrap();

    assert!(!result.labels_result.is_empty());
    assert_eq!(result.labels_result[0].label, "red");
    assert!(result.labels_result[0].confidence > 0.5);
    assert!(!result.cluster.is_empty());

    // deterministic: a second run produces the same ranking
    let again = runtime
        .nn_classify(&ctx, "docs", "", "searchMethod1", "red query")
        .unwrap();
    let ranking: Vec<&str> = result.labels_result.iter().map(|l| l.label.as_str()).collect();
    let ranking_again: Vec<&str> = again.labels_result.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(ranking, ranking_again);
}

#[test]
fn test_compute_distance_score_complement() {
    let runtime = runtime();
    let ctx = ExecutionContext::new();

    upsert(&runtime, &["k1", "k2"], &["a", "b"], &[]);

    let result = runtime
        .compute_distance(&ctx, "docs", "", "searchMethod1", "k1", "k2")
        .unwrap();

    assert!(result.distance >= 0.0 && result.distance <= 2.0);
    assert!((result.score - (1.0 - result.distance)).abs() < 1e-12);

    let self_distance = runtime
        .compute_distance(&ctx, "docs", "", "searchMethod1", "k1", "k1")
        .unwrap();
    assert!(self_distance.distance.abs() < 1e-9);
}

#[test]
fn test_recompute_rewrites_index() {
    let invoker = StubInvoker::new();
    let runtime = CollectionRuntime::new(manifest("embed"), invoker.clone());
    let ctx = ExecutionContext::new();

    runtime
        .upsert(
            &ctx,
            "docs",
            "",
            vec!["k1".to_string(), "k2".to_string()],
            vec!["a".to_string(), "b".to_string()],
            vec![],
        )
        .unwrap();

    let calls_before = invoker.calls.load(Ordering::SeqCst);
    let result = runtime
        .recompute_search_method(&ctx, "docs", "", "searchMethod1")
        .unwrap();
    assert_eq!(result.operation, "recompute");
    assert!(invoker.calls.load(Ordering::SeqCst) > calls_before);

    // the index still answers searches after the rewrite
    let found = runtime
        .search(&ctx, "docs", vec![], "searchMethod1", "a", 1, true)
        .unwrap();
    assert_eq!(found.objects[0].text, "a");
}

#[test]
fn test_list_namespaces_and_get_text() {
    let runtime = runtime();
    let ctx = ExecutionContext::new();

    runtime
        .upsert(
            &ctx,
            "docs",
            "articles",
            vec!["k1".to_string()],
            vec!["hello".to_string()],
            vec![],
        )
        .unwrap();
    upsert(&runtime, &["k2"], &["world"], &[]);

    let mut namespaces = runtime.list_namespaces(&ctx, "docs").unwrap();
    namespaces.sort();
    assert_eq!(namespaces, vec!["articles", "default"]);

    let text = runtime.get_text(&ctx, "docs", "articles", "k1").unwrap();
    assert_eq!(text, "hello");
}

#[test]
fn test_cancelled_context_stops_upsert() {
    let runtime = runtime();
    let ctx = ExecutionContext::new();
    ctx.cancellation().cancel();

    let err = runtime
        .upsert(&ctx, "docs", "", vec![], vec!["a".to_string()], vec![])
        .unwrap_err();
    assert!(matches!(err, CoreError::Cancelled));
}

#[test]
fn test_external_id_maps_stay_consistent() {
    let runtime = runtime();
    let ctx = ExecutionContext::new();

    upsert(&runtime, &["k1"], &["a"], &[]);
    runtime.delete(&ctx, "docs", "", "k1").unwrap();
    upsert(&runtime, &["k1"], &["a again"], &[]);

    // the re-inserted key is searchable under its new id
    let result = runtime
        .search(&ctx, "docs", vec![], "searchMethod1", "a again", 1, true)
        .unwrap();
    assert_eq!(result.objects[0].key, "k1");
    assert_eq!(result.objects[0].text, "a again");

    let texts: HashMap<String, String> = runtime.get_texts(&ctx, "docs", "").unwrap();
    assert_eq!(texts.len(), 1);
}
