//! Data source behavior against a live guest, covering the envelope,
//! shaping, and output-transformation paths end to end.

use std::sync::Arc;

use borealis_collections::CollectionRuntime;
use borealis_core::{
    CollectionManifest, CollectionService, ExecutionContext, FunctionInvoker, HostEnv, Metadata,
    RuntimeConfig,
};
use borealis_engine::{DetachedGraphQl, FunctionRuntime, Source, UnconfiguredModels};
use borealis_plugin::{Plugin, PluginRegistry, WasmHost};

/// Guest module with static objects laid out in data segments: a Person
/// at 256, a constant embedding matrix at 368, and a stdout warning line
/// emitted through WASI `fd_write`.
const FIXTURE_WAT: &str = r#"
(module
  (import "wasi_snapshot_preview1" "fd_write"
    (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 16)

  ;; "Warning: slow path\n"
  (data (i32.const 64) "Warning: slow path\0a")

  ;; string "ada": class id 2, byte length 6, UTF-16LE payload at 208
  (data (i32.const 200) "\02\00\00\00\06\00\00\00\61\00\64\00\61\00")

  ;; string "x": payload at 232
  (data (i32.const 224) "\02\00\00\00\02\00\00\00\78\00")

  ;; Person{name: "ada", age: 36, city: "x"}: class id 9, 12-byte payload at 256
  (data (i32.const 248) "\09\00\00\00\0c\00\00\00\d0\00\00\00\24\00\00\00\e8\00\00\00")

  ;; f32 buffer [1.0, 0.0]: class id 1, payload at 288
  (data (i32.const 280) "\01\00\00\00\08\00\00\00\00\00\80\3f\00\00\00\00")

  ;; f32[] view at 312: buffer 288, data start 288, 8 bytes, 2 elements
  (data (i32.const 304) "\07\00\00\00\10\00\00\00\20\01\00\00\20\01\00\00\08\00\00\00\02\00\00\00")

  ;; buffer holding one pointer to 312: class id 1, payload at 344
  (data (i32.const 336) "\01\00\00\00\04\00\00\00\38\01\00\00")

  ;; f32[][] at 368: buffer 344, data start 344, 4 bytes, 1 element
  (data (i32.const 360) "\08\00\00\00\10\00\00\00\58\01\00\00\58\01\00\00\04\00\00\00\01\00\00\00")

  (global $heap (mut i32) (i32.const 4096))
  (func (export "__new") (param $size i32) (param $id i32) (result i32)
    (local $ptr i32)
    (local.set $ptr
      (i32.add
        (i32.and (i32.add (global.get $heap) (i32.const 7)) (i32.const -8))
        (i32.const 8)))
    (i32.store (i32.sub (local.get $ptr) (i32.const 8)) (local.get $id))
    (i32.store (i32.sub (local.get $ptr) (i32.const 4)) (local.get $size))
    (global.set $heap (i32.add (local.get $ptr) (local.get $size)))
    (local.get $ptr))
  (func (export "__pin") (param $ptr i32) (result i32) (local.get $ptr))
  (func (export "__unpin") (param $ptr i32))
  (func (export "_start"))

  (func (export "add") (param i32 i32) (result i32)
    (i32.add (local.get 0) (local.get 1)))
  (func (export "person") (result i32) (i32.const 256))
  (func (export "embedConst") (param i32) (result i32) (i32.const 368))
  (func (export "warn")
    (i32.store (i32.const 32) (i32.const 64))
    (i32.store (i32.const 36) (i32.const 19))
    (drop (call $fd_write (i32.const 1) (i32.const 32) (i32.const 1) (i32.const 44))))
)
"#;

const FIXTURE_METADATA: &str = r#"{
    "plugin": "fixture",
    "sdk": "functions-sdk",
    "buildId": "test",
    "fnExports": {
        "add": {
            "name": "add",
            "parameters": [
                {"name": "a", "type": "i32"},
                {"name": "b", "type": "i32"}
            ],
            "results": [{"type": "i32"}]
        },
        "person": {"name": "person", "parameters": [], "results": [{"type": "Person"}]},
        "warn": {"name": "warn", "parameters": [], "results": []},
        "embedConst": {
            "name": "embedConst",
            "parameters": [{"name": "texts", "type": "string[]"}],
            "results": [{"type": "f32[][]"}]
        }
    },
    "types": {
        "Person": {"id": 9, "name": "Person", "fields": [
            {"name": "name", "type": "string"},
            {"name": "age", "type": "i32"},
            {"name": "city", "type": "string"}
        ]},
        "string[]": {"id": 4, "name": "string[]"},
        "f32[]": {"id": 7, "name": "f32[]"},
        "f32[][]": {"id": 8, "name": "f32[][]"}
    }
}"#;

fn build() -> (Source, Arc<CollectionRuntime>) {
    let host = Arc::new(WasmHost::new(RuntimeConfig::default()).unwrap());
    let registry = Arc::new(PluginRegistry::new());

    let wasm = wat::parse_str(FIXTURE_WAT).unwrap();
    let metadata = Metadata::from_json(FIXTURE_METADATA).unwrap();
    let plugin = Plugin::from_parts(host.engine(), metadata, &wasm).unwrap();
    registry.load(plugin);

    let runtime = Arc::new(FunctionRuntime::new(host, registry));

    let manifest = CollectionManifest::from_json(
        r#"{
            "collections": {
                "docs": {
                    "searchMethods": {
                        "searchMethod1": {"embedder": "embedConst"}
                    }
                }
            }
        }"#,
    )
    .unwrap();
    let collections = Arc::new(CollectionRuntime::new(
        manifest,
        runtime.clone() as Arc<dyn FunctionInvoker>,
    ));

    let env = Arc::new(HostEnv {
        models: Arc::new(UnconfiguredModels),
        graphql: Arc::new(DetachedGraphQl),
        collections: collections.clone(),
        config: RuntimeConfig::default(),
    });
    runtime.wire(env);

    (Source::new(runtime), collections)
}

fn load(source: &Source, input: &str) -> String {
    let ctx = ExecutionContext::new();
    let mut out = Vec::new();
    source.load(&ctx, input.as_bytes(), &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_scalar_function_result() {
    let (source, _) = build();
    let output = load(
        &source,
        r#"{"fn":{"name":"add","alias":null,"fields":[]},"data":{"a":1,"b":2}}"#,
    );
    assert_eq!(output, r#"{"data":{"add":3}}"#);
}

#[test]
fn test_selection_set_shapes_object() {
    let (source, _) = build();
    let output = load(
        &source,
        r#"{"fn":{"name":"person","alias":"person","fields":[{"name":"name"},{"name":"age"}]},"data":{}}"#,
    );
    assert_eq!(output, r#"{"data":{"person":{"name":"ada","age":36}}}"#);
}

#[test]
fn test_full_selection_includes_city() {
    let (source, _) = build();
    let output = load(
        &source,
        r#"{"fn":{"name":"person","fields":[{"name":"name"},{"name":"age"},{"name":"city"}]},"data":{}}"#,
    );
    assert_eq!(
        output,
        r#"{"data":{"person":{"name":"ada","age":36,"city":"x"}}}"#
    );
}

#[test]
fn test_guest_warning_becomes_error_without_data() {
    let (source, _) = build();
    let output = load(&source, r#"{"fn":{"name":"warn","fields":[]},"data":{}}"#);
    assert_eq!(
        output,
        r#"{"errors":[{"message":"slow path","path":["warn"],"extensions":{"level":"warning"}}]}"#
    );
}

#[test]
fn test_unknown_function_error() {
    let (source, _) = build();
    let output = load(&source, r#"{"fn":{"name":"nope"},"data":{}}"#);
    assert_eq!(
        output,
        r#"{"errors":[{"message":"no function registered named nope","path":["nope"],"extensions":{"level":"error"}}]}"#
    );
}

#[test]
fn test_malformed_envelope_is_a_load_error() {
    let (source, _) = build();
    let ctx = ExecutionContext::new();
    let mut out = Vec::new();
    let err = source.load(&ctx, b"{not json", &mut out).unwrap_err();
    assert!(err.to_string().starts_with("error parsing input:"));
    assert!(out.is_empty());
}

#[test]
fn test_collections_embed_through_guest() {
    let (_source, collections) = build();
    let ctx = ExecutionContext::new();

    let result = collections
        .upsert(
            &ctx,
            "docs",
            "",
            vec!["k1".to_string()],
            vec!["hello".to_string()],
            vec![],
        )
        .unwrap();
    assert_eq!(result.status, "success");

    let found = collections
        .search(&ctx, "docs", vec![], "searchMethod1", "anything", 1, true)
        .unwrap();
    assert_eq!(found.objects.len(), 1);
    assert_eq!(found.objects[0].key, "k1");
    assert_eq!(found.objects[0].text, "hello");
    assert!(found.objects[0].score > 0.999);
}
