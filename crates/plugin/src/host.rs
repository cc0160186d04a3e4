//! Host functions exported into guest modules.
//!
//! Everything lands in the `borealis` guest module, registered once at
//! host startup. Each function resolves its declared signature from the
//! plugin's import table, reads arguments out of guest memory through the
//! type handlers, runs the server-side capability, and writes the typed
//! result back. Failures trap the calling guest with a descriptive
//! message; cancellation is checked before any outbound work.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Map, Value};
use wasmtime::{Caller, Linker};

use borealis_core::Function;

use crate::adapter::WasmAdapter;
use crate::error::{PluginError, Result};
use crate::instance::InstanceState;

/// Name of the guest module host functions are exported under.
pub const HOST_MODULE: &str = "borealis";

macro_rules! import_key {
    ($name:literal) => {
        concat!("borealis.", $name)
    };
}

pub(crate) fn register_host_functions(linker: &mut Linker<InstanceState>) -> Result<()> {
    linker.func_wrap(
        HOST_MODULE,
        "log",
        |mut caller: Caller<'_, InstanceState>, level: u32, message: u32| {
            in_host_call(
                &mut caller,
                import_key!("log"),
                &[level as u64, message as u64],
                host_log,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "executeGQL",
        |mut caller: Caller<'_, InstanceState>, query: u32, variables: u32| {
            in_host_call(
                &mut caller,
                import_key!("executeGQL"),
                &[query as u64, variables as u64],
                host_execute_gql,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "httpFetch",
        |mut caller: Caller<'_, InstanceState>, request: u32| {
            in_host_call(
                &mut caller,
                import_key!("httpFetch"),
                &[request as u64],
                host_fetch,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "lookupModel",
        |mut caller: Caller<'_, InstanceState>, name: u32| {
            in_host_call(
                &mut caller,
                import_key!("lookupModel"),
                &[name as u64],
                host_lookup_model,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "invokeModel",
        |mut caller: Caller<'_, InstanceState>, model: u32, input: u32| {
            in_host_call(
                &mut caller,
                import_key!("invokeModel"),
                &[model as u64, input as u64],
                host_invoke_model,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "computeEmbedding",
        |mut caller: Caller<'_, InstanceState>, model: u32, sentences: u32| {
            in_host_call(
                &mut caller,
                import_key!("computeEmbedding"),
                &[model as u64, sentences as u64],
                host_compute_embedding,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "invokeClassifier",
        |mut caller: Caller<'_, InstanceState>, model: u32, sentences: u32| {
            in_host_call(
                &mut caller,
                import_key!("invokeClassifier"),
                &[model as u64, sentences as u64],
                host_invoke_classifier,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "invokeTextGenerator",
        |mut caller: Caller<'_, InstanceState>,
         model: u32,
         instruction: u32,
         sentence: u32,
         format: u32| {
            in_host_call(
                &mut caller,
                import_key!("invokeTextGenerator"),
                &[
                    model as u64,
                    instruction as u64,
                    sentence as u64,
                    format as u64,
                ],
                host_invoke_text_generator,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "upsertToCollection",
        |mut caller: Caller<'_, InstanceState>,
         collection: u32,
         namespace: u32,
         keys: u32,
         texts: u32,
         labels: u32| {
            in_host_call(
                &mut caller,
                import_key!("upsertToCollection"),
                &[
                    collection as u64,
                    namespace as u64,
                    keys as u64,
                    texts as u64,
                    labels as u64,
                ],
                host_upsert_to_collection,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "deleteFromCollection",
        |mut caller: Caller<'_, InstanceState>, collection: u32, namespace: u32, key: u32| {
            in_host_call(
                &mut caller,
                import_key!("deleteFromCollection"),
                &[collection as u64, namespace as u64, key as u64],
                host_delete_from_collection,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "searchCollection",
        |mut caller: Caller<'_, InstanceState>,
         collection: u32,
         namespaces: u32,
         method: u32,
         text: u32,
         limit: i32,
         return_text: i32| {
            in_host_call(
                &mut caller,
                import_key!("searchCollection"),
                &[
                    collection as u64,
                    namespaces as u64,
                    method as u64,
                    text as u64,
                    limit as u32 as u64,
                    return_text as u32 as u64,
                ],
                host_search_collection,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "nnClassifyCollection",
        |mut caller: Caller<'_, InstanceState>,
         collection: u32,
         namespace: u32,
         method: u32,
         text: u32| {
            in_host_call(
                &mut caller,
                import_key!("nnClassifyCollection"),
                &[
                    collection as u64,
                    namespace as u64,
                    method as u64,
                    text as u64,
                ],
                host_nn_classify_collection,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "computeDistance",
        |mut caller: Caller<'_, InstanceState>,
         collection: u32,
         namespace: u32,
         method: u32,
         key1: u32,
         key2: u32| {
            in_host_call(
                &mut caller,
                import_key!("computeDistance"),
                &[
                    collection as u64,
                    namespace as u64,
                    method as u64,
                    key1 as u64,
                    key2 as u64,
                ],
                host_compute_distance,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "recomputeSearchMethod",
        |mut caller: Caller<'_, InstanceState>, collection: u32, namespace: u32, method: u32| {
            in_host_call(
                &mut caller,
                import_key!("recomputeSearchMethod"),
                &[collection as u64, namespace as u64, method as u64],
                host_recompute_search_method,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "getTextFromCollection",
        |mut caller: Caller<'_, InstanceState>, collection: u32, namespace: u32, key: u32| {
            in_host_call(
                &mut caller,
                import_key!("getTextFromCollection"),
                &[collection as u64, namespace as u64, key as u64],
                host_get_text_from_collection,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "getTextsFromCollection",
        |mut caller: Caller<'_, InstanceState>, collection: u32, namespace: u32| {
            in_host_call(
                &mut caller,
                import_key!("getTextsFromCollection"),
                &[collection as u64, namespace as u64],
                host_get_texts_from_collection,
            )
        },
    )?;

    linker.func_wrap(
        HOST_MODULE,
        "getNamespacesFromCollection",
        |mut caller: Caller<'_, InstanceState>, collection: u32| {
            in_host_call(
                &mut caller,
                import_key!("getNamespacesFromCollection"),
                &[collection as u64],
                host_get_namespaces_from_collection,
            )
        },
    )?;

    Ok(())
}

/// Shared host-call shell: build an adapter, decode the declared
/// arguments, run the body, and unwind the pin frame on every path.
fn in_host_call<R>(
    caller: &mut Caller<'_, InstanceState>,
    import_key: &str,
    words: &[u64],
    body: impl FnOnce(&mut WasmAdapter<'_>, &Function, Vec<Value>) -> Result<R>,
) -> std::result::Result<R, wasmtime::Error> {
    let mut wa = WasmAdapter::from_caller(caller).map_err(to_trap)?;
    let frame = wa.enter_pin_frame();

    let outcome = (|| {
        let signature = wa.import_signature(import_key)?;
        let args = decode_args(&mut wa, &signature, words)?;
        body(&mut wa, &signature, args)
    })();

    let cleanup = wa.exit_pin_frame(frame);
    let value = outcome.map_err(to_trap)?;
    cleanup.map_err(to_trap)?;
    Ok(value)
}

fn to_trap(err: PluginError) -> wasmtime::Error {
    wasmtime::Error::msg(err.to_string())
}

fn decode_args(
    wa: &mut WasmAdapter<'_>,
    signature: &Function,
    words: &[u64],
) -> Result<Vec<Value>> {
    if signature.parameters.len() != words.len() {
        return Err(PluginError::Marshal(format!(
            "host function {} declares {} parameters, received {}",
            signature.name,
            signature.parameters.len(),
            words.len()
        )));
    }

    let handlers = wa.handlers();
    signature
        .parameters
        .iter()
        .zip(words)
        .map(|(param, word)| {
            let handler = handlers.get(&param.type_name)?;
            handler.decode(wa, &[*word])
        })
        .collect()
}

fn encode_result(wa: &mut WasmAdapter<'_>, signature: &Function, value: &Value) -> Result<u32> {
    let result = signature.results.first().ok_or_else(|| {
        PluginError::Marshal(format!(
            "host function {} declares no result",
            signature.name
        ))
    })?;

    let handler = wa.handlers().get(&result.type_name)?;
    let words = handler.encode(wa, value)?;
    words
        .first()
        .map(|w| *w as u32)
        .ok_or_else(|| PluginError::Marshal("empty encoding for host result".to_string()))
}

fn ensure_active(wa: &WasmAdapter<'_>) -> Result<()> {
    if wa.context().is_cancelled() {
        Err(PluginError::Cancelled)
    } else {
        Ok(())
    }
}

// --- argument coercion ------------------------------------------------------

fn arg_str<'a>(args: &'a [Value], index: usize) -> Result<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| PluginError::Marshal(format!("expected string at host argument {index}")))
}

fn arg_i32(args: &[Value], index: usize) -> Result<i32> {
    args.get(index)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| PluginError::Marshal(format!("expected i32 at host argument {index}")))
}

fn arg_bool(args: &[Value], index: usize) -> Result<bool> {
    args.get(index)
        .and_then(Value::as_bool)
        .ok_or_else(|| PluginError::Marshal(format!("expected bool at host argument {index}")))
}

/// A string array argument; null collapses to empty.
fn arg_string_vec(args: &[Value], index: usize) -> Result<Vec<String>> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    PluginError::Marshal(format!("expected string array at host argument {index}"))
                })
            })
            .collect(),
        Some(other) => Err(PluginError::Marshal(format!(
            "expected string array at host argument {index}, got {other}"
        ))),
    }
}

fn arg_nested_string_vec(args: &[Value], index: usize) -> Result<Vec<Vec<String>>> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Array(inner) => inner
                    .iter()
                    .map(|v| {
                        v.as_str().map(str::to_string).ok_or_else(|| {
                            PluginError::Marshal(format!(
                                "expected string at host argument {index}[{i}]"
                            ))
                        })
                    })
                    .collect(),
                other => Err(PluginError::Marshal(format!(
                    "expected string array at host argument {index}[{i}], got {other}"
                ))),
            })
            .collect(),
        Some(other) => Err(PluginError::Marshal(format!(
            "expected nested string array at host argument {index}, got {other}"
        ))),
    }
}

fn arg_string_map(args: &[Value], index: usize) -> Result<HashMap<String, String>> {
    let map = args.get(index).and_then(Value::as_object).ok_or_else(|| {
        PluginError::Marshal(format!("expected string map at host argument {index}"))
    })?;

    map.iter()
        .map(|(k, v)| {
            v.as_str()
                .map(|s| (k.clone(), s.to_string()))
                .ok_or_else(|| PluginError::Marshal(format!("expected string value for key {k}")))
        })
        .collect()
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| PluginError::Marshal(format!("failed to serialize host result: {e}")))
}

// --- host function bodies ---------------------------------------------------

fn host_log(wa: &mut WasmAdapter<'_>, _sig: &Function, args: Vec<Value>) -> Result<()> {
    let level = arg_str(&args, 0)?;
    let message = arg_str(&args, 1)?;
    let execution_id = wa.context().execution_id().to_string();

    match level {
        "debug" => tracing::debug!(user_visible = true, execution_id = %execution_id, "{message}"),
        "warning" => tracing::warn!(user_visible = true, execution_id = %execution_id, "{message}"),
        "error" | "fatal" => {
            tracing::error!(user_visible = true, execution_id = %execution_id, "{message}")
        }
        _ => tracing::info!(user_visible = true, execution_id = %execution_id, "{message}"),
    }
    Ok(())
}

fn host_execute_gql(wa: &mut WasmAdapter<'_>, sig: &Function, args: Vec<Value>) -> Result<u32> {
    ensure_active(wa)?;
    let query = arg_str(&args, 0)?.to_string();
    let variables = arg_str(&args, 1)?.to_string();

    let ctx = wa.context().clone();
    let env = wa.env();
    let response = env
        .graphql
        .execute(&ctx, &query, &variables)
        .map_err(PluginError::Core)?;

    encode_result(wa, sig, &Value::String(response))
}

fn host_fetch(wa: &mut WasmAdapter<'_>, sig: &Function, args: Vec<Value>) -> Result<u32> {
    ensure_active(wa)?;

    let request = args
        .first()
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| PluginError::Marshal("expected request object for httpFetch".to_string()))?;

    let url_str = request
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| PluginError::Http("request is missing a url".to_string()))?;
    let url = reqwest::Url::parse(url_str)
        .map_err(|e| PluginError::Http(format!("invalid url {url_str}: {e}")))?;

    let host = url
        .host_str()
        .ok_or_else(|| PluginError::Http(format!("url {url_str} has no host")))?;

    let settings = wa.env().config.http.clone();
    if !settings.is_host_allowed(host) {
        return Err(PluginError::Http(format!(
            "host {host} is not in the allowed hosts list"
        )));
    }

    let method_name = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("GET");
    let method = reqwest::Method::from_bytes(method_name.as_bytes())
        .map_err(|_| PluginError::Http(format!("invalid method {method_name}")))?;

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .map_err(|e| PluginError::Http(e.to_string()))?;

    let mut builder = client.request(method, url);
    for (name, value) in request_headers(&request) {
        builder = builder.header(name, value);
    }
    if let Some(body) = request.get("body").and_then(Value::as_str) {
        builder = builder.body(body.to_string());
    }

    let response = builder
        .send()
        .map_err(|e| PluginError::Http(e.to_string()))?;
    let status = response.status();

    let headers: Vec<Value> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            json!({
                "name": name.as_str(),
                "value": value.to_str().unwrap_or_default(),
            })
        })
        .collect();

    let body = response
        .text()
        .map_err(|e| PluginError::Http(e.to_string()))?;

    let value = json!({
        "status": status.as_u16(),
        "statusText": status.canonical_reason().unwrap_or_default(),
        "headers": headers,
        "body": body,
    });

    encode_result(wa, sig, &value)
}

fn request_headers(request: &Map<String, Value>) -> Vec<(String, String)> {
    match request.get("headers") {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let entry = item.as_object()?;
                let name = entry.get("name")?.as_str()?;
                let value = entry.get("value")?.as_str()?;
                Some((name.to_string(), value.to_string()))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn host_lookup_model(wa: &mut WasmAdapter<'_>, sig: &Function, args: Vec<Value>) -> Result<u32> {
    let name = arg_str(&args, 0)?;
    let env = wa.env();
    let info = env.models.lookup_model(name).map_err(PluginError::Core)?;
    let value = to_value(&info)?;
    encode_result(wa, sig, &value)
}

fn host_invoke_model(wa: &mut WasmAdapter<'_>, sig: &Function, args: Vec<Value>) -> Result<u32> {
    ensure_active(wa)?;
    let model = arg_str(&args, 0)?.to_string();
    let input = arg_str(&args, 1)?.to_string();

    let ctx = wa.context().clone();
    let env = wa.env();
    let output = env
        .models
        .invoke_model(&ctx, &model, &input)
        .map_err(PluginError::Core)?;

    encode_result(wa, sig, &Value::String(output))
}

fn host_compute_embedding(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    ensure_active(wa)?;
    let model = arg_str(&args, 0)?.to_string();
    let sentences = arg_string_map(&args, 1)?;

    let ctx = wa.context().clone();
    let env = wa.env();
    let embeddings = env
        .models
        .compute_embedding(&ctx, &model, &sentences)
        .map_err(PluginError::Core)?;

    let value = to_value(&embeddings)?;
    encode_result(wa, sig, &value)
}

fn host_invoke_classifier(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    ensure_active(wa)?;
    let model = arg_str(&args, 0)?.to_string();
    let sentences = arg_string_map(&args, 1)?;

    let ctx = wa.context().clone();
    let env = wa.env();
    let labels = env
        .models
        .invoke_classifier(&ctx, &model, &sentences)
        .map_err(PluginError::Core)?;

    let value = to_value(&labels)?;
    encode_result(wa, sig, &value)
}

fn host_invoke_text_generator(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    ensure_active(wa)?;
    let model = arg_str(&args, 0)?.to_string();
    let instruction = arg_str(&args, 1)?.to_string();
    let sentence = arg_str(&args, 2)?.to_string();
    let format = arg_str(&args, 3)?.to_string();

    let ctx = wa.context().clone();
    let env = wa.env();
    let output = env
        .models
        .invoke_text_generator(&ctx, &model, &instruction, &sentence, &format)
        .map_err(PluginError::Core)?;

    encode_result(wa, sig, &Value::String(output))
}

fn host_upsert_to_collection(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    ensure_active(wa)?;
    let collection = arg_str(&args, 0)?.to_string();
    let namespace = arg_str(&args, 1)?.to_string();
    let keys = arg_string_vec(&args, 2)?;
    let texts = arg_string_vec(&args, 3)?;
    let labels = arg_nested_string_vec(&args, 4)?;

    let ctx = wa.context().clone();
    let env = wa.env();
    let result = env
        .collections
        .upsert(&ctx, &collection, &namespace, keys, texts, labels)
        .map_err(PluginError::Core)?;

    let value = to_value(&result)?;
    encode_result(wa, sig, &value)
}

fn host_delete_from_collection(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    ensure_active(wa)?;
    let collection = arg_str(&args, 0)?.to_string();
    let namespace = arg_str(&args, 1)?.to_string();
    let key = arg_str(&args, 2)?.to_string();

    let ctx = wa.context().clone();
    let env = wa.env();
    let result = env
        .collections
        .delete(&ctx, &collection, &namespace, &key)
        .map_err(PluginError::Core)?;

    let value = to_value(&result)?;
    encode_result(wa, sig, &value)
}

fn host_search_collection(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    ensure_active(wa)?;
    let collection = arg_str(&args, 0)?.to_string();
    let namespaces = arg_string_vec(&args, 1)?;
    let method = arg_str(&args, 2)?.to_string();
    let text = arg_str(&args, 3)?.to_string();
    let limit = arg_i32(&args, 4)?;
    let return_text = arg_bool(&args, 5)?;

    let ctx = wa.context().clone();
    let env = wa.env();
    let result = env
        .collections
        .search(
            &ctx,
            &collection,
            namespaces,
            &method,
            &text,
            limit,
            return_text,
        )
        .map_err(PluginError::Core)?;

    let value = to_value(&result)?;
    encode_result(wa, sig, &value)
}

fn host_nn_classify_collection(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    ensure_active(wa)?;
    let collection = arg_str(&args, 0)?.to_string();
    let namespace = arg_str(&args, 1)?.to_string();
    let method = arg_str(&args, 2)?.to_string();
    let text = arg_str(&args, 3)?.to_string();

    let ctx = wa.context().clone();
    let env = wa.env();
    let result = env
        .collections
        .nn_classify(&ctx, &collection, &namespace, &method, &text)
        .map_err(PluginError::Core)?;

    let value = to_value(&result)?;
    encode_result(wa, sig, &value)
}

fn host_compute_distance(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    ensure_active(wa)?;
    let collection = arg_str(&args, 0)?.to_string();
    let namespace = arg_str(&args, 1)?.to_string();
    let method = arg_str(&args, 2)?.to_string();
    let key1 = arg_str(&args, 3)?.to_string();
    let key2 = arg_str(&args, 4)?.to_string();

    let ctx = wa.context().clone();
    let env = wa.env();
    let result = env
        .collections
        .compute_distance(&ctx, &collection, &namespace, &method, &key1, &key2)
        .map_err(PluginError::Core)?;

    let value = to_value(&result)?;
    encode_result(wa, sig, &value)
}

fn host_recompute_search_method(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    ensure_active(wa)?;
    let collection = arg_str(&args, 0)?.to_string();
    let namespace = arg_str(&args, 1)?.to_string();
    let method = arg_str(&args, 2)?.to_string();

    let ctx = wa.context().clone();
    let env = wa.env();
    let result = env
        .collections
        .recompute_search_method(&ctx, &collection, &namespace, &method)
        .map_err(PluginError::Core)?;

    let value = to_value(&result)?;
    encode_result(wa, sig, &value)
}

fn host_get_text_from_collection(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    let collection = arg_str(&args, 0)?.to_string();
    let namespace = arg_str(&args, 1)?.to_string();
    let key = arg_str(&args, 2)?.to_string();

    let ctx = wa.context().clone();
    let env = wa.env();
    let text = env
        .collections
        .get_text(&ctx, &collection, &namespace, &key)
        .map_err(PluginError::Core)?;

    encode_result(wa, sig, &Value::String(text))
}

fn host_get_texts_from_collection(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    let collection = arg_str(&args, 0)?.to_string();
    let namespace = arg_str(&args, 1)?.to_string();

    let ctx = wa.context().clone();
    let env = wa.env();
    let texts = env
        .collections
        .get_texts(&ctx, &collection, &namespace)
        .map_err(PluginError::Core)?;

    let value = to_value(&texts)?;
    encode_result(wa, sig, &value)
}

fn host_get_namespaces_from_collection(
    wa: &mut WasmAdapter<'_>,
    sig: &Function,
    args: Vec<Value>,
) -> Result<u32> {
    let collection = arg_str(&args, 0)?.to_string();

    let ctx = wa.context().clone();
    let env = wa.env();
    let namespaces = env
        .collections
        .list_namespaces(&ctx, &collection)
        .map_err(PluginError::Core)?;

    let value = to_value(&namespaces)?;
    encode_result(wa, sig, &value)
}
