//! Per-type codecs between guest memory and the host's dynamic values.
//!
//! A handler knows four operations: `read`/`write` move a value through a
//! memory slot (a field or array element), while `decode`/`encode` move it
//! through raw invocation words (arguments and results passed by
//! register). For managed types the slot holds a 4-byte pointer and the
//! register holds the pointer itself, so the slot operations default to a
//! pointer hop plus the register operation; primitives override all four.
//!
//! Handlers are selected by type name when a plugin loads and cached in a
//! [`HandlerSet`]; composite handlers resolve their element handlers
//! through the set at call time, so recursive types terminate.

mod arrays;
mod buffers;
mod classes;
mod maps;
mod primitives;
mod strings;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use borealis_core::Metadata;

use crate::adapter::WasmAdapter;
use crate::error::{PluginError, Result};
use crate::typeinfo::TypeInfo;

pub use arrays::ArrayHandler;
pub use buffers::{ArrayBufferHandler, TypedArrayHandler};
pub use classes::{ClassHandler, NullableHandler};
pub use maps::MapHandler;
pub use primitives::PrimitiveHandler;
pub use strings::StringHandler;

/// Codec for one named type.
pub trait TypeHandler: Send + Sync {
    /// The type name this handler was built for.
    fn type_name(&self) -> &str;

    /// Reads a value from a memory slot at `offset`.
    ///
    /// The default is managed-reference semantics: read the pointer stored
    /// in the slot and decode the object it addresses. A null pointer is
    /// an error here; the nullable wrapper intercepts it first.
    fn read(&self, wa: &mut WasmAdapter<'_>, offset: u32) -> Result<Value> {
        let ptr = wa.read_u32(offset)?;
        if ptr == 0 {
            return Err(PluginError::NullPointer(self.type_name().to_string()));
        }
        self.decode(wa, &[ptr as u64])
    }

    /// Writes a value into a memory slot at `offset`.
    ///
    /// The default encodes the value (allocating and pinning in the
    /// caller's open pin frame) and stores the resulting pointer.
    fn write(&self, wa: &mut WasmAdapter<'_>, offset: u32, value: &Value) -> Result<()> {
        let words = self.encode(wa, value)?;
        let word = words.first().ok_or_else(|| {
            PluginError::Marshal(format!("empty encoding for {}", self.type_name()))
        })?;
        wa.write_u32(offset, *word as u32)
    }

    /// Decodes a value passed by register.
    fn decode(&self, wa: &mut WasmAdapter<'_>, words: &[u64]) -> Result<Value>;

    /// Encodes a value to be passed by register. Any guest memory
    /// allocated here is pinned into the adapter's current pin frame.
    fn encode(&self, wa: &mut WasmAdapter<'_>, value: &Value) -> Result<Vec<u64>>;
}

/// The cached handler table of one plugin.
pub struct HandlerSet {
    type_info: Arc<TypeInfo>,
    cache: RwLock<HashMap<String, Arc<dyn TypeHandler>>>,
}

impl HandlerSet {
    /// Creates an empty handler set over the plugin's type info.
    pub fn new(type_info: Arc<TypeInfo>) -> Self {
        Self {
            type_info,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The type info this set resolves against.
    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.type_info
    }

    /// Returns the handler for a type name, building and caching it on
    /// first use.
    pub fn get(&self, name: &str) -> Result<Arc<dyn TypeHandler>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(handler) = cache.get(name) {
                return Ok(handler.clone());
            }
        }

        let handler = self.build(name)?;
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(name.to_string(), handler.clone());
        }
        Ok(handler)
    }

    /// Builds handlers for every type reachable from the plugin's
    /// function signatures, failing the load on unsupported signature
    /// types. Declared types that are not marshalable (internal guest
    /// machinery) are skipped.
    pub fn preload(&self, metadata: &Metadata) -> Result<()> {
        for function in metadata.fn_exports.values().chain(metadata.fn_imports.values()) {
            for param in &function.parameters {
                self.get(&param.type_name)?;
            }
            for result in &function.results {
                self.get(&result.type_name)?;
            }
        }

        for name in metadata.types.keys() {
            let _ = self.get(name);
        }

        Ok(())
    }

    fn build(&self, name: &str) -> Result<Arc<dyn TypeHandler>> {
        let ti = &self.type_info;

        if let Some(underlying) = ti.underlying(name) {
            return Ok(Arc::new(NullableHandler::new(name, underlying)));
        }
        if ti.is_primitive(name) {
            return Ok(Arc::new(PrimitiveHandler::new(name)?));
        }
        if ti.is_string(name) {
            return Ok(Arc::new(StringHandler::new(name)));
        }
        if ti.is_array_buffer(name) {
            return Ok(Arc::new(ArrayBufferHandler::new(name)));
        }
        if let Some(element) = ti.typed_array_element(name) {
            return Ok(Arc::new(TypedArrayHandler::new(
                name,
                element,
                ti.class_id(name),
                ti.clone(),
            )));
        }
        if let Some(element) = ti.array_element(name) {
            return Ok(Arc::new(ArrayHandler::new(
                name,
                element,
                ti.class_id(name),
                ti.clone(),
            )));
        }
        if let Some((key, value)) = ti.map_types(name) {
            return Ok(Arc::new(MapHandler::new(
                name,
                key,
                value,
                ti.class_id(name),
                ti.clone(),
            )));
        }
        if let Some(def) = ti.class(name) {
            return Ok(Arc::new(ClassHandler::new(def.clone(), ti.clone())));
        }

        Err(PluginError::Marshal(format!("unsupported type {name}")))
    }
}

// --- value coercion helpers used across handler families -------------------

pub(crate) fn expect_i64(value: &Value, type_name: &str) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| PluginError::Marshal(format!("expected {type_name}, got {value}")))
}

pub(crate) fn expect_u64(value: &Value, type_name: &str) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| PluginError::Marshal(format!("expected {type_name}, got {value}")))
}

pub(crate) fn expect_f64(value: &Value, type_name: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| PluginError::Marshal(format!("expected {type_name}, got {value}")))
}

pub(crate) fn expect_str<'v>(value: &'v Value, type_name: &str) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| PluginError::Marshal(format!("expected {type_name}, got {value}")))
}

pub(crate) fn float_value(v: f64, type_name: &str) -> Result<Value> {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| PluginError::Marshal(format!("non-finite {type_name} value {v}")))
}
