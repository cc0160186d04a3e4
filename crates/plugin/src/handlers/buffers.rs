//! Handlers for ArrayBuffer and typed-array views.

use std::sync::Arc;

use serde_json::Value;

use crate::adapter::{WasmAdapter, ARRAY_BUFFER_CLASS_ID, TYPED_ARRAY_OBJECT_SIZE};
use crate::error::{PluginError, Result};
use crate::typeinfo::TypeInfo;

use super::TypeHandler;

/// Codec for raw byte buffers. The guest object is the payload itself;
/// its length lives in the header and its class id must be 1.
pub struct ArrayBufferHandler {
    type_name: String,
}

impl ArrayBufferHandler {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
        }
    }

    fn read_buffer(&self, wa: &mut WasmAdapter<'_>, ptr: u32) -> Result<Vec<u8>> {
        let (class_id, byte_len) = wa.read_object_header(ptr)?;
        if class_id != ARRAY_BUFFER_CLASS_ID {
            return Err(PluginError::BadClassId {
                expected: ARRAY_BUFFER_CLASS_ID,
                actual: class_id,
            });
        }
        wa.read_bytes(ptr, byte_len)
    }

    fn write_buffer(&self, wa: &mut WasmAdapter<'_>, bytes: &[u8]) -> Result<u32> {
        let ptr = wa.allocate(bytes.len() as u32, ARRAY_BUFFER_CLASS_ID)?;
        wa.write_bytes(ptr, bytes)?;
        Ok(ptr)
    }
}

fn value_to_bytes(value: &Value, type_name: &str) -> Result<Vec<u8>> {
    match value {
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| {
                        PluginError::Marshal(format!("expected byte value in {type_name}, got {v}"))
                    })
            })
            .collect(),
        other => Err(PluginError::Marshal(format!(
            "value {other} cannot be used as {type_name}"
        ))),
    }
}

fn bytes_to_value(bytes: Vec<u8>) -> Value {
    Value::Array(bytes.into_iter().map(Value::from).collect())
}

impl TypeHandler for ArrayBufferHandler {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn decode(&self, wa: &mut WasmAdapter<'_>, words: &[u64]) -> Result<Value> {
        match words {
            [0] => Err(PluginError::NullPointer(self.type_name.clone())),
            [ptr] => Ok(bytes_to_value(self.read_buffer(wa, *ptr as u32)?)),
            _ => Err(PluginError::Marshal(format!(
                "expected 1 word decoding {}, got {}",
                self.type_name,
                words.len()
            ))),
        }
    }

    fn encode(&self, wa: &mut WasmAdapter<'_>, value: &Value) -> Result<Vec<u64>> {
        let bytes = value_to_bytes(value, &self.type_name)?;
        let ptr = self.write_buffer(wa, &bytes)?;
        Ok(vec![ptr as u64])
    }
}

/// Codec for typed-array views (`Uint8Array`, `Float32Array`, ...). The
/// view object is 12 bytes: backing buffer, data start, byte length.
pub struct TypedArrayHandler {
    type_name: String,
    element: String,
    class_id: Option<u32>,
    type_info: Arc<TypeInfo>,
}

impl TypedArrayHandler {
    pub fn new(
        type_name: &str,
        element: &str,
        class_id: Option<u32>,
        type_info: Arc<TypeInfo>,
    ) -> Self {
        Self {
            type_name: type_name.to_string(),
            element: element.to_string(),
            class_id,
            type_info,
        }
    }
}

impl TypeHandler for TypedArrayHandler {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn decode(&self, wa: &mut WasmAdapter<'_>, words: &[u64]) -> Result<Value> {
        let ptr = match words {
            [0] => return Err(PluginError::NullPointer(self.type_name.clone())),
            [ptr] => *ptr as u32,
            _ => {
                return Err(PluginError::Marshal(format!(
                    "expected 1 word decoding {}, got {}",
                    self.type_name,
                    words.len()
                )))
            }
        };

        let data_start = wa.read_u32(ptr + 4)?;
        let byte_len = wa.read_u32(ptr + 8)?;

        let elem_size = self.type_info.size_of(&self.element);
        let len = byte_len / elem_size;

        let handler = wa.handlers().get(&self.element)?;
        let mut items = Vec::with_capacity(len as usize);
        for i in 0..len {
            items.push(handler.read(wa, data_start + i * elem_size)?);
        }
        Ok(Value::Array(items))
    }

    fn encode(&self, wa: &mut WasmAdapter<'_>, value: &Value) -> Result<Vec<u64>> {
        let items = value.as_array().ok_or_else(|| {
            PluginError::Marshal(format!("expected array for {}, got {value}", self.type_name))
        })?;

        let class_id = self.class_id.ok_or_else(|| {
            PluginError::Marshal(format!("plugin does not declare type {}", self.type_name))
        })?;

        let elem_size = self.type_info.size_of(&self.element);
        let byte_len = elem_size * items.len() as u32;

        let mut buffer = 0u32;
        if !items.is_empty() {
            buffer = wa.allocate(byte_len, ARRAY_BUFFER_CLASS_ID)?;
            let handler = wa.handlers().get(&self.element)?;
            for (i, item) in items.iter().enumerate() {
                handler.write(wa, buffer + i as u32 * elem_size, item)?;
            }
        }

        let ptr = wa.allocate(TYPED_ARRAY_OBJECT_SIZE, class_id)?;
        wa.write_u32(ptr, buffer)?;
        wa.write_u32(ptr + 4, buffer)?;
        wa.write_u32(ptr + 8, byte_len)?;

        Ok(vec![ptr as u64])
    }
}
