//! Handler for dynamic arrays.
//!
//! An array object is a 16-byte struct: backing buffer pointer, data start
//! pointer, byte length, and element count, all little-endian u32. Empty
//! arrays may have no backing buffer.

use std::sync::Arc;

use serde_json::Value;

use crate::adapter::{WasmAdapter, ARRAY_BUFFER_CLASS_ID, ARRAY_OBJECT_SIZE};
use crate::error::{PluginError, Result};
use crate::typeinfo::TypeInfo;

use super::TypeHandler;

pub struct ArrayHandler {
    type_name: String,
    element: String,
    class_id: Option<u32>,
    type_info: Arc<TypeInfo>,
}

impl ArrayHandler {
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

impl TypeHandler for ArrayHandler {
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
        let len = wa.read_u32(ptr + 12)?;

        let elem_size = self.type_info.size_of(&self.element);
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
        let len = items.len() as u32;
        let byte_len = elem_size * len;

        // The backing buffer is written and pinned before the array object
        // is allocated; an empty array has no buffer at all.
        let mut buffer = 0u32;
        if !items.is_empty() {
            buffer = wa.allocate(byte_len, ARRAY_BUFFER_CLASS_ID)?;
            let handler = wa.handlers().get(&self.element)?;
            for (i, item) in items.iter().enumerate() {
                handler.write(wa, buffer + i as u32 * elem_size, item)?;
            }
        }

        let ptr = wa.allocate(ARRAY_OBJECT_SIZE, class_id)?;
        wa.write_u32(ptr, buffer)?;
        wa.write_u32(ptr + 4, buffer)?;
        wa.write_u32(ptr + 8, byte_len)?;
        wa.write_u32(ptr + 12, len)?;

        Ok(vec![ptr as u64])
    }
}
