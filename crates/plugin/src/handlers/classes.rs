//! Handlers for class/record types and the nullable wrapper.

use std::sync::Arc;

use serde_json::{Map, Value};

use borealis_core::TypeDefinition;

use crate::adapter::WasmAdapter;
use crate::error::{PluginError, Result};
use crate::typeinfo::{align_offset, TypeInfo};

use super::TypeHandler;

/// Codec for a class/record declared in the plugin's type table. Fields
/// are packed in declaration order, each padded to its own size.
pub struct ClassHandler {
    def: TypeDefinition,
    type_info: Arc<TypeInfo>,
}

impl ClassHandler {
    pub fn new(def: TypeDefinition, type_info: Arc<TypeInfo>) -> Self {
        Self { def, type_info }
    }

    fn payload_size(&self) -> u32 {
        let mut offset = 0u32;
        for field in &self.def.fields {
            let size = self.type_info.size_of(&field.type_name);
            offset = align_offset(offset, size) + size;
        }
        offset
    }
}

impl TypeHandler for ClassHandler {
    fn type_name(&self) -> &str {
        &self.def.name
    }

    fn decode(&self, wa: &mut WasmAdapter<'_>, words: &[u64]) -> Result<Value> {
        let ptr = match words {
            [0] => return Err(PluginError::NullPointer(self.def.name.clone())),
            [ptr] => *ptr as u32,
            _ => {
                return Err(PluginError::Marshal(format!(
                    "expected 1 word decoding {}, got {}",
                    self.def.name,
                    words.len()
                )))
            }
        };

        let handlers = wa.handlers();
        let mut data = Map::new();
        let mut offset = 0u32;
        for field in &self.def.fields {
            let size = self.type_info.size_of(&field.type_name);
            offset = align_offset(offset, size);

            let handler = handlers.get(&field.type_name)?;
            let value = handler.read(wa, ptr + offset)?;
            data.insert(field.name.clone(), value);

            offset += size;
        }
        Ok(Value::Object(data))
    }

    fn encode(&self, wa: &mut WasmAdapter<'_>, value: &Value) -> Result<Vec<u64>> {
        let data = value.as_object().ok_or_else(|| {
            PluginError::Marshal(format!("expected object for {}, got {value}", self.def.name))
        })?;

        // The object is allocated and pinned before any field is written,
        // so child allocations cannot move or reclaim it.
        let ptr = wa.allocate(self.payload_size(), self.def.id)?;

        let handlers = wa.handlers();
        let mut offset = 0u32;
        for field in &self.def.fields {
            let size = self.type_info.size_of(&field.type_name);
            offset = align_offset(offset, size);

            let field_value = lookup_field(data, &field.name);
            let handler = handlers.get(&field.type_name)?;
            handler.write(wa, ptr + offset, field_value)?;

            offset += size;
        }

        Ok(vec![ptr as u64])
    }
}

/// Field lookup is case-sensitive first, so callers control casing, with a
/// case-insensitive fallback for host-built payloads.
fn lookup_field<'m>(data: &'m Map<String, Value>, name: &str) -> &'m Value {
    if let Some(value) = data.get(name) {
        return value;
    }
    data.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
        .unwrap_or(&Value::Null)
}

/// Wrapper for `T | null`: a zero pointer decodes to null, and null
/// encodes to a zero pointer; anything else defers to the underlying
/// handler.
pub struct NullableHandler {
    type_name: String,
    underlying: String,
}

impl NullableHandler {
    pub fn new(type_name: &str, underlying: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            underlying: underlying.to_string(),
        }
    }
}

impl TypeHandler for NullableHandler {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    // The managed-reference defaults reject a zero pointer before decode
    // runs, so the null checks happen here for slot access too: class
    // fields, array elements, and map entries of nullable type.

    fn read(&self, wa: &mut WasmAdapter<'_>, offset: u32) -> Result<Value> {
        let ptr = wa.read_u32(offset)?;
        if ptr == 0 {
            return Ok(Value::Null);
        }
        let handler = wa.handlers().get(&self.underlying)?;
        handler.decode(wa, &[ptr as u64])
    }

    fn write(&self, wa: &mut WasmAdapter<'_>, offset: u32, value: &Value) -> Result<()> {
        if value.is_null() {
            return wa.write_u32(offset, 0);
        }
        let handler = wa.handlers().get(&self.underlying)?;
        handler.write(wa, offset, value)
    }

    fn decode(&self, wa: &mut WasmAdapter<'_>, words: &[u64]) -> Result<Value> {
        match words {
            [0] => Ok(Value::Null),
            _ => {
                let handler = wa.handlers().get(&self.underlying)?;
                handler.decode(wa, words)
            }
        }
    }

    fn encode(&self, wa: &mut WasmAdapter<'_>, value: &Value) -> Result<Vec<u64>> {
        if value.is_null() {
            return Ok(vec![0]);
        }
        let handler = wa.handlers().get(&self.underlying)?;
        handler.encode(wa, value)
    }
}
