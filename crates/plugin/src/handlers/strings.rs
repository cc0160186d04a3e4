//! Handler for guest strings.
//!
//! Guest strings are UTF-16LE code units; the payload byte length lives in
//! the object header at `ptr - 4`.

use serde_json::Value;

use crate::adapter::{WasmAdapter, STRING_CLASS_ID};
use crate::error::{PluginError, Result};

use super::{expect_str, TypeHandler};

pub struct StringHandler {
    type_name: String,
}

impl StringHandler {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
        }
    }
}

/// Reads the string object at `ptr`.
pub(crate) fn read_string(wa: &mut WasmAdapter<'_>, ptr: u32) -> Result<String> {
    let (_, byte_len) = wa.read_object_header(ptr)?;
    let bytes = wa.read_bytes(ptr, byte_len)?;

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();

    String::from_utf16(&units)
        .map_err(|_| PluginError::Marshal("invalid UTF-16 string data".to_string()))
}

/// Allocates a string object for `s` and returns its pointer. The
/// allocation is pinned into the adapter's current pin frame.
pub(crate) fn write_string(wa: &mut WasmAdapter<'_>, s: &str) -> Result<u32> {
    let mut bytes = Vec::with_capacity(s.len() * 2);
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }

    let ptr = wa.allocate(bytes.len() as u32, STRING_CLASS_ID)?;
    wa.write_bytes(ptr, &bytes)?;
    Ok(ptr)
}

impl TypeHandler for StringHandler {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn decode(&self, wa: &mut WasmAdapter<'_>, words: &[u64]) -> Result<Value> {
        match words {
            [0] => Err(PluginError::NullPointer(self.type_name.clone())),
            [ptr] => Ok(Value::String(read_string(wa, *ptr as u32)?)),
            _ => Err(PluginError::Marshal(format!(
                "expected 1 word decoding {}, got {}",
                self.type_name,
                words.len()
            ))),
        }
    }

    fn encode(&self, wa: &mut WasmAdapter<'_>, value: &Value) -> Result<Vec<u64>> {
        let s = expect_str(value, &self.type_name)?;
        let ptr = write_string(wa, s)?;
        Ok(vec![ptr as u64])
    }
}
