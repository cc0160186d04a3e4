//! Handler for guest maps.
//!
//! The map object is 24 bytes: buckets buffer, buckets mask, entries
//! buffer, entries capacity, entries offset (used slots, including
//! deleted), entries count (live slots). Entries are fixed-size records
//! `{key, value, taggedNext}` laid out with natural alignment; bit 0 of
//! `taggedNext` marks a deleted slot. Reading walks the entries buffer,
//! which is valid for any map at rest; writing rebuilds both buffers and
//! chains buckets with a 32-bit FNV-1a hash of the key bytes.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::adapter::{WasmAdapter, ARRAY_BUFFER_CLASS_ID};
use crate::error::{PluginError, Result};
use crate::typeinfo::{align_offset, TypeInfo};

use super::TypeHandler;

const ENTRY_DELETED: u32 = 1;
const INITIAL_BUCKETS: u32 = 4;
const FILL_FACTOR_N: u32 = 8;
const FILL_FACTOR_D: u32 = 3;
const MAP_OBJECT_SIZE: u32 = 24;

pub struct MapHandler {
    type_name: String,
    key: String,
    value: String,
    class_id: Option<u32>,
    type_info: Arc<TypeInfo>,
}

/// Byte offsets of one entry record.
struct EntryLayout {
    key: u32,
    value: u32,
    tagged_next: u32,
    size: u32,
}

impl MapHandler {
    pub fn new(
        type_name: &str,
        key: &str,
        value: &str,
        class_id: Option<u32>,
        type_info: Arc<TypeInfo>,
    ) -> Self {
        Self {
            type_name: type_name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            class_id,
            type_info,
        }
    }

    fn entry_layout(&self) -> EntryLayout {
        let key_size = self.type_info.size_of(&self.key);
        let value_size = self.type_info.size_of(&self.value);

        let key = 0;
        let value = align_offset(key + key_size, value_size);
        let tagged_next = align_offset(value + value_size, 4);

        let max_align = key_size.max(value_size).max(4);
        let size = align_offset(tagged_next + 4, max_align);

        EntryLayout {
            key,
            value,
            tagged_next,
            size,
        }
    }

    fn entries(&self, wa: &mut WasmAdapter<'_>, ptr: u32) -> Result<Vec<(Value, Value)>> {
        let entries_ptr = wa.read_u32(ptr + 8)?;
        let entries_offset = wa.read_u32(ptr + 16)?;

        let layout = self.entry_layout();
        let key_handler = wa.handlers().get(&self.key)?;
        let value_handler = wa.handlers().get(&self.value)?;

        let mut pairs = Vec::new();
        for i in 0..entries_offset {
            let base = entries_ptr + i * layout.size;
            let tagged = wa.read_u32(base + layout.tagged_next)?;
            if tagged & ENTRY_DELETED != 0 {
                continue;
            }
            let key = key_handler.read(wa, base + layout.key)?;
            let value = value_handler.read(wa, base + layout.value)?;
            pairs.push((key, value));
        }
        Ok(pairs)
    }

    fn pairs_from_value(&self, value: &Value) -> Result<Vec<(Value, Value)>> {
        match value {
            Value::Object(map) => Ok(map
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect()),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    let entry = item.as_object().ok_or_else(|| {
                        PluginError::Marshal(format!(
                            "expected {{key, value}} entries for {}",
                            self.type_name
                        ))
                    })?;
                    let key = entry.get("key").cloned().ok_or_else(|| {
                        PluginError::Marshal(format!("map entry missing key in {}", self.type_name))
                    })?;
                    let value = entry.get("value").cloned().unwrap_or(Value::Null);
                    Ok((key, value))
                })
                .collect(),
            other => Err(PluginError::Marshal(format!(
                "expected object or entry array for {}, got {other}",
                self.type_name
            ))),
        }
    }

    fn hash_key(&self, key: &Value) -> Result<u32> {
        let ti = &self.type_info;

        if ti.is_string(&self.key) {
            let s = key.as_str().ok_or_else(|| {
                PluginError::Marshal(format!("expected string key for {}", self.type_name))
            })?;
            let mut bytes = Vec::with_capacity(s.len() * 2);
            for unit in s.encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            return Ok(fnv1a(&bytes));
        }

        if ti.is_integer(&self.key) || self.key == "bool" {
            let raw = if ti.is_signed(&self.key) {
                key.as_i64().ok_or_else(|| {
                    PluginError::Marshal(format!("expected integer key for {}", self.type_name))
                })? as u64
            } else {
                key.as_u64().ok_or_else(|| {
                    PluginError::Marshal(format!("expected integer key for {}", self.type_name))
                })?
            };
            let width = ti.size_of(&self.key) as usize;
            return Ok(fnv1a(&raw.to_le_bytes()[..width]));
        }

        if ti.is_float(&self.key) {
            let v = key.as_f64().ok_or_else(|| {
                PluginError::Marshal(format!("expected float key for {}", self.type_name))
            })?;
            let bytes = if self.key == "f32" {
                (v as f32).to_bits().to_le_bytes().to_vec()
            } else {
                v.to_bits().to_le_bytes().to_vec()
            };
            return Ok(fnv1a(&bytes));
        }

        Err(PluginError::Marshal(format!(
            "unsupported map key type {}",
            self.key
        )))
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash
}

impl TypeHandler for MapHandler {
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

        let pairs = self.entries(wa, ptr)?;

        // string-keyed maps surface as objects; everything else keeps its
        // entries explicit
        if self.type_info.is_string(&self.key) {
            let mut map = Map::new();
            for (key, value) in pairs {
                let key = key
                    .as_str()
                    .ok_or_else(|| {
                        PluginError::Marshal(format!("non-string key in {}", self.type_name))
                    })?
                    .to_string();
                map.insert(key, value);
            }
            Ok(Value::Object(map))
        } else {
            let entries = pairs
                .into_iter()
                .map(|(key, value)| {
                    let mut entry = Map::new();
                    entry.insert("key".to_string(), key);
                    entry.insert("value".to_string(), value);
                    Value::Object(entry)
                })
                .collect();
            Ok(Value::Array(entries))
        }
    }

    fn encode(&self, wa: &mut WasmAdapter<'_>, value: &Value) -> Result<Vec<u64>> {
        let class_id = self.class_id.ok_or_else(|| {
            PluginError::Marshal(format!("plugin does not declare type {}", self.type_name))
        })?;

        let pairs = self.pairs_from_value(value)?;
        let count = pairs.len() as u32;

        let mut buckets_count = INITIAL_BUCKETS;
        while buckets_count * FILL_FACTOR_N / FILL_FACTOR_D < count {
            buckets_count *= 2;
        }
        let buckets_mask = buckets_count - 1;
        let entries_capacity = buckets_count * FILL_FACTOR_N / FILL_FACTOR_D;

        let layout = self.entry_layout();

        let buckets_ptr = wa.allocate(buckets_count * 4, ARRAY_BUFFER_CLASS_ID)?;
        wa.write_bytes(buckets_ptr, &vec![0u8; (buckets_count * 4) as usize])?;

        let entries_ptr = wa.allocate(entries_capacity * layout.size, ARRAY_BUFFER_CLASS_ID)?;
        wa.write_bytes(
            entries_ptr,
            &vec![0u8; (entries_capacity * layout.size) as usize],
        )?;

        let key_handler = wa.handlers().get(&self.key)?;
        let value_handler = wa.handlers().get(&self.value)?;

        for (i, (key, val)) in pairs.iter().enumerate() {
            let base = entries_ptr + i as u32 * layout.size;
            key_handler.write(wa, base + layout.key, key)?;
            value_handler.write(wa, base + layout.value, val)?;

            // chain into the bucket for this key's hash
            let bucket = buckets_ptr + (self.hash_key(key)? & buckets_mask) * 4;
            let prev = wa.read_u32(bucket)?;
            wa.write_u32(base + layout.tagged_next, prev)?;
            wa.write_u32(bucket, base)?;
        }

        let ptr = wa.allocate(MAP_OBJECT_SIZE, class_id)?;
        wa.write_u32(ptr, buckets_ptr)?;
        wa.write_u32(ptr + 4, buckets_mask)?;
        wa.write_u32(ptr + 8, entries_ptr)?;
        wa.write_u32(ptr + 12, entries_capacity)?;
        wa.write_u32(ptr + 16, count)?;
        wa.write_u32(ptr + 20, count)?;

        Ok(vec![ptr as u64])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_reference_values() {
        // standard FNV-1a test vectors
        assert_eq!(fnv1a(b""), 0x811c9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c292c);
    }
}
