//! Handlers for primitive types.

use serde_json::Value;

use crate::adapter::WasmAdapter;
use crate::error::{PluginError, Result};

use super::{expect_f64, expect_i64, expect_u64, float_value, TypeHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrimitiveKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

/// Codec for a single primitive type, stored inline at its natural width.
pub struct PrimitiveHandler {
    type_name: String,
    kind: PrimitiveKind,
}

impl PrimitiveHandler {
    pub fn new(type_name: &str) -> Result<Self> {
        let kind = match type_name {
            "bool" => PrimitiveKind::Bool,
            "i8" => PrimitiveKind::I8,
            "i16" => PrimitiveKind::I16,
            "i32" => PrimitiveKind::I32,
            "i64" => PrimitiveKind::I64,
            "u8" => PrimitiveKind::U8,
            "u16" => PrimitiveKind::U16,
            "u32" => PrimitiveKind::U32,
            "u64" => PrimitiveKind::U64,
            "f32" => PrimitiveKind::F32,
            "f64" => PrimitiveKind::F64,
            other => {
                return Err(PluginError::Marshal(format!(
                    "{other} is not a primitive type"
                )))
            }
        };

        Ok(Self {
            type_name: type_name.to_string(),
            kind,
        })
    }

    fn to_word(&self, value: &Value) -> Result<u64> {
        let name = &self.type_name;
        let word = match self.kind {
            PrimitiveKind::Bool => match value {
                Value::Bool(b) => u64::from(*b),
                other => {
                    return Err(PluginError::Marshal(format!("expected bool, got {other}")))
                }
            },
            PrimitiveKind::I8 => int_word::<i8>(value, name)? as u8 as u64,
            PrimitiveKind::I16 => int_word::<i16>(value, name)? as u16 as u64,
            PrimitiveKind::I32 => int_word::<i32>(value, name)? as u32 as u64,
            PrimitiveKind::I64 => expect_i64(value, name)? as u64,
            PrimitiveKind::U8 => uint_word::<u8>(value, name)? as u64,
            PrimitiveKind::U16 => uint_word::<u16>(value, name)? as u64,
            PrimitiveKind::U32 => uint_word::<u32>(value, name)? as u64,
            PrimitiveKind::U64 => expect_u64(value, name)?,
            PrimitiveKind::F32 => (expect_f64(value, name)? as f32).to_bits() as u64,
            PrimitiveKind::F64 => expect_f64(value, name)?.to_bits(),
        };
        Ok(word)
    }

    fn from_word(&self, word: u64) -> Result<Value> {
        let value = match self.kind {
            PrimitiveKind::Bool => Value::Bool(word & 0xFF != 0),
            PrimitiveKind::I8 => Value::from(word as u8 as i8),
            PrimitiveKind::I16 => Value::from(word as u16 as i16),
            PrimitiveKind::I32 => Value::from(word as u32 as i32),
            PrimitiveKind::I64 => Value::from(word as i64),
            PrimitiveKind::U8 => Value::from(word as u8),
            PrimitiveKind::U16 => Value::from(word as u16),
            PrimitiveKind::U32 => Value::from(word as u32),
            PrimitiveKind::U64 => Value::from(word),
            PrimitiveKind::F32 => {
                return float_value(f32::from_bits(word as u32) as f64, &self.type_name)
            }
            PrimitiveKind::F64 => return float_value(f64::from_bits(word), &self.type_name),
        };
        Ok(value)
    }
}

fn int_word<T>(value: &Value, type_name: &str) -> Result<T>
where
    T: TryFrom<i64>,
{
    let v = expect_i64(value, type_name)?;
    T::try_from(v)
        .map_err(|_| PluginError::Marshal(format!("value {v} out of range for {type_name}")))
}

fn uint_word<T>(value: &Value, type_name: &str) -> Result<T>
where
    T: TryFrom<u64>,
{
    let v = expect_u64(value, type_name)?;
    T::try_from(v)
        .map_err(|_| PluginError::Marshal(format!("value {v} out of range for {type_name}")))
}

impl TypeHandler for PrimitiveHandler {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn read(&self, wa: &mut WasmAdapter<'_>, offset: u32) -> Result<Value> {
        let word = match self.kind {
            PrimitiveKind::Bool | PrimitiveKind::I8 | PrimitiveKind::U8 => {
                wa.read_u8(offset)? as u64
            }
            PrimitiveKind::I16 | PrimitiveKind::U16 => wa.read_u16(offset)? as u64,
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => {
                wa.read_u32(offset)? as u64
            }
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => wa.read_u64(offset)?,
        };
        self.from_word(word)
    }

    fn write(&self, wa: &mut WasmAdapter<'_>, offset: u32, value: &Value) -> Result<()> {
        let word = self.to_word(value)?;
        match self.kind {
            PrimitiveKind::Bool | PrimitiveKind::I8 | PrimitiveKind::U8 => {
                wa.write_u8(offset, word as u8)
            }
            PrimitiveKind::I16 | PrimitiveKind::U16 => wa.write_u16(offset, word as u16),
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => {
                wa.write_u32(offset, word as u32)
            }
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => {
                wa.write_u64(offset, word)
            }
        }
    }

    fn decode(&self, _wa: &mut WasmAdapter<'_>, words: &[u64]) -> Result<Value> {
        match words {
            [word] => self.from_word(*word),
            _ => Err(PluginError::Marshal(format!(
                "expected 1 word decoding {}, got {}",
                self.type_name,
                words.len()
            ))),
        }
    }

    fn encode(&self, _wa: &mut WasmAdapter<'_>, value: &Value) -> Result<Vec<u64>> {
        Ok(vec![self.to_word(value)?])
    }
}
