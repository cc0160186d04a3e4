//! Type info registry: pure functions over the plugin SDK's type-name
//! grammar.
//!
//! Type names follow the source SDK: primitives (`bool`, `i8`..`i64`,
//! `u8`..`u64`, `f32`, `f64`), `string`, arrays `T[]`, nullables
//! `T | null`, `Map<K,V>`, `ArrayBuffer`, typed arrays (`Uint8Array`,
//! `Float32Array`, ...), and class names resolved against the plugin's
//! type table. Managed values are stored as 4-byte pointers into the guest
//! heap; primitives are stored inline at their natural width.

use std::sync::Arc;

use borealis_core::{Metadata, TypeDefinition};

/// Per-plugin type information, built once at plugin load.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    metadata: Arc<Metadata>,
}

impl TypeInfo {
    /// Creates type info over a plugin's metadata.
    pub fn new(metadata: Arc<Metadata>) -> Self {
        Self { metadata }
    }

    /// Size in bytes of a value of the named type, as stored in guest
    /// memory. Managed references are 4-byte pointers.
    pub fn size_of(&self, name: &str) -> u32 {
        match name {
            "bool" | "i8" | "u8" => 1,
            "i16" | "u16" => 2,
            "i32" | "u32" | "f32" => 4,
            "i64" | "u64" | "f64" => 8,
            _ => 4,
        }
    }

    /// Natural alignment of the named type. Equal to the size for
    /// primitives; managed references align like the pointers they are.
    pub fn alignment_of(&self, name: &str) -> u32 {
        if self.is_primitive(name) {
            self.size_of(name)
        } else {
            4
        }
    }

    /// Whether the named type is a primitive.
    pub fn is_primitive(&self, name: &str) -> bool {
        matches!(
            name,
            "bool"
                | "i8"
                | "i16"
                | "i32"
                | "i64"
                | "u8"
                | "u16"
                | "u32"
                | "u64"
                | "f32"
                | "f64"
        )
    }

    /// Whether the named type is a string.
    pub fn is_string(&self, name: &str) -> bool {
        name == "string"
    }

    /// Whether the named type is a floating-point primitive.
    pub fn is_float(&self, name: &str) -> bool {
        matches!(name, "f32" | "f64")
    }

    /// Whether the named type is an integer primitive.
    pub fn is_integer(&self, name: &str) -> bool {
        matches!(
            name,
            "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64"
        )
    }

    /// Whether the named type is a signed integer primitive.
    pub fn is_signed(&self, name: &str) -> bool {
        matches!(name, "i8" | "i16" | "i32" | "i64")
    }

    /// Whether the named type is a dynamic array (`T[]`).
    pub fn is_array(&self, name: &str) -> bool {
        name.ends_with("[]")
    }

    /// Element type of a dynamic array, if the name denotes one.
    pub fn array_element<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_suffix("[]")
    }

    /// Whether the named type is syntactically nullable (`T | null`).
    pub fn is_nullable(&self, name: &str) -> bool {
        name.trim_end().ends_with("| null")
    }

    /// The underlying type of a nullable, if the name denotes one.
    pub fn underlying<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.trim_end()
            .strip_suffix("| null")
            .map(|t| t.trim_end())
    }

    /// Whether the named type is `ArrayBuffer`.
    pub fn is_array_buffer(&self, name: &str) -> bool {
        name == "ArrayBuffer"
    }

    /// Element type of a typed-array view, if the name denotes one.
    pub fn typed_array_element(&self, name: &str) -> Option<&'static str> {
        match name {
            "Int8Array" => Some("i8"),
            "Int16Array" => Some("i16"),
            "Int32Array" => Some("i32"),
            "Int64Array" => Some("i64"),
            "Uint8Array" => Some("u8"),
            "Uint16Array" => Some("u16"),
            "Uint32Array" => Some("u32"),
            "Uint64Array" => Some("u64"),
            "Float32Array" => Some("f32"),
            "Float64Array" => Some("f64"),
            _ => None,
        }
    }

    /// Key and value types of a map, if the name denotes one.
    pub fn map_types<'a>(&self, name: &'a str) -> Option<(&'a str, &'a str)> {
        let inner = name.strip_prefix("Map<")?.strip_suffix('>')?;

        // split on the first comma at angle-bracket depth zero
        let mut depth = 0usize;
        for (i, c) in inner.char_indices() {
            match c {
                '<' => depth += 1,
                '>' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    return Some((inner[..i].trim(), inner[i + 1..].trim()));
                }
                _ => {}
            }
        }
        None
    }

    /// Looks up a class/record definition in the plugin's type table.
    pub fn class(&self, name: &str) -> Option<&TypeDefinition> {
        self.metadata.types.get(name)
    }

    /// Class id of the named type, if the plugin declares it.
    pub fn class_id(&self, name: &str) -> Option<u32> {
        self.metadata.types.get(name).map(|t| t.id)
    }

    /// The plugin metadata this registry was built from.
    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }
}

/// Advances `offset` to the alignment required by a field of `size` bytes.
pub fn align_offset(offset: u32, size: u32) -> u32 {
    if size == 0 {
        return offset;
    }
    let mask = size - 1;
    if offset & mask != 0 {
        (offset | mask) + 1
    } else {
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use borealis_core::Metadata;

    fn type_info() -> TypeInfo {
        let meta = Metadata::from_json(
            r#"{
                "plugin": "test",
                "types": {
                    "Person": {"id": 9, "name": "Person", "fields": [
                        {"name": "name", "type": "string"},
                        {"name": "age", "type": "i32"}
                    ]},
                    "string[]": {"id": 4, "name": "string[]"}
                }
            }"#,
        )
        .unwrap();
        TypeInfo::new(Arc::new(meta))
    }

    #[test]
    fn test_sizes_and_alignment() {
        let ti = type_info();
        assert_eq!(ti.size_of("bool"), 1);
        assert_eq!(ti.size_of("u16"), 2);
        assert_eq!(ti.size_of("f32"), 4);
        assert_eq!(ti.size_of("i64"), 8);
        // managed references are pointers
        assert_eq!(ti.size_of("string"), 4);
        assert_eq!(ti.size_of("Person"), 4);

        assert_eq!(ti.alignment_of("f64"), 8);
        assert_eq!(ti.alignment_of("string"), 4);
    }

    #[test]
    fn test_array_and_nullable_parsing() {
        let ti = type_info();
        assert!(ti.is_array("string[]"));
        assert_eq!(ti.array_element("f32[][]"), Some("f32[]"));

        assert!(ti.is_nullable("Person | null"));
        assert_eq!(ti.underlying("Person | null"), Some("Person"));
        assert_eq!(ti.underlying("string[] | null"), Some("string[]"));
        assert!(!ti.is_nullable("string"));
    }

    #[test]
    fn test_map_parsing() {
        let ti = type_info();
        assert_eq!(ti.map_types("Map<string,string>"), Some(("string", "string")));
        assert_eq!(
            ti.map_types("Map<string, Map<string,f64>>"),
            Some(("string", "Map<string,f64>"))
        );
        assert!(ti.map_types("string[]").is_none());
    }

    #[test]
    fn test_typed_arrays() {
        let ti = type_info();
        assert_eq!(ti.typed_array_element("Uint8Array"), Some("u8"));
        assert_eq!(ti.typed_array_element("Float32Array"), Some("f32"));
        assert!(ti.typed_array_element("Array").is_none());
    }

    #[test]
    fn test_class_lookup() {
        let ti = type_info();
        assert_eq!(ti.class("Person").unwrap().fields.len(), 2);
        assert_eq!(ti.class_id("string[]"), Some(4));
        assert!(ti.class("Unknown").is_none());
    }

    #[test]
    fn test_align_offset() {
        assert_eq!(align_offset(0, 4), 0);
        assert_eq!(align_offset(1, 4), 4);
        assert_eq!(align_offset(4, 8), 8);
        assert_eq!(align_offset(8, 8), 8);
        assert_eq!(align_offset(5, 1), 5);
    }
}
