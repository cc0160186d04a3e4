//! Plugin metadata: exported functions, imported host functions, and type
//! definitions.
//!
//! Metadata ships alongside the compiled WASM bytecode as a JSON document
//! (`metadata.json` next to `plugin.wasm`). It is immutable after load and
//! drives both function dispatch and memory marshaling: type definitions
//! carry the class id the guest allocator stamps into object headers, and
//! the import table carries full signatures so host functions can marshal
//! their arguments through the same type handlers as exported functions.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Map of function name to function signature.
pub type FunctionMap = HashMap<String, Function>;

/// Map of type name to type definition.
pub type TypeMap = HashMap<String, TypeDefinition>;

/// Metadata describing a loaded plugin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Plugin name.
    pub plugin: String,

    /// SDK the plugin was built with.
    #[serde(default)]
    pub sdk: String,

    /// Unique build identifier.
    #[serde(default)]
    pub build_id: String,

    /// Build timestamp (RFC 3339).
    #[serde(default)]
    pub build_time: String,

    /// Source repository, if recorded by the build.
    #[serde(default)]
    pub git_repo: Option<String>,

    /// Source commit, if recorded by the build.
    #[serde(default)]
    pub git_commit: Option<String>,

    /// Functions the plugin exports, by name.
    #[serde(default)]
    pub fn_exports: FunctionMap,

    /// Host functions the plugin imports, keyed `module.function`.
    #[serde(default)]
    pub fn_imports: FunctionMap,

    /// Type definitions, by type name.
    #[serde(default)]
    pub types: TypeMap,
}

/// Signature of a guest-exported or host-imported function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Function {
    /// Function name.
    pub name: String,

    /// Parameters, in declaration order.
    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Results. Empty for void functions; at most one entry today.
    #[serde(default)]
    pub results: Vec<ResultDef>,
}

/// A single function parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name, matched against the invocation's named data.
    pub name: String,

    /// Type name, resolved against the type info registry.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Default value used when the invocation omits the parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// A single function result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDef {
    /// Type name, resolved against the type info registry.
    #[serde(rename = "type")]
    pub type_name: String,
}

/// A class/record type declared by the plugin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Class id the guest allocator uses for this type.
    pub id: u32,

    /// Type name.
    pub name: String,

    /// Fields, in declaration order.
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A field of a class/record type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// Field name.
    pub name: String,

    /// Type name.
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Metadata {
    /// Loads metadata from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses metadata from a JSON string.
    ///
    /// Accepts both the current layout and the legacy layout (a flat
    /// `functions` list with a single `returnType`), converting the latter
    /// on the fly.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| CoreError::Metadata(e.to_string()))?;

        if value.get("functions").is_some() {
            let legacy: LegacyMetadata =
                serde_json::from_value(value).map_err(|e| CoreError::Metadata(e.to_string()))?;
            return Ok(legacy.upgrade());
        }

        serde_json::from_value(value).map_err(|e| CoreError::Metadata(e.to_string()))
    }

    /// Looks up an exported function by name.
    pub fn export(&self, name: &str) -> Option<&Function> {
        self.fn_exports.get(name)
    }

    /// Looks up an imported host function by its `module.function` key.
    pub fn import(&self, key: &str) -> Option<&Function> {
        self.fn_imports.get(key)
    }

    /// Looks up a type definition by name.
    pub fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }
}

impl Function {
    /// Creates a function signature with no parameters or results.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            results: Vec::new(),
        }
    }
}

/// Legacy metadata layout, produced by SDKs before the import table was
/// introduced.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyMetadata {
    plugin: String,

    #[serde(default)]
    sdk: String,

    /// Deprecated predecessor of `sdk`.
    #[serde(default)]
    library: String,

    #[serde(default)]
    build_id: String,

    #[serde(default)]
    build_time: String,

    #[serde(default)]
    git_repo: Option<String>,

    #[serde(default)]
    git_commit: Option<String>,

    #[serde(default)]
    functions: Vec<LegacyFunction>,

    #[serde(default)]
    types: Vec<LegacyType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyFunction {
    name: String,

    #[serde(default)]
    parameters: Vec<LegacyParameter>,

    #[serde(default)]
    return_type: LegacyTypeRef,
}

#[derive(Debug, Deserialize)]
struct LegacyParameter {
    name: String,

    #[serde(rename = "type")]
    type_ref: LegacyTypeRef,

    #[serde(default)]
    default: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyTypeRef {
    #[serde(default)]
    name: String,

    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct LegacyType {
    id: u32,

    #[serde(default)]
    name: String,

    #[serde(default)]
    path: String,

    #[serde(default)]
    fields: Vec<LegacyField>,
}

#[derive(Debug, Deserialize)]
struct LegacyField {
    name: String,

    #[serde(rename = "type")]
    type_ref: LegacyTypeRef,
}

impl LegacyTypeRef {
    /// The legacy layout stored both a short name and a full path; the
    /// path wins when present.
    fn resolve(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else {
            self.path.clone()
        }
    }
}

impl LegacyMetadata {
    fn upgrade(self) -> Metadata {
        // The deprecated "library" field carried the SDK name with a scope
        // prefix.
        let sdk = if self.sdk.is_empty() {
            self.library
                .strip_prefix("@borealis/")
                .unwrap_or(&self.library)
                .to_string()
        } else {
            self.sdk
        };

        let mut fn_exports = FunctionMap::with_capacity(self.functions.len());
        for f in self.functions {
            let parameters = f
                .parameters
                .into_iter()
                .map(|p| Parameter {
                    name: p.name,
                    type_name: p.type_ref.resolve(),
                    default: p.default,
                })
                .collect();

            let results = if f.return_type.name.is_empty() || f.return_type.name == "void" {
                Vec::new()
            } else {
                vec![ResultDef {
                    type_name: f.return_type.resolve(),
                }]
            };

            fn_exports.insert(
                f.name.clone(),
                Function {
                    name: f.name,
                    parameters,
                    results,
                },
            );
        }

        let mut types = TypeMap::with_capacity(self.types.len());
        for t in self.types {
            let name = if t.path.is_empty() { t.name } else { t.path };
            let fields = t
                .fields
                .into_iter()
                .map(|f| Field {
                    name: f.name,
                    type_name: f.type_ref.resolve(),
                })
                .collect();

            types.insert(
                name.clone(),
                TypeDefinition {
                    id: t.id,
                    name,
                    fields,
                },
            );
        }

        Metadata {
            plugin: self.plugin,
            sdk,
            build_id: self.build_id,
            build_time: self.build_time,
            git_repo: self.git_repo,
            git_commit: self.git_commit,
            fn_exports,
            fn_imports: FunctionMap::new(),
            types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        let json = r#"{
            "plugin": "sample",
            "sdk": "functions-sdk",
            "buildId": "abc123",
            "fnExports": {
                "add": {
                    "name": "add",
                    "parameters": [
                        {"name": "a", "type": "i32"},
                        {"name": "b", "type": "i32"}
                    ],
                    "results": [{"type": "i32"}]
                }
            },
            "types": {
                "Person": {
                    "id": 9,
                    "name": "Person",
                    "fields": [
                        {"name": "name", "type": "string"},
                        {"name": "age", "type": "i32"}
                    ]
                }
            }
        }"#;

        let meta = Metadata::from_json(json).unwrap();
        assert_eq!(meta.plugin, "sample");

        let add = meta.export("add").unwrap();
        assert_eq!(add.parameters.len(), 2);
        assert_eq!(add.parameters[1].type_name, "i32");
        assert_eq!(add.results[0].type_name, "i32");

        let person = meta.type_definition("Person").unwrap();
        assert_eq!(person.id, 9);
        assert_eq!(person.fields[0].name, "name");
    }

    #[test]
    fn test_parse_legacy_metadata() {
        let json = r#"{
            "plugin": "legacy-sample",
            "library": "@borealis/functions-sdk",
            "buildId": "xyz",
            "functions": [
                {
                    "name": "greet",
                    "parameters": [
                        {"name": "who", "type": {"name": "string", "path": "string"}}
                    ],
                    "returnType": {"name": "string", "path": "string"}
                },
                {
                    "name": "init",
                    "parameters": [],
                    "returnType": {"name": "void"}
                }
            ],
            "types": [
                {
                    "id": 10,
                    "name": "Point",
                    "path": "Point",
                    "fields": [
                        {"name": "x", "type": {"name": "f64", "path": "f64"}},
                        {"name": "y", "type": {"name": "f64", "path": "f64"}}
                    ]
                }
            ]
        }"#;

        let meta = Metadata::from_json(json).unwrap();
        assert_eq!(meta.sdk, "functions-sdk");

        let greet = meta.export("greet").unwrap();
        assert_eq!(greet.results.len(), 1);
        assert_eq!(greet.results[0].type_name, "string");

        // void return types convert to an empty result list
        assert!(meta.export("init").unwrap().results.is_empty());

        assert_eq!(meta.type_definition("Point").unwrap().fields.len(), 2);
    }

    #[test]
    fn test_missing_function() {
        let meta = Metadata::from_json(r#"{"plugin": "empty"}"#).unwrap();
        assert!(meta.export("nope").is_none());
    }
}
