//! Plugin loading and the registry of loaded plugins.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use wasmtime::{Engine, Module};

use borealis_core::{Function, Metadata};

use crate::error::{PluginError, Result};
use crate::handlers::HandlerSet;
use crate::typeinfo::TypeInfo;

/// A loaded plugin: compiled bytecode plus extracted metadata, type info,
/// and the per-plugin handler cache. Immutable after load.
pub struct Plugin {
    metadata: Arc<Metadata>,
    module: Module,
    type_info: Arc<TypeInfo>,
    handlers: Arc<HandlerSet>,
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("metadata", &self.metadata)
            .field("type_info", &self.type_info)
            .finish_non_exhaustive()
    }
}

impl Plugin {
    /// Builds a plugin from its metadata and compiled WASM bytes.
    pub fn from_parts(engine: &Engine, metadata: Metadata, wasm_bytes: &[u8]) -> Result<Arc<Self>> {
        let module = Module::new(engine, wasm_bytes)
            .map_err(|e| PluginError::Wasm(format!("failed to compile plugin module: {e}")))?;

        let metadata = Arc::new(metadata);
        let type_info = Arc::new(TypeInfo::new(metadata.clone()));
        let handlers = Arc::new(HandlerSet::new(type_info.clone()));
        handlers.preload(&metadata)?;

        Ok(Arc::new(Self {
            metadata,
            module,
            type_info,
            handlers,
        }))
    }

    /// Loads a plugin from a directory containing `metadata.json` and
    /// `plugin.wasm`.
    pub fn load_dir(engine: &Engine, dir: &Path) -> Result<Arc<Self>> {
        let metadata_path = dir.join("metadata.json");
        if !metadata_path.exists() {
            return Err(PluginError::NotFound(metadata_path));
        }

        let wasm_path = dir.join("plugin.wasm");
        if !wasm_path.exists() {
            return Err(PluginError::NotFound(wasm_path));
        }

        let metadata = Metadata::from_file(&metadata_path)?;
        let wasm_bytes = std::fs::read(&wasm_path)?;
        Self::from_parts(engine, metadata, &wasm_bytes)
    }

    /// The plugin's name.
    pub fn name(&self) -> &str {
        &self.metadata.plugin
    }

    /// The plugin's metadata.
    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }

    /// The compiled module.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Type info over the plugin's declared types.
    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.type_info
    }

    /// The plugin's cached type handlers.
    pub fn handlers(&self) -> &Arc<HandlerSet> {
        &self.handlers
    }
}

/// Registry of loaded plugins. Read-mostly: lookups take a reader lock,
/// load/unload take the writer lock.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Arc<Plugin>>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin under its name, replacing any previous version.
    pub fn load(&self, plugin: Arc<Plugin>) {
        if let Ok(mut plugins) = self.plugins.write() {
            plugins.insert(plugin.name().to_string(), plugin);
        }
    }

    /// Removes a plugin by name. Instances already acquired keep their
    /// reference until they close.
    pub fn unload(&self, name: &str) -> bool {
        self.plugins
            .write()
            .map(|mut plugins| plugins.remove(name).is_some())
            .unwrap_or(false)
    }

    /// Looks up a plugin by name.
    pub fn get(&self, name: &str) -> Option<Arc<Plugin>> {
        self.plugins.read().ok()?.get(name).cloned()
    }

    /// Names of all loaded plugins.
    pub fn names(&self) -> Vec<String> {
        self.plugins
            .read()
            .map(|plugins| plugins.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Finds the plugin exporting the named function, along with the
    /// function's signature.
    pub fn find_function(&self, name: &str) -> Option<(Arc<Plugin>, Function)> {
        let plugins = self.plugins.read().ok()?;
        for plugin in plugins.values() {
            if let Some(function) = plugin.metadata().export(name) {
                return Some((plugin.clone(), function.clone()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::Engine;

    // A minimal valid WASM module (empty)
    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic
        0x01, 0x00, 0x00, 0x00, // version
    ];

    fn test_plugin(name: &str) -> Arc<Plugin> {
        let metadata = Metadata::from_json(&format!(
            r#"{{
                "plugin": "{name}",
                "fnExports": {{
                    "greet": {{
                        "name": "greet",
                        "parameters": [{{"name": "who", "type": "string"}}],
                        "results": [{{"type": "string"}}]
                    }}
                }}
            }}"#
        ))
        .unwrap();
        Plugin::from_parts(&Engine::default(), metadata, MINIMAL_WASM).unwrap()
    }

    #[test]
    fn test_load_and_get() {
        let registry = PluginRegistry::new();
        assert!(registry.get("sample").is_none());

        registry.load(test_plugin("sample"));
        assert_eq!(registry.get("sample").unwrap().name(), "sample");
        assert_eq!(registry.names(), vec!["sample".to_string()]);
    }

    #[test]
    fn test_unload() {
        let registry = PluginRegistry::new();
        registry.load(test_plugin("sample"));

        assert!(registry.unload("sample"));
        assert!(registry.get("sample").is_none());
        assert!(!registry.unload("sample"));
    }

    #[test]
    fn test_find_function() {
        let registry = PluginRegistry::new();
        registry.load(test_plugin("sample"));

        let (plugin, function) = registry.find_function("greet").unwrap();
        assert_eq!(plugin.name(), "sample");
        assert_eq!(function.parameters.len(), 1);
        assert!(registry.find_function("missing").is_none());
    }

    #[test]
    fn test_load_nonexistent_dir() {
        let err = Plugin::load_dir(&Engine::default(), Path::new("/nonexistent/path")).unwrap_err();
        assert!(matches!(err, PluginError::NotFound(_)));
    }
}
