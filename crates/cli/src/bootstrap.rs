//! Composition root: builds the host, registry, collections, and data
//! source from configuration files.

use std::path::Path;
use std::sync::Arc;

use miette::{miette, Result};

use borealis_collections::CollectionRuntime;
use borealis_core::{CollectionManifest, FunctionInvoker, HostEnv, RuntimeConfig};
use borealis_engine::{DetachedGraphQl, FunctionRuntime, Source, UnconfiguredModels};
use borealis_plugin::{Plugin, PluginRegistry, WasmHost};

use crate::discovery;

/// Everything a command needs to serve invocations.
pub struct Runtime {
    pub source: Source,
    pub runtime: Arc<FunctionRuntime>,
    pub collections: Arc<CollectionRuntime>,
}

/// Loads plugins and wires the full host environment.
pub fn build(
    plugins_root: &Path,
    manifest_path: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<Runtime> {
    let config = match config_path {
        Some(path) => RuntimeConfig::from_file(path).map_err(|e| miette!("{}", e))?,
        None => RuntimeConfig::default(),
    };

    let manifest = match manifest_path {
        Some(path) => CollectionManifest::from_file(path).map_err(|e| miette!("{}", e))?,
        None => CollectionManifest::default(),
    };

    let host = Arc::new(WasmHost::new(config.clone()).map_err(|e| miette!("{}", e))?);
    let registry = Arc::new(PluginRegistry::new());

    for dir in discovery::find_plugin_dirs(plugins_root)? {
        let plugin = Plugin::load_dir(host.engine(), &dir)
            .map_err(|e| miette!("Failed to load plugin from {}: {}", dir.display(), e))?;
        tracing::info!(plugin = plugin.name(), path = %dir.display(), "loaded plugin");
        registry.load(plugin);
    }

    let runtime = Arc::new(FunctionRuntime::new(host, registry));
    let collections = Arc::new(CollectionRuntime::new(
        manifest,
        runtime.clone() as Arc<dyn FunctionInvoker>,
    ));

    let env = Arc::new(HostEnv {
        models: Arc::new(UnconfiguredModels),
        graphql: Arc::new(DetachedGraphQl),
        collections: collections.clone(),
        config,
    });
    runtime.wire(env);

    Ok(Runtime {
        source: Source::new(runtime.clone()),
        runtime,
        collections,
    })
}
