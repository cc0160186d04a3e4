//! Validate command implementation.

use std::path::Path;

use miette::{miette, Result};

use borealis_core::FunctionInvoker;

use crate::bootstrap;

/// Loads plugins and the manifest, then checks every configured search
/// method resolves to a valid embedder. Nothing is executed.
pub fn execute(
    plugins_root: &Path,
    manifest_path: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<()> {
    let runtime = bootstrap::build(plugins_root, manifest_path, config_path)?;

    for name in runtime.runtime.registry().names() {
        println!("plugin {name}: ok");
    }

    let mut failures = 0usize;
    let manifest = runtime.collections.manifest().clone();
    for (collection, info) in &manifest.collections {
        for (method, search_method) in &info.search_methods {
            match runtime.runtime.validate_embedder(&search_method.embedder) {
                Ok(()) => println!("collection {collection}/{method}: ok"),
                Err(e) => {
                    println!("collection {collection}/{method}: {e}");
                    failures += 1;
                }
            }
        }
    }

    if failures > 0 {
        return Err(miette!("Validation failed: {} invalid embedder(s)", failures));
    }

    println!("Validation passed");
    Ok(())
}
