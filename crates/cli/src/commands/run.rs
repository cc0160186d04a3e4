//! Run command implementation.

use std::io::Read;
use std::path::Path;

use miette::{miette, Result};

use borealis_core::ExecutionContext;

use crate::bootstrap;

/// Executes one envelope against the loaded plugins and prints the
/// response document.
pub fn execute(
    plugins_root: &Path,
    manifest_path: Option<&Path>,
    config_path: Option<&Path>,
    envelope: &str,
) -> Result<()> {
    let runtime = bootstrap::build(plugins_root, manifest_path, config_path)?;

    // "-" reads the envelope from stdin
    let input = if envelope == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| miette!("Failed to read envelope from stdin: {}", e))?;
        buf
    } else {
        std::fs::read(envelope)
            .map_err(|e| miette!("Failed to read envelope from {}: {}", envelope, e))?
    };

    let ctx = ExecutionContext::new();
    let mut out = Vec::new();
    runtime
        .source
        .load(&ctx, &input, &mut out)
        .map_err(|e| miette!("{}", e))?;

    println!("{}", String::from_utf8_lossy(&out));
    Ok(())
}
