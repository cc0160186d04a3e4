//! Plugin directory discovery.

use std::path::{Path, PathBuf};

use miette::{miette, Result};

/// Metadata file that marks a plugin directory.
const METADATA_NAME: &str = "metadata.json";

/// Finds plugin directories under a root: every immediate subdirectory
/// containing a `metadata.json`. A root that is itself a plugin directory
/// yields just itself.
pub fn find_plugin_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(miette!("Plugin path {} does not exist", root.display()));
    }

    if root.join(METADATA_NAME).is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let entries = std::fs::read_dir(root)
        .map_err(|e| miette!("Cannot read plugin directory {}: {}", root.display(), e))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| miette!("Cannot read plugin directory entry: {}", e))?;
        let path = entry.path();
        if path.is_dir() && path.join(METADATA_NAME).is_file() {
            dirs.push(path);
        }
    }

    dirs.sort();
    if dirs.is_empty() {
        return Err(miette!(
            "No plugin directories found under {}",
            root.display()
        ));
    }
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_find_plugin_dirs() {
        let dir = tempdir().unwrap();

        let a = dir.path().join("a");
        fs::create_dir(&a).unwrap();
        fs::write(a.join("metadata.json"), "{}").unwrap();

        let b = dir.path().join("b");
        fs::create_dir(&b).unwrap();
        fs::write(b.join("metadata.json"), "{}").unwrap();

        // not a plugin: no metadata
        fs::create_dir(dir.path().join("c")).unwrap();

        let dirs = find_plugin_dirs(dir.path()).unwrap();
        assert_eq!(dirs, vec![a, b]);
    }

    #[test]
    fn test_root_is_a_plugin_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("metadata.json"), "{}").unwrap();

        let dirs = find_plugin_dirs(dir.path()).unwrap();
        assert_eq!(dirs, vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn test_no_plugins_found() {
        let dir = tempdir().unwrap();
        assert!(find_plugin_dirs(dir.path()).is_err());
    }

    #[test]
    fn test_missing_root() {
        assert!(find_plugin_dirs(Path::new("/nonexistent/plugins")).is_err());
    }
}
