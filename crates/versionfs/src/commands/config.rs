//! Config discovery and the `config` command.

use anyhow::Context;
use std::path::Path;
use versionfs_core::{VersioningConfig, VersioningFs};

/// Load the config from `--config`, or `versionfs.json` in the root, or defaults.
pub async fn load_config(root: &Path, path: Option<&Path>) -> anyhow::Result<VersioningConfig> {
    match path {
        Some(path) => VersioningConfig::load(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => VersioningConfig::discover(root)
            .await
            .with_context(|| format!("failed to load config in {}", root.display())),
    }
}

/// Open the versioned store rooted at `root`.
pub async fn open_store(root: &Path, config: VersioningConfig) -> anyhow::Result<VersioningFs> {
    VersioningFs::new(root, config)
        .await
        .with_context(|| format!("failed to open versioned store at {}", root.display()))
}

/// Print the effective configuration as JSON.
pub fn show_config(config: &VersioningConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
