//! CLI command implementations.

pub mod plan;
pub mod run;

use anyhow::{Context, Result};
use std::path::Path;

use crate::domain::models::{Config, TaskManifest, WaveConfig};
use crate::infrastructure::config::ConfigLoader;

/// Load the configuration file given with `--config`, or the project one.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Read a manifest; `.json` files are parsed as JSON, anything else as YAML.
pub fn load_manifest(path: &Path) -> Result<TaskManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let manifest = if is_json {
        TaskManifest::from_json(&content)
    } else {
        TaskManifest::from_yaml(&content)
    };
    manifest.with_context(|| format!("Invalid manifest {}", path.display()))
}

/// Wave settings for a run: a manifest `waves:` block replaces the config's.
pub fn wave_config(config: &Config, manifest: &TaskManifest) -> WaveConfig {
    manifest
        .waves
        .clone()
        .unwrap_or_else(|| config.waves.clone())
}
