//! Worker capability override loader
//!
//! Loads capability overrides from YAML files:
//! - Global: ~/.config/trip/workers/*.yaml (XDG_CONFIG_HOME)
//! - Project: .trip/workers/*.yaml
//!
//! The file stem names the worker (`search.yaml` patches `search`).
//! Project overrides are applied after global ones.

use super::config::CapabilityOverride;
use super::worker::WorkerId;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Load overrides from global and project directories, in application order
pub fn load_capability_overrides(working_dir: &Path) -> Vec<(WorkerId, CapabilityOverride)> {
    let mut overrides = Vec::new();

    if let Some(global_dir) = global_config_dir() {
        load_overrides_from_dir(&global_dir, &mut overrides);
    }

    let project_dir = project_config_dir(working_dir);
    load_overrides_from_dir(&project_dir, &mut overrides);

    overrides
}

/// Uses XDG_CONFIG_HOME or falls back to ~/.config
fn global_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("trip").join("workers"))
}

pub fn project_config_dir(working_dir: &Path) -> PathBuf {
    working_dir.join(".trip").join("workers")
}

fn load_overrides_from_dir(dir: &Path, overrides: &mut Vec<(WorkerId, CapabilityOverride)>) {
    if !dir.is_dir() {
        return;
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        let ext = path.extension().and_then(|e| e.to_str());
        if !matches!(ext, Some("yaml") | Some("yml")) {
            continue;
        }

        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(s) => s,
            None => continue,
        };
        let worker: WorkerId = match stem.parse() {
            Ok(id) => id,
            Err(_) => {
                warn!("Ignoring worker config for unknown worker: {}", path.display());
                continue;
            }
        };

        match load_override_file(&path) {
            Ok(patch) => overrides.push((worker, patch)),
            Err(e) => warn!("Failed to load worker config: {}", e),
        }
    }
}

fn load_override_file(path: &Path) -> Result<CapabilityOverride, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.display().to_string(),
        source,
    })
}
