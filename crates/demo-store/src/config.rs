use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::fingerprint::TaskConfig;
use crate::remote::{RemoteBackendsConfig, resolve_required_string_field, resolve_string_field};

/// Demo dataset schema version. Bumping it starts an empty cache partition.
pub const DATASET_VERSION: &str = "0.9.0";

fn default_version() -> String {
    DATASET_VERSION.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub cache_root: String,
    pub cache_root_env: Option<String>,
    pub version: String,
    pub releases_url: Option<String>,
    pub releases_url_env: Option<String>,
    pub backend: Option<String>,
    pub backends: RemoteBackendsConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_root: String::new(),
            cache_root_env: None,
            version: default_version(),
            releases_url: None,
            releases_url_env: None,
            backend: None,
            backends: RemoteBackendsConfig::default(),
        }
    }
}

impl StoreConfig {
    /// The cache root is always explicit; there is no home-directory fallback.
    pub fn resolve_cache_root(&self) -> Result<PathBuf> {
        resolve_required_string_field(
            "store.cache_root",
            Some(self.cache_root.as_str()),
            self.cache_root_env.as_deref(),
        )
        .map(PathBuf::from)
    }

    pub fn resolve_releases_url(&self) -> Option<String> {
        resolve_string_field(self.releases_url.as_deref(), self.releases_url_env.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub extends: Option<String>,
    pub store: StoreConfig,
    pub task: Option<TaskConfig>,
}

fn resolve_ref_path(base_file: &Path, reference: &str) -> PathBuf {
    let reference = Path::new(reference);
    if reference.is_absolute() {
        return reference.to_path_buf();
    }
    base_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(reference)
}

fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (k, v) in overlay_table {
                match base_table.get_mut(&k) {
                    Some(slot) => merge_values(slot, v),
                    None => {
                        base_table.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

fn load_value(path: &Path, stack: &mut Vec<PathBuf>) -> Result<toml::Value> {
    let canonical = path
        .canonicalize()
        .map_err(|e| StoreError::io(format!("failed to resolve {}", path.display()), e))?;
    if stack.contains(&canonical) {
        return Err(StoreError::config(format!(
            "configuration extends cycle detected at {}",
            canonical.display()
        )));
    }
    stack.push(canonical.clone());

    let raw = std::fs::read_to_string(&canonical)
        .map_err(|e| StoreError::io(format!("failed to read {}", canonical.display()), e))?;
    let own: toml::Value = toml::from_str(&raw).map_err(|e| {
        StoreError::config(format!("failed to parse {}: {e}", canonical.display()))
    })?;

    let merged = if let Some(parent_ref) = own.get("extends").and_then(|v| v.as_str()) {
        let parent_path = resolve_ref_path(&canonical, parent_ref);
        let mut base = load_value(&parent_path, stack)?;
        merge_values(&mut base, own);
        base
    } else {
        own
    };

    stack.pop();
    Ok(merged)
}

pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let mut stack = Vec::new();
    let value = load_value(path, &mut stack)?;
    value.try_into().map_err(|e| {
        StoreError::config(format!("invalid configuration {}: {e}", path.display()))
    })
}

/// Task configuration files support the same `extends` chaining as store
/// configuration.
pub fn load_task_file(path: &Path) -> Result<TaskConfig> {
    let mut stack = Vec::new();
    let value = load_value(path, &mut stack)?;
    let config: TaskConfig = value.try_into().map_err(|e| {
        StoreError::config(format!("invalid task configuration {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}
