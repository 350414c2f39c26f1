//! Authentication configuration loading
//!
//! Loads API keys for LLM providers and external services from:
//! - $XDG_DATA_HOME/trip/auth.json (preferred)
//! - ~/.local/share/trip/auth.json (fallback)

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Authentication entry for a provider or service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthEntry {
    /// Simple API key authentication
    #[serde(rename = "api")]
    Api {
        key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl AuthEntry {
    pub fn api_key(&self) -> &str {
        match self {
            AuthEntry::Api { key, .. } => key,
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        match self {
            AuthEntry::Api { base_url, .. } => base_url.as_deref(),
        }
    }
}

/// Authentication configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthConfig {
    pub providers: HashMap<String, AuthEntry>,
}

impl AuthConfig {
    /// Load auth config from the default location. A missing file is an
    /// empty config.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Default config file path
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
            let path = PathBuf::from(xdg_data).join("trip/auth.json");
            if path.exists() {
                return Some(path);
            }
        }
        Some(dirs::data_dir()?.join("trip").join("auth.json"))
    }

    pub fn get(&self, provider: &str) -> Option<&AuthEntry> {
        self.providers.get(provider)
    }

    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.providers.get(provider).map(|e| e.api_key())
    }

    pub fn base_url(&self, provider: &str) -> Option<&str> {
        self.providers.get(provider).and_then(|e| e.base_url())
    }

    pub fn providers(&self) -> impl Iterator<Item = &String> {
        self.providers.keys()
    }
}
