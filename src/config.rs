//! Application configuration management.
//!
//! Configuration is stored at `~/.config/pattacache/config.json` and
//! holds the backend base URL, an optional default role, and per-kind
//! freshness-window overrides. The base URL can also be overridden with
//! the `PATTACACHE_API_URL` environment variable.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::{default_policy, DEFAULT_BASE_URL};
use crate::cache::CachePolicy;
use crate::models::Role;

/// Application name used for config/cache directory paths.
const APP_NAME: &str = "pattacache";

/// Config file name.
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub default_role: Option<Role>,
    /// Freshness-window overrides in minutes, keyed by resource kind.
    #[serde(default)]
    pub cache_windows_minutes: HashMap<String, u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Backend base URL: environment override, then config, then default.
    pub fn api_base_url(&self) -> String {
        std::env::var("PATTACACHE_API_URL")
            .ok()
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Policy table: defaults with any configured overrides applied.
    pub fn cache_policy(&self) -> CachePolicy {
        let mut policy = default_policy();
        for (kind, minutes) in &self.cache_windows_minutes {
            policy = policy.with_window(kind.clone(), Duration::from_secs(minutes * 60));
        }
        policy
    }
}
