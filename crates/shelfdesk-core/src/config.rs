//! Gateway configuration management.
//!
//! This module handles loading and saving the gateway configuration, which
//! includes the API base URL, request timeout and where credentials live.
//!
//! Configuration is stored at `~/.config/shelfdesk/config.json`. Environment
//! variables (optionally from a `.env` file) override the file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{FileStore, KeyringStore, MemoryStore, TokenStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "shelfdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Local development server address
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// HTTP request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_API_URL: &str = "SHELFDESK_API_URL";
const ENV_TIMEOUT_SECS: &str = "SHELFDESK_TIMEOUT_SECS";

/// Where the credential pair and user snapshot are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    /// JSON file; `dir` defaults to the platform data directory.
    File {
        #[serde(default)]
        dir: Option<PathBuf>,
    },
    Keyring,
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::File { dir: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Share one renewal exchange between concurrent 401s.
    pub coalesce_renewals: bool,
    pub storage: StorageBackend,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            coalesce_renewals: true,
            storage: StorageBackend::default(),
        }
    }
}

impl GatewayConfig {
    /// Load from the config file (or defaults), then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };

        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        debug!(base_url = %config.base_url, "Gateway config loaded");
        Ok(config)
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

    /// Apply overrides from a variable lookup (normally the process env).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))?;
        }
        Ok(())
    }

    /// Construct the configured credential store.
    pub fn open_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match self.storage {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::File { dir: Some(ref dir) } => Arc::new(FileStore::new(dir)),
            StorageBackend::File { dir: None } => Arc::new(FileStore::in_data_dir()?),
            StorageBackend::Keyring => Arc::new(KeyringStore::new()),
        };
        Ok(store)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
