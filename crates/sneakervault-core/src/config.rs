use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
///
/// Loaded from the config file, then environment variables on top.
/// Priority: Env > File > Defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub rowstore: RowStoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> crate::Result<Self> {
        let mut config = Self::load_file(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read a specific file. Missing file means defaults.
    pub fn load_file(path: &std::path::Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save config to disk
    pub fn save(&self) -> crate::Result<PathBuf> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&config_path, contents)?;
        Ok(config_path)
    }

    /// Layer environment overrides on top of whatever the file said.
    ///
    /// Takes a lookup function instead of reading the environment directly,
    /// so tests don't have to mutate process-global state.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SNEAKERVAULT_API_URL") {
            self.provider.base_url = url;
        }
        if let Some(url) = lookup("SNEAKERVAULT_ROWSTORE_URL") {
            self.rowstore.url = url;
        }
        if let Some(key) = lookup("SNEAKERVAULT_ANON_KEY") {
            self.rowstore.anon_key = key;
        }
        if let Some(token) = lookup("SNEAKERVAULT_ACCESS_TOKEN") {
            self.rowstore.access_token = Some(token).filter(|t| !t.is_empty());
        }
    }

    /// Get the config file path
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("sneakervault");

        Ok(config_dir.join("config.toml"))
    }

    /// Where the on-disk cache lives unless the config says otherwise
    pub fn cache_db_path(&self) -> crate::Result<PathBuf> {
        if let Some(path) = &self.cache.db_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find data directory".into()))?
            .join("sneakervault");

        Ok(data_dir.join("cache.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the sneaker-data service (serves /search and /items/<id>)
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RowStoreConfig {
    /// Project URL of the hosted row store
    #[serde(default)]
    pub url: String,

    /// Public anon key, sent with every request
    #[serde(default)]
    pub anon_key: String,

    /// Session access token for the signed-in user
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Prefix for every cache key
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// How long search results and item details stay fresh
    #[serde(default = "default_content_ttl")]
    pub content_ttl_hours: u64,

    /// How long a "is this in my vault" answer stays fresh
    #[serde(default = "default_status_ttl")]
    pub status_ttl_minutes: u64,

    /// Override for the SQLite cache file
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

fn default_namespace() -> String {
    sneakervault_cache::DEFAULT_NAMESPACE.to_string()
}

fn default_content_ttl() -> u64 {
    24
}

fn default_status_ttl() -> u64 {
    5
}

impl CacheConfig {
    pub fn content_ttl(&self) -> Duration {
        Duration::from_secs(self.content_ttl_hours * 60 * 60)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_minutes * 60)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            content_ttl_hours: default_content_ttl(),
            status_ttl_minutes: default_status_ttl(),
            db_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Quiet period before a keystroke turns into a search
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Shorter queries never hit the network
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_min_query_len() -> usize {
    2
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            min_query_len: default_min_query_len(),
        }
    }
}
