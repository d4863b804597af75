//! comicwatch configuration types and loading

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::SchedulerConfig;
use crate::watcher::WatcherConfig;

/// Main comicwatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Downstream API configuration
    pub booru: BooruConfig,

    /// Request pacing and retry policy
    pub scheduler: SchedulerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Update polling configuration
    pub watcher: WatcherConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that credential environment variables are set and that the
    /// scheduler settings are usable. Call this early in startup to fail fast.
    pub fn validate(&self) -> Result<()> {
        self.booru.credentials()?;
        self.scheduler.validate()?;
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .comicwatch.yml
        let local_config = PathBuf::from(".comicwatch.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/comicwatch/comicwatch.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("comicwatch").join("comicwatch.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Booru API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BooruConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the pool search endpoint
    #[serde(rename = "search-path")]
    pub search_path: String,

    /// Query parameter carrying the search text
    #[serde(rename = "search-param")]
    pub search_param: String,

    /// Path prefix for a single pool; `<id>.json` is appended
    #[serde(rename = "pool-path")]
    pub pool_path: String,

    /// Path prefix for a single post; `<id>.json` is appended
    #[serde(rename = "post-path")]
    pub post_path: String,

    /// Environment variable containing the account name
    #[serde(rename = "username-env")]
    pub username_env: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Identifying User-Agent sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for BooruConfig {
    fn default() -> Self {
        Self {
            base_url: "https://e621.net".to_string(),
            search_path: "/pools.json".to_string(),
            search_param: "search[name_matches]".to_string(),
            pool_path: "/pools/".to_string(),
            post_path: "/posts/".to_string(),
            username_env: "BOORU_USERNAME".to_string(),
            api_key_env: "BOORU_API_KEY".to_string(),
            user_agent: format!("comicwatch/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 30_000,
        }
    }
}

impl BooruConfig {
    /// Read the account name and API key from the environment
    pub fn credentials(&self) -> Result<(String, String)> {
        let username = std::env::var(&self.username_env)
            .map_err(|_| eyre!("Booru username not found. Set the {} environment variable.", self.username_env))?;
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| eyre!("Booru API key not found. Set the {} environment variable.", self.api_key_env))?;
        Ok((username, api_key))
    }

    /// Search endpoint with the query percent-encoded
    pub fn search_url(&self, query: &str) -> Result<String> {
        let mut url = reqwest::Url::parse(&format!("{}{}", self.base_url, self.search_path))
            .context(format!("Invalid search URL: {}{}", self.base_url, self.search_path))?;
        url.query_pairs_mut().append_pair(&self.search_param, query);
        Ok(url.to_string())
    }

    pub fn pool_url(&self, pool_id: u64) -> String {
        format!("{}{}{}.json", self.base_url, self.pool_path, pool_id)
    }

    pub fn post_url(&self, post_id: u64) -> String {
        format!("{}{}{}.json", self.base_url, self.post_path, post_id)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding comics.json
    #[serde(rename = "store-dir")]
    pub store_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("comicwatch")
                .join("data"),
        }
    }
}
