//! Configuration file support for liftgraph.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/liftgraph/config.toml`.

use crate::memo::DEFAULT_CAPACITY;
use crate::strategy::{CacheStrategy, FetchOptions};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Parse cache sizing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_parse_cache_capacity")]
    pub parse_cache_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            parse_cache_capacity: default_parse_cache_capacity(),
        }
    }
}

/// Fetch deadlines and strategy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default)]
    pub strategy: CacheStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            strategy: CacheStrategy::default(),
            max_results: None,
        }
    }
}

impl FetchConfig {
    pub fn options(&self) -> FetchOptions {
        FetchOptions {
            strategy: self.strategy,
            timeout: Duration::from_millis(self.timeout_ms),
            max_results: self.max_results,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Network side of the local provider. Absent source means offline.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

// Default value functions
fn home_relative(fallback: &str) -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(fallback),
        None => PathBuf::from(fallback),
    }
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_relative(".local/share"));
    base.join("liftgraph")
}

fn default_parse_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_probe_timeout_ms() -> u64 {
    500
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_relative(".config"));
        base.join("liftgraph").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.fetch.timeout_ms == 0 {
            return Err(Error::Config("fetch.timeout_ms must be greater than 0".into()));
        }
        if self.fetch.probe_timeout_ms == 0 {
            return Err(Error::Config(
                "fetch.probe_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
