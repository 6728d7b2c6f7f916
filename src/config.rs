use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::domain::collection::CollectionSettings;
use crate::domain::document_manager::{DEFAULT_BATCH_SIZE, DEFAULT_WORKERS};
use crate::infrastructure::embedding::DEFAULT_MODEL_NAME;

pub const CONFIG_PATH_ENV: &str = "VECDOC_CONFIG_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "vecdoc.toml";
const ENV_PREFIX: &str = "VECDOC_";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "vecdoc", "vecdoc")
}

#[derive(Serialize, Deserialize, Clone, PartialEq)]
pub struct QdrantSettings {
    /// gRPC endpoint of the Qdrant server.
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

// The API key never reaches the logs.
impl fmt::Debug for QdrantSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QdrantSettings")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EmbeddingSettings {
    /// fastembed model, by variant name or model code.
    pub model: String,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        // Calculate default cache path *only here*
        let default_cache_dir = project_dirs().map(|dirs| dirs.cache_dir().join("models"));
        Self {
            model: DEFAULT_MODEL_NAME.to_string(),
            cache_dir: default_cache_dir,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UpsertSettings {
    pub batch_size: usize,
    pub workers: usize,
}

impl Default for UpsertSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub qdrant: QdrantSettings,
    #[serde(default)]
    pub collection: CollectionSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub upsert: UpsertSettings,
}

/// Loads configuration from defaults, then the TOML file, then `VECDOC_*`
/// environment variables (nested keys split on `__`).
pub fn load_config() -> Result<AppConfig> {
    // Support VECDOC_CONFIG_PATH env var for config file path
    let config_path_env = std::env::var(CONFIG_PATH_ENV).ok();
    let config_path = config_path_env
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    if let Some(ref env_path) = config_path_env {
        if !std::path::Path::new(env_path).exists() {
            return Err(anyhow::anyhow!(
                "Config file not found at {}: {}",
                CONFIG_PATH_ENV,
                env_path
            ));
        }
        log::info!("{} is set: {}", CONFIG_PATH_ENV, env_path);
    } else {
        log::debug!("{} not set, falling back to default: {}", CONFIG_PATH_ENV, config_path);
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: AppConfig = figment.extract().context("Failed to extract AppConfig")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
    if config.qdrant.url.trim().is_empty() {
        return Err(anyhow::anyhow!("Configured qdrant.url cannot be empty"));
    }
    if config.collection.name.trim().is_empty() {
        return Err(anyhow::anyhow!("Configured collection.name cannot be empty"));
    }
    if config.embedding.model.trim().is_empty() {
        return Err(anyhow::anyhow!("Configured embedding.model cannot be empty"));
    }
    if config.upsert.batch_size == 0 {
        return Err(anyhow::anyhow!("Configured upsert.batch_size must be greater than zero"));
    }
    if config.upsert.workers == 0 {
        return Err(anyhow::anyhow!("Configured upsert.workers must be greater than zero"));
    }
    Ok(())
}
