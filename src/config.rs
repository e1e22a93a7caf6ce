use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub cache: CacheConfig,
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL of the analysis API
  pub base_url: String,
  /// Timeout for analyze/translate requests
  pub timeout_secs: u64,
  /// Timeout for the status request
  pub status_timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8000".to_string(),
      timeout_secs: 30,
      status_timeout_secs: 10,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// TTL for cached responses, in milliseconds
  pub default_ttl_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      default_ttl_ms: crate::cache::DEFAULT_TTL_MS,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
  /// On-disk SQLite database
  #[default]
  Sqlite,
  /// Nothing survives the process
  Memory,
  /// Storage switched off; every read falls back to defaults
  Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  pub backend: BackendKind,
  /// Database file (default: $XDG_DATA_HOME/cm-analyzer/storage.db)
  pub path: Option<PathBuf>,
  /// Maximum stored bytes; `null` removes the limit
  pub quota_bytes: Option<u64>,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      backend: BackendKind::Sqlite,
      path: None,
      quota_bytes: Some(DEFAULT_QUOTA_BYTES),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./cm-analyzer.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/cm-analyzer/config.yaml
  ///
  /// With no file found the defaults are used. `CM_ANALYZER_API_URL`
  /// overrides `api.base_url` either way.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var("CM_ANALYZER_API_URL") {
      config.api.base_url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("cm-analyzer.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("cm-analyzer").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }
}
