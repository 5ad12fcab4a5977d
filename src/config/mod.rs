//! TOML-backed configuration stored at `~/.vigilia/config.toml`.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Computed at load time, never persisted.
    #[serde(skip)]
    pub config_path: PathBuf,
    #[serde(skip)]
    pub workspace_dir: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub api_base: String,
    pub default_model: String,

    pub heartbeat: HeartbeatConfig,
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub interval_minutes: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Minimum session message count before consolidation is worth running.
    pub memory_window: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { memory_window: 50 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            workspace_dir: PathBuf::new(),
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            default_model: "gpt-4o-mini".to_string(),
            heartbeat: HeartbeatConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Self::load_or_init_at(&home.join(".vigilia"))
    }

    /// Load from (or seed into) an explicit base directory.
    pub fn load_or_init_at(base_dir: &Path) -> Result<Self> {
        let config_path = base_dir.join("config.toml");
        let workspace_dir = base_dir.join("workspace");
        fs::create_dir_all(&workspace_dir).context("Failed to create workspace directory")?;

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).map_err(|e| ConfigError::Load(e.to_string()))?;
            config.config_path = config_path;
            config.workspace_dir = workspace_dir;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                workspace_dir,
                ..Self::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Apply environment variable overrides to config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("VIGILIA_API_KEY").or_else(|_| std::env::var("API_KEY")) {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }

        if let Ok(model) = std::env::var("VIGILIA_MODEL") {
            if !model.is_empty() {
                self.default_model = model;
            }
        }

        if let Ok(base) = std::env::var("VIGILIA_API_BASE") {
            if !base.is_empty() {
                self.api_base = base;
            }
        }
    }
}
