use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::framing::FramingMode;

pub const DEFAULT_CHAT_URL: &str = "http://localhost:8002";
pub const DEFAULT_AUTH_URL: &str = "http://localhost:8001";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub chat_base_url: String,
    pub auth_base_url: String,
    pub framing: FramingMode,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            chat_base_url: DEFAULT_CHAT_URL.to_string(),
            auth_base_url: DEFAULT_AUTH_URL.to_string(),
            framing: FramingMode::default(),
            log_dir: None,
        }
    }

    /// Load from the user config directory, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var("STOREFRONT_CHAT_URL").ok(),
            std::env::var("STOREFRONT_FRAMING").ok(),
        )
    }

    fn apply_overrides(&mut self, chat_url: Option<String>, framing: Option<String>) -> Result<()> {
        if let Some(url) = chat_url.filter(|u| !u.trim().is_empty()) {
            self.chat_base_url = url.trim().to_string();
        }
        if let Some(mode) = framing {
            self.framing = mode
                .parse()
                .map_err(|e| anyhow!("STOREFRONT_FRAMING: {}", e))?;
        }
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("storefront"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
