//! Configuration management for the CLI

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use longevity_core::manager::{ModelManagerConfig, DEFAULT_MODEL, DEFAULT_MODEL_PATH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration, stored as JSON under the user's config directory
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Model directory
    pub model_dir: Option<PathBuf>,
    /// Model used when a command does not name one
    pub default_model: Option<String>,
    /// Default output format (`table` or `json`)
    pub default_format: Option<String>,
}

/// Effective settings after flags override the config file
#[derive(Debug, Clone)]
pub struct Settings {
    pub model_dir: PathBuf,
    pub default_model: String,
    pub format: OutputFormat,
}

impl Config {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("alp").join("config.json"))
    }

    /// Apply command-line overrides on top of the file values
    pub fn merge(
        self,
        model_dir: Option<PathBuf>,
        default_model: Option<String>,
        format: Option<OutputFormat>,
    ) -> Settings {
        let format = format
            .or_else(|| self.default_format.as_deref().and_then(OutputFormat::parse))
            .unwrap_or_default();

        Settings {
            model_dir: model_dir
                .or(self.model_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            default_model: default_model
                .or(self.default_model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            format,
        }
    }
}

impl Settings {
    /// Manager configuration scanning only the chosen model directory
    pub fn manager_config(&self) -> ModelManagerConfig {
        ModelManagerConfig {
            base_dir: PathBuf::from("."),
            model_path: self.model_dir.clone(),
            default_model: self.default_model.clone(),
            ..Default::default()
        }
    }
}
