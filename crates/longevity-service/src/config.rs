//! Service configuration

use anyhow::Result;
use longevity_core::manager::{ModelManagerConfig, DEFAULT_MODEL, DEFAULT_MODEL_PATH};
use longevity_core::predictor::PredictionConfig;
use longevity_core::sources::{SourceConfig, DEFAULT_APP_STORE_URL, DEFAULT_PLAY_STORE_URL};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration, read from `LONGEVITY_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Node name attached to log events
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory relative model paths are resolved against
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Primary model directory
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Extra model directories, comma-separated
    #[serde(default)]
    pub additional_model_paths: String,

    /// Model loaded when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Recognized model extensions, comma-separated
    #[serde(default = "default_extensions")]
    pub model_extensions: String,

    /// HTTP timeout for a single catalog request in seconds
    #[serde(default = "default_request_timeout")]
    pub source_timeout_secs: u64,

    /// Overall bound on one catalog lookup in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_app_store_url")]
    pub app_store_url: String,

    #[serde(default = "default_play_store_url")]
    pub play_store_url: String,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_model_path() -> String {
    DEFAULT_MODEL_PATH.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_extensions() -> String {
    ".model,.onnx".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_app_store_url() -> String {
    DEFAULT_APP_STORE_URL.to_string()
}

fn default_play_store_url() -> String {
    DEFAULT_PLAY_STORE_URL.to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            base_dir: default_base_dir(),
            model_path: default_model_path(),
            additional_model_paths: String::new(),
            default_model: default_model(),
            model_extensions: default_extensions(),
            source_timeout_secs: default_request_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            app_store_url: default_app_store_url(),
            play_store_url: default_play_store_url(),
        }
    }
}

/// Split a comma-separated setting, dropping blanks
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extensions always carry their leading dot
fn normalize_extension(ext: String) -> String {
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

impl ServiceConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("LONGEVITY"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid LONGEVITY_* settings, using defaults");
            ServiceConfig::default()
        }))
    }

    pub fn manager_config(&self) -> ModelManagerConfig {
        ModelManagerConfig {
            base_dir: self.base_dir.clone(),
            model_path: PathBuf::from(&self.model_path),
            additional_paths: split_list(&self.additional_model_paths)
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            default_model: self.default_model.clone(),
            extensions: split_list(&self.model_extensions)
                .into_iter()
                .map(normalize_extension)
                .collect(),
        }
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            app_store_url: self.app_store_url.clone(),
            play_store_url: self.play_store_url.clone(),
            request_timeout: Duration::from_secs(self.source_timeout_secs),
            ..Default::default()
        }
    }

    pub fn prediction_config(&self) -> PredictionConfig {
        PredictionConfig {
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            node_name: self.node_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_library() {
        let config = ServiceConfig::default();
        let manager = config.manager_config();

        assert_eq!(manager.model_path, PathBuf::from("static/models"));
        assert_eq!(manager.default_model, "rf_model.model");
        assert_eq!(manager.extensions, vec![".model", ".onnx"]);
        assert!(manager.additional_paths.is_empty());
        assert_eq!(config.prediction_config().fetch_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_list_settings() {
        let config = ServiceConfig {
            additional_model_paths: " /opt/models , ,shared ".to_string(),
            model_extensions: "model, onnx".to_string(),
            ..Default::default()
        };
        let manager = config.manager_config();

        assert_eq!(
            manager.additional_paths,
            vec![PathBuf::from("/opt/models"), PathBuf::from("shared")]
        );
        assert_eq!(manager.extensions, vec![".model", ".onnx"]);
    }
}
