//! Store catalog adapters
//!
//! Each adapter looks an app up by name and flattens what the catalog
//! reports into an [`AppRecord`]. Lookups are best-effort: "not found" is
//! `Ok(None)`, transport and parse problems are [`SourceError`]s that the
//! orchestrator treats the same way.

mod app_store;
mod play_store;
mod similarity;

pub use app_store::AppStoreSource;
pub use play_store::PlayStoreSource;
pub use similarity::similarity_ratio;

use crate::models::{AppRecord, Platform};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Default base URL of the App Store search API
pub const DEFAULT_APP_STORE_URL: &str = "https://itunes.apple.com";

/// Default base URL of the Play Store web catalog
pub const DEFAULT_PLAY_STORE_URL: &str = "https://play.google.com";

/// Browser-like agent; the web catalog serves a reduced page to bots
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Why a catalog lookup failed
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog returned HTTP {0}")]
    Status(u16),

    #[error("could not parse catalog response: {0}")]
    Parse(String),

    #[error("invalid catalog URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A store catalog that can describe an app by name
#[async_trait]
pub trait AppSource: Send + Sync {
    fn platform(&self) -> Platform;

    /// Look up the best match for `app_name`
    async fn fetch(&self, app_name: &str) -> Result<Option<AppRecord>, SourceError>;
}

/// Configuration shared by the catalog adapters
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub app_store_url: String,
    pub play_store_url: String,
    /// HTTP client timeout per request
    pub request_timeout: Duration,
    /// Number of search results considered by the App Store adapter
    pub search_limit: usize,
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            app_store_url: DEFAULT_APP_STORE_URL.to_string(),
            play_store_url: DEFAULT_PLAY_STORE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            search_limit: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl SourceConfig {
    pub(crate) fn http_client(&self) -> Result<Client, SourceError> {
        Ok(Client::builder()
            .timeout(self.request_timeout)
            .user_agent(self.user_agent.clone())
            .build()?)
    }
}

/// Sentiment proxy derived from the rating; 2.5 stars maps to 0.5
pub fn sentiment_from_rating(rating: Option<f64>) -> f64 {
    let rating = rating.unwrap_or(2.5);
    0.5 + 0.1 * (rating - 2.5).min(5.0)
}
