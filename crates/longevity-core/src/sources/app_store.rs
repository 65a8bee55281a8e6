//! App Store adapter backed by the public iTunes search API

use super::similarity::best_match;
use super::{sentiment_from_rating, AppSource, SourceConfig, SourceError};
use crate::models::{AppRecord, FeatureValue, Platform};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

const IN_APP_PURCHASE_MARKER: &str = "offers in-app purchases";

/// Looks apps up through `<base>/search?entity=software`
pub struct AppStoreSource {
    client: Client,
    base_url: Url,
    search_limit: usize,
}

impl AppStoreSource {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: config.http_client()?,
            base_url: Url::parse(&config.app_store_url)?,
            search_limit: config.search_limit,
        })
    }

    fn search_url(&self, app_name: &str) -> Result<Url, SourceError> {
        let mut url = self.base_url.join("search")?;
        url.query_pairs_mut()
            .append_pair("term", app_name)
            .append_pair("entity", "software")
            .append_pair("limit", &self.search_limit.to_string());
        Ok(url)
    }
}

#[async_trait]
impl AppSource for AppStoreSource {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    async fn fetch(&self, app_name: &str) -> Result<Option<AppRecord>, SourceError> {
        let url = self.search_url(app_name)?;
        debug!(url = %url, "Searching App Store");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }
        let body = response.text().await?;
        let payload: Value =
            serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))?;

        let results = match payload.get("results").and_then(Value::as_array) {
            Some(results) if !results.is_empty() => results,
            _ => {
                info!(app_name = %app_name, "No App Store results");
                return Ok(None);
            }
        };

        let names = results
            .iter()
            .map(|item| item.get("trackName").and_then(Value::as_str).unwrap_or(""));
        let best = match best_match(app_name, names) {
            Some(idx) => &results[idx],
            None => return Ok(None),
        };

        Ok(Some(record_from_item(best, Utc::now())))
    }
}

/// Flatten one search result; day counts are relative to `now`
pub fn record_from_item(item: &Value, now: DateTime<Utc>) -> AppRecord {
    let rating = number(item, "averageUserRating");
    let description = item
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();

    AppRecord::new()
        .with("app_id", item.get("trackId").map(value_to_text))
        .with("app_name", text(item, "trackName"))
        .with("rating", rating)
        .with("total_ratings", number(item, "userRatingCount"))
        .with("price", number(item, "price"))
        .with("size_mb", number(item, "fileSizeBytes").map(|b| b / 1e6).unwrap_or(0.0))
        .with("category", text(item, "primaryGenreName"))
        .with("developer", text(item, "artistName"))
        .with(
            "has_in_app_purchases",
            description.contains(IN_APP_PURCHASE_MARKER),
        )
        .with("days_since_release", days_since(item, "releaseDate", now))
        .with(
            "days_since_last_update",
            days_since(item, "currentVersionReleaseDate", now),
        )
        .with("positive_sentiment_ratio", sentiment_from_rating(rating))
}

/// Numeric field; the API sends some sizes as strings
fn number(item: &Value, key: &str) -> Option<f64> {
    match item.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(item: &Value, key: &str) -> FeatureValue {
    item.get(key)
        .and_then(Value::as_str)
        .map(FeatureValue::from)
        .unwrap_or(FeatureValue::Missing)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn days_since(item: &Value, key: &str, now: DateTime<Utc>) -> Option<f64> {
    let raw = item.get(key).and_then(Value::as_str)?;
    let date = DateTime::parse_from_rfc3339(raw).ok()?;
    Some(now.signed_duration_since(date.with_timezone(&Utc)).num_days() as f64)
}
