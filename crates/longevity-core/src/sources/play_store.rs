//! Play Store adapter scraping the public web catalog
//!
//! The catalog has no public API and no release dates, so update and
//! release ages are coarse estimates derived from the rating.

use super::{sentiment_from_rating, AppSource, SourceConfig, SourceError};
use crate::models::{AppRecord, FeatureValue, Platform};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use tracing::{debug, info};
use url::Url;

/// Ratings above this are assumed to belong to actively maintained apps
const ACTIVE_RATING_THRESHOLD: f64 = 4.0;

const RECENT_UPDATE_DAYS: f64 = 30.0;
const STALE_UPDATE_DAYS: f64 = 90.0;
const ASSUMED_RELEASE_DAYS: f64 = 365.0;

const UNKNOWN: &str = "Unknown";

static PACKAGE_ID: OnceLock<Regex> = OnceLock::new();
static RATING: OnceLock<Regex> = OnceLock::new();
static SIZE: OnceLock<Regex> = OnceLock::new();

fn package_id_re() -> &'static Regex {
    PACKAGE_ID.get_or_init(|| Regex::new(r"id=([^&]+)").expect("valid package regex"))
}

fn rating_re() -> &'static Regex {
    RATING.get_or_init(|| Regex::new(r"([\d.]+) out of").expect("valid rating regex"))
}

fn size_re() -> &'static Regex {
    SIZE.get_or_init(|| Regex::new(r"(?i)([\d.]+)\s*(mb|gb)").expect("valid size regex"))
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("selector `{}`: {:?}", css, e)))
}

/// Looks apps up through the web search and details pages
pub struct PlayStoreSource {
    client: Client,
    base_url: Url,
}

impl PlayStoreSource {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: config.http_client()?,
            base_url: Url::parse(&config.play_store_url)?,
        })
    }

    async fn get_page(&self, url: Url) -> Result<Option<String>, SourceError> {
        debug!(url = %url, "Fetching Play Store page");
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            info!(status = response.status().as_u16(), "Play Store page unavailable");
            return Ok(None);
        }
        Ok(Some(response.text().await?))
    }
}

#[async_trait]
impl AppSource for PlayStoreSource {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    async fn fetch(&self, app_name: &str) -> Result<Option<AppRecord>, SourceError> {
        let mut search = self.base_url.join("/store/search")?;
        search
            .query_pairs_mut()
            .append_pair("q", app_name)
            .append_pair("c", "apps");

        let page = match self.get_page(search).await? {
            Some(page) => page,
            None => return Ok(None),
        };
        let package = match first_package_id(&page)? {
            Some(package) => package,
            None => {
                info!(app_name = %app_name, "No Play Store results");
                return Ok(None);
            }
        };

        let mut details = self.base_url.join("/store/apps/details")?;
        details.query_pairs_mut().append_pair("id", &package);

        match self.get_page(details).await? {
            Some(page) => Ok(Some(parse_details(&page, app_name, &package)?)),
            None => Ok(None),
        }
    }
}

/// Package id of the first app linked from a search results page
pub fn first_package_id(html: &str) -> Result<Option<String>, SourceError> {
    let document = Html::parse_document(html);
    let links = selector(r#"a[href^="/store/apps/details?id="]"#)?;

    Ok(document
        .select(&links)
        .next()
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| package_id_re().captures(href))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string()))
}

/// Flatten a details page. Anything not found on the page stays missing.
pub fn parse_details(html: &str, query: &str, package: &str) -> Result<AppRecord, SourceError> {
    let document = Html::parse_document(html);
    let title = selector("h1")?;
    let rating_badge = selector(r#"div[role="img"][aria-label*="rating"]"#)?;
    let info_blocks = selector("div.bARER")?;

    let name = document
        .select(&title)
        .next()
        .map(|h| h.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| query.to_string());

    let rating = document
        .select(&rating_badge)
        .next()
        .and_then(|badge| badge.value().attr("aria-label"))
        .and_then(|label| rating_re().captures(label))
        .and_then(|caps| caps[1].parse::<f64>().ok());

    let mut in_app_purchases = false;
    let mut size_mb = None;
    for block in document.select(&info_blocks) {
        let text = block.text().collect::<String>().to_lowercase();
        if text.contains("in-app purchases") {
            in_app_purchases = true;
        } else if let Some(caps) = size_re().captures(&text) {
            if let Ok(size) = caps[1].parse::<f64>() {
                size_mb = Some(if &caps[2] == "gb" { size * 1000.0 } else { size });
            }
        }
    }

    let (last_update, release) = match rating {
        Some(r) if r > ACTIVE_RATING_THRESHOLD => {
            (Some(RECENT_UPDATE_DAYS), Some(ASSUMED_RELEASE_DAYS))
        }
        Some(_) => (Some(STALE_UPDATE_DAYS), Some(ASSUMED_RELEASE_DAYS)),
        None => (None, None),
    };

    Ok(AppRecord::new()
        .with("app_id", package)
        .with("app_name", name)
        .with("category", UNKNOWN)
        .with("developer", UNKNOWN)
        .with("has_in_app_purchases", in_app_purchases)
        .with("rating", rating)
        .with("total_ratings", FeatureValue::Missing)
        .with("price", 0.0)
        .with("size_mb", size_mb)
        .with("positive_sentiment_ratio", sentiment_from_rating(rating))
        .with("days_since_last_update", last_update)
        .with("days_since_release", release))
}
