//! SerpAPI Google News client

use super::NewsSearch;
use crate::error::{Result, StockError};
use crate::market::{NewsItem, NewsSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, instrument};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news_results: Vec<NewsResult>,
    /// Filled instead of `news_results` for some queries
    #[serde(default)]
    organic_results: Vec<NewsResult>,
    error: Option<String>,
}

impl SearchResponse {
    fn into_results(self) -> Vec<NewsResult> {
        if self.news_results.is_empty() {
            self.organic_results
        } else {
            self.news_results
        }
    }
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    title: Option<String>,
    link: Option<String>,
    source: Option<ResultSource>,
    date: Option<String>,
    iso_date: Option<String>,
}

/// `source` is an object in current responses and a bare string in older ones
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResultSource {
    Named { name: Option<String> },
    Plain(String),
}

impl ResultSource {
    fn into_name(self) -> Option<String> {
        match self {
            ResultSource::Named { name } => name,
            ResultSource::Plain(name) => Some(name),
        }
    }
}

impl NewsResult {
    fn published(&self) -> Option<DateTime<Utc>> {
        if let Some(iso) = &self.iso_date {
            if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
                return Some(dt.with_timezone(&Utc));
            }
        }
        // e.g. "11/15/2024, 08:00 AM, +0000 UTC"
        let date = self.date.as_deref()?.trim_end_matches(" UTC");
        DateTime::parse_from_str(date, "%m/%d/%Y, %I:%M %p, %z")
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn into_item(self) -> NewsItem {
        let published = self.published();
        NewsItem {
            title: self.title.unwrap_or_default(),
            link: self.link.unwrap_or_default(),
            publisher: self
                .source
                .and_then(ResultSource::into_name)
                .unwrap_or_default(),
            published,
            source: NewsSource::Search,
        }
    }
}

/// Interface language (`hl`) and country (`gl`) sent with each search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLocale {
    pub language: String,
    pub country: String,
}

impl SearchLocale {
    pub fn new(language: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            country: country.into(),
        }
    }
}

impl Default for SearchLocale {
    fn default() -> Self {
        Self::new("en", "us")
    }
}

/// SerpAPI client with client-side rate limiting
pub struct SerpApiClient {
    client: Client,
    base_url: String,
    rate_limiter: SharedRateLimiter,
    locale: SearchLocale,
}

impl SerpApiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - SerpAPI host, normally `https://serpapi.com`
    /// * `rate_limit` - Requests per minute
    pub fn new(base_url: impl Into<String>, rate_limit: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));

        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            locale: SearchLocale::default(),
        }
    }

    /// Search in the given language and country
    pub fn with_locale(mut self, locale: SearchLocale) -> Self {
        self.locale = locale;
        self
    }

    fn query_params<'a>(
        &'a self,
        query: &'a str,
        api_key: &'a str,
        num: &'a str,
    ) -> [(&'a str, &'a str); 6] {
        [
            ("engine", "google_news"),
            ("q", query),
            ("api_key", api_key),
            ("num", num),
            ("hl", self.locale.language.as_str()),
            ("gl", self.locale.country.as_str()),
        ]
    }
}

#[async_trait]
impl NewsSearch for SerpApiClient {
    #[instrument(skip(self, api_key), fields(provider = "serpapi"))]
    async fn search(&self, query: &str, api_key: &str, limit: usize) -> Result<Vec<NewsItem>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/search.json", self.base_url);
        let num = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&self.query_params(query, api_key, &num))
            .send()
            .await
            .map_err(|e| StockError::ApiError(format!("SerpAPI request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StockError::RateLimitExceeded {
                provider: "SerpAPI".to_string(),
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| StockError::ApiError(format!("Failed to parse SerpAPI response: {e}")))?;

        if let Some(error) = body.error {
            return Err(StockError::ApiError(format!("SerpAPI error {status}: {error}")));
        }
        if !status.is_success() {
            return Err(StockError::ApiError(format!("SerpAPI error {status}")));
        }

        let items: Vec<NewsItem> = body
            .into_results()
            .into_iter()
            .take(limit)
            .map(NewsResult::into_item)
            .collect();

        debug!(results = items.len(), "SerpAPI search complete");
        Ok(items)
    }

    fn name(&self) -> &str {
        "SerpAPI"
    }
}
