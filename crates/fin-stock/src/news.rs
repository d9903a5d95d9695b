//! News aggregation: provider headlines plus external search

use crate::api::NewsSearch;
use crate::error::StockError;
use crate::market::{MarketSnapshot, NewsItem};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Items shown per source
pub const DISPLAY_LIMIT: usize = 5;

/// Why search results are missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchNote {
    /// No search key in the session; search was skipped
    MissingKey,
    /// The search call failed
    Failed(String),
}

impl SearchNote {
    pub fn is_failure(&self) -> bool {
        matches!(self, SearchNote::Failed(_))
    }
}

impl fmt::Display for SearchNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchNote::MissingKey => {
                f.write_str("Search API key not provided; showing provider news only")
            }
            SearchNote::Failed(reason) => write!(f, "News search failed: {reason}"),
        }
    }
}

/// Merged news for one snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsDigest {
    pub provider: Vec<NewsItem>,
    pub search: Vec<NewsItem>,
    pub search_note: Option<SearchNote>,
}

impl NewsDigest {
    pub fn is_empty(&self) -> bool {
        self.provider.is_empty() && self.search.is_empty()
    }
}

/// Search query for a company
pub fn build_query(company: &str, ticker: &str) -> String {
    format!("\"{company}\" OR \"{ticker}\" financial news")
}

/// Drop unusable links, fill placeholders and cap the list
pub fn clean_items(items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter(|item| {
            let link = item.link.trim();
            !link.is_empty() && link != "#"
        })
        .map(|mut item| {
            if item.title.trim().is_empty() {
                item.title = "(untitled)".to_string();
            }
            if item.publisher.trim().is_empty() {
                item.publisher = "Unknown source".to_string();
            }
            item
        })
        .take(limit)
        .collect()
}

/// Combines provider news with search results
pub struct NewsAggregator {
    search: Arc<dyn NewsSearch>,
    timeout: Duration,
    search_results: usize,
}

impl NewsAggregator {
    pub fn new(search: Arc<dyn NewsSearch>, timeout: Duration, search_results: usize) -> Self {
        Self {
            search,
            timeout,
            search_results,
        }
    }

    /// Build the digest; never fails, search problems become a note
    pub async fn aggregate(&self, snapshot: &MarketSnapshot, search_key: Option<&str>) -> NewsDigest {
        let provider = clean_items(snapshot.news.clone(), DISPLAY_LIMIT);

        let Some(key) = search_key.filter(|k| !k.trim().is_empty()) else {
            info!(ticker = %snapshot.ticker, "Search key missing, skipping news search");
            return NewsDigest {
                provider,
                search: Vec::new(),
                search_note: Some(SearchNote::MissingKey),
            };
        };

        let query = build_query(snapshot.company_name(), &snapshot.ticker);
        let outcome = tokio::time::timeout(
            self.timeout,
            self.search.search(&query, key, self.search_results),
        )
        .await
        .unwrap_or_else(|_| {
            Err(StockError::Timeout {
                operation: "news search".to_string(),
                after: self.timeout,
            })
        });

        match outcome {
            Ok(items) => NewsDigest {
                provider,
                search: clean_items(items, DISPLAY_LIMIT),
                search_note: None,
            },
            Err(e) => {
                warn!(ticker = %snapshot.ticker, error = %e, provider = self.search.name(), "News search failed");
                NewsDigest {
                    provider,
                    search: Vec::new(),
                    search_note: Some(SearchNote::Failed(e.to_string())),
                }
            }
        }
    }
}
