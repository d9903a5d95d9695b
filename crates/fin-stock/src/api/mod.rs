//! API clients for market data and news search

pub mod serpapi;
pub mod yahoo;

use crate::error::Result;
use crate::market::{
    CompanyInfo, Dividend, Financials, Holders, NewsItem, Period, PriceHistory,
    RecommendationTrend,
};
use async_trait::async_trait;

pub use serpapi::{SearchLocale, SerpApiClient};
pub use yahoo::YahooFinanceClient;

/// Source of prices, fundamentals and provider-native news
///
/// Each method is one independently fallible call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily bars covering `period`, candles in UTC
    async fn price_history(&self, ticker: &str, period: Period) -> Result<PriceHistory>;

    /// Profile and key statistics
    async fn company_info(&self, ticker: &str) -> Result<CompanyInfo>;

    /// Annual income statement, balance sheet and cash flow
    async fn financials(&self, ticker: &str) -> Result<Financials>;

    async fn holders(&self, ticker: &str) -> Result<Holders>;

    async fn recommendations(&self, ticker: &str) -> Result<Vec<RecommendationTrend>>;

    async fn dividends(&self, ticker: &str) -> Result<Vec<Dividend>>;

    /// Latest headlines from the provider's own feed
    async fn news(&self, ticker: &str, count: usize) -> Result<Vec<NewsItem>>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// External news search
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSearch: Send + Sync {
    /// Search recent news; the key is supplied per call since it lives in the session
    async fn search(&self, query: &str, api_key: &str, limit: usize) -> Result<Vec<NewsItem>>;

    fn name(&self) -> &str;
}
