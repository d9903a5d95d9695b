//! Market data fetcher: one memoized snapshot per (ticker, period)

use crate::api::MarketDataProvider;
use crate::cache::{SnapshotCache, SnapshotKey};
use crate::error::{Result, StockError};
use crate::market::{Candle, MarketSnapshot, Period};
use chrono::Utc;
use chrono_tz::Tz;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const FALLBACK_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Fetches snapshots through the session cache
pub struct MarketDataFetcher {
    provider: Arc<dyn MarketDataProvider>,
    cache: SnapshotCache,
    timeout: Duration,
    news_count: usize,
}

impl MarketDataFetcher {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        cache: SnapshotCache,
        timeout: Duration,
        news_count: usize,
    ) -> Self {
        Self {
            provider,
            cache,
            timeout,
            news_count,
        }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Return the snapshot for `(ticker, period)`, fetching it on a cache miss
    ///
    /// Fails with `DataUnavailable` when the price history cannot be
    /// obtained or is empty. Secondary sections never fail the fetch.
    pub async fn fetch(&self, ticker: &str, period: Period) -> Result<Arc<MarketSnapshot>> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(StockError::InvalidInput(
                "ticker must not be empty".to_string(),
            ));
        }

        self.cache
            .get_or_fetch(SnapshotKey::new(ticker, period), || {
                self.fetch_uncached(ticker, period)
            })
            .await
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| StockError::Timeout {
                operation: operation.to_string(),
                after: self.timeout,
            })?
    }

    /// Run a secondary call; failure leaves the section empty and records a warning
    async fn section<T: Default>(
        &self,
        name: &str,
        call: impl Future<Output = Result<T>>,
        warnings: &mut Vec<String>,
    ) -> T {
        match self.bounded(name, call).await {
            Ok(value) => value,
            Err(e) => {
                warn!(section = name, error = %e, "Section unavailable");
                warnings.push(format!("{name} unavailable: {e}"));
                T::default()
            }
        }
    }

    async fn fetch_uncached(&self, ticker: &str, period: Period) -> Result<MarketSnapshot> {
        info!(ticker, %period, provider = self.provider.name(), "Fetching market data");

        let history = self
            .bounded("price history", self.provider.price_history(ticker, period))
            .await
            .map_err(|e| match e {
                StockError::DataUnavailable { .. } => e,
                other => StockError::data_unavailable(ticker, other.to_string()),
            })?;

        let mut warnings = Vec::new();
        let tz = resolve_timezone(history.timezone.as_deref(), &mut warnings);
        let candles = normalize_candles(history.candles, tz, period);

        if candles.is_empty() {
            return Err(StockError::data_unavailable(
                ticker,
                format!("no price history for period {period}"),
            ));
        }
        volume_warnings(&candles, &mut warnings);

        let info = self
            .section("Company profile", self.provider.company_info(ticker), &mut warnings)
            .await;
        let financials = self
            .section("Financial statements", self.provider.financials(ticker), &mut warnings)
            .await;
        let holders = self
            .section("Holders", self.provider.holders(ticker), &mut warnings)
            .await;
        let recommendations = self
            .section(
                "Recommendations",
                self.provider.recommendations(ticker),
                &mut warnings,
            )
            .await;
        let dividends = self
            .section("Dividends", self.provider.dividends(ticker), &mut warnings)
            .await;
        let news = self
            .section(
                "Provider news",
                self.provider.news(ticker, self.news_count),
                &mut warnings,
            )
            .await;

        info!(
            ticker,
            bars = candles.len(),
            warnings = warnings.len(),
            "Snapshot assembled"
        );

        Ok(MarketSnapshot {
            ticker: ticker.to_string(),
            period,
            fetched_at: Utc::now(),
            timezone: tz.name().to_string(),
            candles,
            info,
            financials,
            holders,
            recommendations,
            dividends,
            news,
            warnings,
        })
    }
}

/// Exchange timezone, falling back to New York when unreported and UTC when unknown
fn resolve_timezone(reported: Option<&str>, warnings: &mut Vec<String>) -> Tz {
    match reported {
        Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
            warnings.push(format!(
                "Unrecognized exchange timezone '{name}'; timestamps shown in UTC"
            ));
            Tz::UTC
        }),
        None => {
            warnings.push(format!(
                "Exchange timezone not reported; assuming {}",
                FALLBACK_TIMEZONE.name()
            ));
            FALLBACK_TIMEZONE
        }
    }
}

/// Re-zone to the exchange, sort, drop duplicates and bars outside the period
fn normalize_candles(candles: Vec<Candle>, tz: Tz, period: Period) -> Vec<Candle> {
    let start = period.start_from(&Utc::now().with_timezone(&tz));

    let mut candles: Vec<Candle> = candles
        .into_iter()
        .filter(|c| c.close.is_finite())
        .map(|c| Candle {
            timestamp: c.timestamp.with_timezone(&tz).fixed_offset(),
            ..c
        })
        .filter(|c| start.as_ref().is_none_or(|s| c.timestamp >= *s))
        .collect();

    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    candles
}

fn volume_warnings(candles: &[Candle], warnings: &mut Vec<String>) {
    if candles.iter().all(|c| c.volume.is_none()) {
        warnings.push("Volume data missing".to_string());
    } else if candles.iter().all(|c| c.volume.unwrap_or(0) == 0) {
        warnings.push("Volume is zero for every bar".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockMarketDataProvider;
    use crate::market::{CompanyInfo, Financials, PriceHistory};
    use chrono::Duration as ChronoDuration;

    fn bars(days: i64, volume: Option<u64>) -> Vec<Candle> {
        let now = Utc::now();
        (0..days)
            .rev()
            .map(|d| {
                let close = 100.0 + d as f64;
                Candle {
                    timestamp: (now - ChronoDuration::days(d)).fixed_offset(),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume,
                }
            })
            .collect()
    }

    fn healthy_mock(history_calls: usize) -> MockMarketDataProvider {
        let mut mock = MockMarketDataProvider::new();
        mock.expect_name().return_const("mock".to_string());
        mock.expect_price_history()
            .times(history_calls)
            .returning(|_, _| {
                Ok(PriceHistory {
                    candles: bars(10, Some(1_000)),
                    timezone: Some("America/New_York".to_string()),
                })
            });
        mock.expect_company_info()
            .returning(|_| Ok(CompanyInfo::default()));
        mock.expect_financials().returning(|_| Ok(Financials::default()));
        mock.expect_holders().returning(|_| Ok(Default::default()));
        mock.expect_recommendations().returning(|_| Ok(Vec::new()));
        mock.expect_dividends().returning(|_| Ok(Vec::new()));
        mock.expect_news().returning(|_, _| Ok(Vec::new()));
        mock
    }

    fn fetcher(mock: MockMarketDataProvider) -> MarketDataFetcher {
        MarketDataFetcher::new(
            Arc::new(mock),
            SnapshotCache::new(),
            Duration::from_secs(5),
            10,
        )
    }

    #[tokio::test]
    async fn test_second_fetch_hits_cache() {
        let fetcher = fetcher(healthy_mock(1));

        let first = fetcher.fetch("AAPL", Period::OneYear).await.unwrap();
        let second = fetcher.fetch("AAPL", Period::OneYear).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.timezone, "America/New_York");
        assert_eq!(first.candles.len(), 10);
        assert!(first.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_empty_ticker_never_calls_provider() {
        let mut mock = MockMarketDataProvider::new();
        mock.expect_price_history().never();
        let fetcher = fetcher(mock);

        let err = fetcher.fetch("   ", Period::OneYear).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_empty_history_is_data_unavailable() {
        let mut mock = MockMarketDataProvider::new();
        mock.expect_name().return_const("mock".to_string());
        mock.expect_price_history()
            .returning(|_, _| Ok(PriceHistory::default()));
        mock.expect_company_info().never();
        let fetcher = fetcher(mock);

        let err = fetcher.fetch("ZZZZ", Period::OneMonth).await.unwrap_err();
        assert!(matches!(err, StockError::DataUnavailable { .. }));
        assert!(fetcher.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_provider_error_is_data_unavailable() {
        let mut mock = MockMarketDataProvider::new();
        mock.expect_name().return_const("mock".to_string());
        mock.expect_price_history()
            .returning(|_, _| Err(StockError::YahooFinanceError("No data found".to_string())));
        let fetcher = fetcher(mock);

        let err = fetcher.fetch("ZZZZ", Period::OneMonth).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DataUnavailable);
        assert!(err.to_string().contains("No data found"));
    }

    #[tokio::test]
    async fn test_secondary_failure_degrades_to_warning() {
        let mut mock = MockMarketDataProvider::new();
        mock.expect_name().return_const("mock".to_string());
        mock.expect_price_history().returning(|_, _| {
            Ok(PriceHistory {
                candles: bars(5, None),
                timezone: None,
            })
        });
        mock.expect_company_info()
            .returning(|_| Err(StockError::ApiError("401".to_string())));
        mock.expect_financials().returning(|_| Ok(Financials::default()));
        mock.expect_holders().returning(|_| Ok(Default::default()));
        mock.expect_recommendations().returning(|_| Ok(Vec::new()));
        mock.expect_dividends().returning(|_| Ok(Vec::new()));
        mock.expect_news().returning(|_, _| Ok(Vec::new()));
        let fetcher = fetcher(mock);

        let snapshot = fetcher.fetch("AAPL", Period::OneMonth).await.unwrap();
        assert!(snapshot.info.is_empty());
        assert_eq!(snapshot.timezone, "America/New_York");
        assert!(snapshot.warnings.iter().any(|w| w.starts_with("Company profile unavailable")));
        assert!(snapshot.warnings.iter().any(|w| w == "Volume data missing"));
        assert!(snapshot.warnings.iter().any(|w| w.contains("not reported")));
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_utc() {
        let mut warnings = Vec::new();
        assert_eq!(resolve_timezone(Some("Mars/Olympus"), &mut warnings), Tz::UTC);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_normalize_trims_sorts_and_dedups() {
        let mut candles = bars(60, Some(5));
        candles.reverse();
        let dup = candles[0].clone();
        candles.push(dup);

        let out = normalize_candles(candles, chrono_tz::Asia::Tokyo, Period::OneMonth);
        assert!(out.len() <= 31);
        assert!(out.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(out[0].timestamp.offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_zero_volume_warning() {
        let mut warnings = Vec::new();
        volume_warnings(&bars(3, Some(0)), &mut warnings);
        assert_eq!(warnings, vec!["Volume is zero for every bar".to_string()]);
    }

    struct SlowProvider;

    #[async_trait::async_trait]
    impl MarketDataProvider for SlowProvider {
        async fn price_history(&self, _: &str, _: Period) -> Result<PriceHistory> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(PriceHistory::default())
        }
        async fn company_info(&self, _: &str) -> Result<CompanyInfo> {
            Ok(CompanyInfo::default())
        }
        async fn financials(&self, _: &str) -> Result<Financials> {
            Ok(Financials::default())
        }
        async fn holders(&self, _: &str) -> Result<crate::market::Holders> {
            Ok(Default::default())
        }
        async fn recommendations(&self, _: &str) -> Result<Vec<crate::market::RecommendationTrend>> {
            Ok(Vec::new())
        }
        async fn dividends(&self, _: &str) -> Result<Vec<crate::market::Dividend>> {
            Ok(Vec::new())
        }
        async fn news(&self, _: &str, _: usize) -> Result<Vec<crate::market::NewsItem>> {
            Ok(Vec::new())
        }
        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_timeout_is_data_unavailable() {
        let fetcher = MarketDataFetcher::new(
            Arc::new(SlowProvider),
            SnapshotCache::new(),
            Duration::from_millis(20),
            10,
        );

        let err = fetcher.fetch("AAPL", Period::OneYear).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DataUnavailable);
        assert!(err.to_string().contains("timed out"));
    }
}
