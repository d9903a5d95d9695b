//! Session memo cache for market snapshots

use crate::market::{MarketSnapshot, Period};
use cached::{Cached, UnboundCache};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cache key: one snapshot per (ticker, period)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub ticker: String,
    pub period: Period,
}

impl SnapshotKey {
    pub fn new(ticker: impl Into<String>, period: Period) -> Self {
        Self {
            ticker: ticker.into(),
            period,
        }
    }
}

/// Unbounded snapshot cache living as long as the session
///
/// Entries never expire; the session clears the cache when the ticker
/// changes. Clones share the same underlying map.
#[derive(Clone)]
pub struct SnapshotCache {
    cache: Arc<RwLock<UnboundCache<SnapshotKey, Arc<MarketSnapshot>>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(UnboundCache::new())),
        }
    }

    /// Look up a snapshot
    pub async fn get(&self, key: &SnapshotKey) -> Option<Arc<MarketSnapshot>> {
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    /// Store a snapshot, replacing any previous one for the key
    pub async fn insert(&self, key: SnapshotKey, snapshot: Arc<MarketSnapshot>) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, snapshot);
    }

    /// Return the cached snapshot or run `fetcher` and cache its result
    ///
    /// Errors are not cached, so a failed fetch is retried on the next call.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: SnapshotKey,
        fetcher: F,
    ) -> Result<Arc<MarketSnapshot>, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<MarketSnapshot, E>>,
    {
        if let Some(snapshot) = self.get(&key).await {
            tracing::debug!(ticker = %key.ticker, period = %key.period, "Cache hit");
            return Ok(snapshot);
        }

        tracing::debug!(ticker = %key.ticker, period = %key.period, "Cache miss");

        let snapshot = Arc::new(fetcher().await?);
        self.insert(key, Arc::clone(&snapshot)).await;

        Ok(snapshot)
    }

    /// Drop every cached snapshot
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{CompanyInfo, Financials, Holders};
    use chrono::Utc;

    fn snapshot(ticker: &str, period: Period) -> MarketSnapshot {
        MarketSnapshot {
            ticker: ticker.to_string(),
            period,
            fetched_at: Utc::now(),
            timezone: "America/New_York".to_string(),
            candles: Vec::new(),
            info: CompanyInfo::default(),
            financials: Financials::default(),
            holders: Holders::default(),
            recommendations: Vec::new(),
            dividends: Vec::new(),
            news: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_get_or_fetch_returns_same_arc() {
        let cache = SnapshotCache::new();
        let key = SnapshotKey::new("AAPL", Period::OneYear);
        let mut calls = 0;

        let first = cache
            .get_or_fetch(key.clone(), || {
                calls += 1;
                async { Ok::<_, String>(snapshot("AAPL", Period::OneYear)) }
            })
            .await
            .unwrap();

        let second = cache
            .get_or_fetch(key, || {
                calls += 1;
                async { Ok::<_, String>(snapshot("AAPL", Period::OneYear)) }
            })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = SnapshotCache::new();
        let key = SnapshotKey::new("ZZZZ", Period::OneMonth);

        let result = cache
            .get_or_fetch(key.clone(), || async { Err::<MarketSnapshot, _>("down") })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_default_clones_share_storage() {
        let cache = SnapshotCache::default();
        let other = cache.clone();
        other
            .insert(
                SnapshotKey::new("MSFT", Period::SixMonths),
                Arc::new(snapshot("MSFT", Period::SixMonths)),
            )
            .await;
        assert!(!cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_periods_are_distinct_keys() {
        let cache = SnapshotCache::new();
        cache
            .insert(
                SnapshotKey::new("AAPL", Period::OneYear),
                Arc::new(snapshot("AAPL", Period::OneYear)),
            )
            .await;
        cache
            .insert(
                SnapshotKey::new("AAPL", Period::FiveYears),
                Arc::new(snapshot("AAPL", Period::FiveYears)),
            )
            .await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&SnapshotKey::new("AAPL", Period::All)).await.is_none());

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
