//! Symbol-keyed market cache.
//!
//! A lifecycle-scoped store for the configured watchlist, filled once at
//! startup and refreshed by an explicit background schedule. Bounded by
//! construction: only watchlist symbols are ever inserted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::market_data::MarketDataSource;
use crate::types::{Bar, MarketSnapshot};

#[derive(Default)]
pub struct MarketCache {
    series: RwLock<HashMap<String, Vec<Bar>>>,
}

impl MarketCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch every watchlist symbol once. A failing symbol keeps whatever
    /// the cache already held for it.
    pub async fn refresh(
        &self,
        provider: &dyn MarketDataSource,
        symbols: &[String],
        interval: &str,
        limit: u32,
    ) {
        for symbol in symbols {
            match provider.fetch(symbol, interval, limit).await {
                Ok(bars) => {
                    info!("cached {} bars for {symbol}", bars.len());
                    self.series.write().await.insert(symbol.clone(), bars);
                }
                Err(e) => warn!("cache refresh for {symbol} failed: {e}"),
            }
        }
    }

    pub async fn snapshot(&self) -> MarketSnapshot {
        self.series.read().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.series.read().await.is_empty()
    }
}

/// Periodic refresh task. The startup prefetch is the caller's first
/// explicit `refresh`; this task only handles the steady-state schedule.
pub fn spawn_refresh_task(
    cache: Arc<MarketCache>,
    provider: Arc<dyn MarketDataSource>,
    symbols: Vec<String>,
    interval: String,
    limit: u32,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // An interval's first tick fires immediately; the startup prefetch
        // already covered it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            cache
                .refresh(provider.as_ref(), &symbols, &interval, limit)
                .await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::indicators::testutil::bars_from_closes;
    use futures::future::BoxFuture;

    struct ScriptedProvider {
        bars: Option<Vec<Bar>>,
    }

    impl MarketDataSource for ScriptedProvider {
        fn fetch<'a>(
            &'a self,
            symbol: &'a str,
            _interval: &'a str,
            _limit: u32,
        ) -> BoxFuture<'a, Result<Vec<Bar>, EngineError>> {
            let result = match &self.bars {
                Some(bars) => Ok(bars.clone()),
                None => Err(EngineError::DataUnavailable {
                    symbol: symbol.to_string(),
                }),
            };
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn refresh_fills_snapshot() {
        let cache = MarketCache::new();
        let provider = ScriptedProvider {
            bars: Some(bars_from_closes(&[1.0, 2.0, 3.0])),
        };
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];

        assert!(cache.is_empty().await);
        cache.refresh(&provider, &symbols, "1d", 100).await;

        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["BTCUSDT"].len(), 3);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_series() {
        let cache = MarketCache::new();
        let symbols = vec!["BTCUSDT".to_string()];

        let good = ScriptedProvider {
            bars: Some(bars_from_closes(&[1.0, 2.0])),
        };
        cache.refresh(&good, &symbols, "1d", 100).await;

        let bad = ScriptedProvider { bars: None };
        cache.refresh(&bad, &symbols, "1d", 100).await;

        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot["BTCUSDT"].len(), 2, "stale data beats no data");
    }
}
