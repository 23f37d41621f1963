//! HTTP client for the public Binance spot klines endpoint.
//!
//! No authentication: the klines endpoint is public. All transport and
//! decoding failures surface to the core as `DataUnavailable`, which live
//! sessions treat as retryable.

use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::models::Kline;
use crate::error::EngineError;
use crate::market_data::MarketDataSource;
use crate::types::Bar;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
        }
    }

    async fn klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Bar>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.to_ascii_uppercase()),
                ("interval", interval.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .context("failed to reach klines endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("klines request failed with status {status}: {body}");
        }

        let rows: Vec<Kline> = response
            .json()
            .await
            .context("failed to decode klines response")?;
        debug!("fetched {} klines for {symbol} {interval}", rows.len());
        rows.into_iter().map(Kline::into_bar).collect()
    }
}

impl MarketDataSource for BinanceClient {
    fn fetch<'a>(
        &'a self,
        symbol: &'a str,
        interval: &'a str,
        limit: u32,
    ) -> BoxFuture<'a, Result<Vec<Bar>, EngineError>> {
        Box::pin(async move {
            match self.klines(symbol, interval, limit).await {
                Ok(bars) if bars.is_empty() => Err(EngineError::DataUnavailable {
                    symbol: symbol.to_string(),
                }),
                Ok(bars) => Ok(bars),
                Err(e) => {
                    warn!("{symbol}: kline fetch failed: {e:#}");
                    Err(EngineError::DataUnavailable {
                        symbol: symbol.to_string(),
                    })
                }
            }
        })
    }
}
