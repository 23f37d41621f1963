//! Market-data provider contract consumed by the core.
//!
//! The core never names a vendor: anything that can return an ascending,
//! duplicate-free OHLCV window for a symbol/interval/limit can drive the
//! cache, the backtest endpoint, and live sessions.

use futures::future::BoxFuture;

use crate::error::EngineError;
use crate::types::Bar;

pub trait MarketDataSource: Send + Sync {
    /// Fetch up to `limit` bars in ascending timestamp order. An empty or
    /// unreachable result is `DataUnavailable`.
    fn fetch<'a>(
        &'a self,
        symbol: &'a str,
        interval: &'a str,
        limit: u32,
    ) -> BoxFuture<'a, Result<Vec<Bar>, EngineError>>;
}
