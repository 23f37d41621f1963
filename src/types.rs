use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::indicators::RawIndicatorSpec;
use crate::live::ConnectionManager;
use crate::market_cache::MarketCache;
use crate::market_data::MarketDataSource;
use crate::signals::IndicatorDetail;

/// One OHLCV candle. Timestamps are unique and ascending within a series;
/// the wire format is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

/// A trade event emitted by the live trade manager. `profit` is the
/// percentage return of the leg closed by this event, 0 for a fresh entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub signal: i8,
    pub trade_type: TradeType,
    pub profit: f64,
    pub indicator_detail: IndicatorDetail,
}

/// Messages sent to a WebSocket client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    Subscribed {
        connection_id: Uuid,
        symbol: String,
        interval: String,
        indicators: Vec<String>,
    },
    TradeEvent(TradeEvent),
    Error {
        message: String,
    },
}

/// Outbound frame for a connection's writer task. Sessions and the
/// keep-alive loop only know this enum; the transport layer maps it onto
/// actual WebSocket frames.
#[derive(Debug, Clone)]
pub enum Outbound {
    Data(WsMessage),
    Ping,
}

/// Messages received from a WebSocket client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    pub action: String,
    pub symbol: Option<String>,
    pub interval: Option<String>,
    #[serde(default)]
    pub indicators: Vec<RawIndicatorSpec>,
}

/// Request body for POST /api/run-backtest. The original frontend sends
/// lists, but exactly one symbol and one timeframe are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct BacktestRequest {
    pub symbols: Vec<String>,
    pub timeframes: Vec<String>,
    pub indicators: Vec<RawIndicatorSpec>,
}

/// Runtime settings shared by the handlers, from CLI flags.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Kline interval used when a client does not request one.
    pub default_interval: String,
    /// Number of bars fetched per provider call.
    pub fetch_limit: u32,
    /// Starting balance for backtests.
    pub initial_balance: f64,
}

/// Shared application state.
pub struct AppState {
    pub provider: Arc<dyn MarketDataSource>,
    pub cache: Arc<MarketCache>,
    pub connections: ConnectionManager,
    pub settings: EngineSettings,
}

/// Snapshot of the market cache as returned by GET /api/market-data.
pub type MarketSnapshot = HashMap<String, Vec<Bar>>;
