//! Wire models for the Binance klines endpoint.
//!
//! Binance returns each kline as a 12-element JSON array with
//! string-encoded decimal fields.

use anyhow::{Context, Result};
use chrono::TimeZone;
use serde::Deserialize;

use crate::types::Bar;

#[derive(Debug, Clone, Deserialize)]
pub struct Kline(
    pub i64,    // open time (ms)
    pub String, // open
    pub String, // high
    pub String, // low
    pub String, // close
    pub String, // volume
    pub i64,    // close time (ms)
    pub String, // quote asset volume
    pub u64,    // number of trades
    pub String, // taker buy base volume
    pub String, // taker buy quote volume
    pub String, // unused
);

impl Kline {
    pub fn into_bar(self) -> Result<Bar> {
        let timestamp = chrono::Utc
            .timestamp_millis_opt(self.0)
            .single()
            .with_context(|| format!("kline open time {} out of range", self.0))?;
        Ok(Bar {
            timestamp,
            open: parse_decimal(&self.1, "open")?,
            high: parse_decimal(&self.2, "high")?,
            low: parse_decimal(&self.3, "low")?,
            close: parse_decimal(&self.4, "close")?,
            volume: parse_decimal(&self.5, "volume")?,
        })
    }
}

fn parse_decimal(raw: &str, field: &str) -> Result<f64> {
    raw.parse::<f64>()
        .with_context(|| format!("kline {field} field is not a number: {raw:?}"))
}
