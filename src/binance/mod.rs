//! Binance spot market-data provider.

pub mod client;
pub mod models;

pub use client::{BinanceClient, DEFAULT_BASE_URL};
