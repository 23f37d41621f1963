// Library crate - exports the indicator engine, backtester, and live session core

pub mod api;
pub mod backtest;
pub mod binance;
pub mod error;
pub mod indicators;
pub mod live;
pub mod market_cache;
pub mod market_data;
pub mod signals;
pub mod types;

// Re-export commonly used types
pub use error::EngineError;
pub use types::*;
