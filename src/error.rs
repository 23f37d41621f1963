//! Error taxonomy for the indicator/signal engine.
//!
//! Every fallible core operation returns one of these variants so callers
//! can decide retry vs propagate vs skip. A failed result is never collapsed
//! into an empty-but-successful one.

use thiserror::Error;

use crate::indicators::IndicatorKind;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Fewer bars than the indicator's warm-up window. Non-fatal when other
    /// indicators were requested alongside; fatal when it was the only one.
    #[error("{kind} needs at least {needed} bars, got {got}")]
    InsufficientData {
        kind: IndicatorKind,
        needed: usize,
        got: usize,
    },

    /// Unknown indicator kind or malformed parameters. Fails the single
    /// request; concurrent sessions are unaffected.
    #[error("invalid indicator spec: {0}")]
    InvalidSpec(String),

    /// The market-data provider returned nothing. Retryable for live
    /// sessions, terminal for one-shot backtests.
    #[error("no market data available for {symbol}")]
    DataUnavailable { symbol: String },

    /// The combined signal sequence never left neutral. Reported distinctly
    /// from a signal-bearing run that happened to close zero trades.
    #[error("combined signal produced no tradable entries")]
    NoTradableSignal,

    /// The client went away. Session teardown, not an error to the rest of
    /// the system.
    #[error("client transport disconnected")]
    TransportDisconnect,
}

impl EngineError {
    /// Whether a live session should keep polling after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::DataUnavailable { .. })
    }
}
