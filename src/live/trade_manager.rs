//! Live trade-state machine.
//!
//! The incremental analogue of the backtest scan: one signal at a time,
//! with stale-timestamp deduplication so events always leave in increasing
//! timestamp order. Opposite-direction signals flip the position in a
//! single call; the emitted event carries the closed leg's percentage
//! profit.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::signals::Signal;
use crate::types::{TradeEvent, TradeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    Long,
    Short,
}

#[derive(Debug, Clone)]
struct OpenPosition {
    side: PositionSide,
    entry_price: f64,
    entry_time: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TradeManager {
    position: Option<OpenPosition>,
    total_profit: f64,
    trade_history: Vec<TradeEvent>,
    last_signal_time: Option<DateTime<Utc>>,
}

impl TradeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one signal. Returns the trade event to forward, or `None`
    /// when the signal is stale, neutral, or matches the open side.
    pub fn process_signal(&mut self, signal: &Signal) -> Option<TradeEvent> {
        if let Some(last) = self.last_signal_time {
            if signal.timestamp <= last {
                debug!(
                    "dropping stale signal at {} (last processed {})",
                    signal.timestamp, last
                );
                return None;
            }
        }
        if signal.direction == 0 {
            return None;
        }
        self.last_signal_time = Some(signal.timestamp);

        let side = if signal.direction > 0 {
            PositionSide::Long
        } else {
            PositionSide::Short
        };
        let trade_type = if signal.direction > 0 {
            TradeType::Buy
        } else {
            TradeType::Sell
        };

        let closed_profit = match &self.position {
            None => 0.0,
            Some(pos) if pos.side == side => return None,
            Some(pos) => {
                let profit = match pos.side {
                    PositionSide::Long => {
                        (signal.price - pos.entry_price) / pos.entry_price * 100.0
                    }
                    PositionSide::Short => {
                        (pos.entry_price - signal.price) / pos.entry_price * 100.0
                    }
                };
                info!(
                    "flip {:?} -> {:?} @ {:.4}: {:+.2}%",
                    pos.side, side, signal.price, profit
                );
                self.total_profit += profit;
                profit
            }
        };

        self.position = Some(OpenPosition {
            side,
            entry_price: signal.price,
            entry_time: signal.timestamp,
        });

        let event = TradeEvent {
            timestamp: signal.timestamp,
            price: signal.price,
            signal: signal.direction,
            trade_type,
            profit: closed_profit,
            indicator_detail: signal.detail.clone(),
        };
        self.trade_history.push(event.clone());
        Some(event)
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn total_profit(&self) -> f64 {
        self.total_profit
    }

    pub fn history(&self) -> &[TradeEvent] {
        &self.trade_history
    }
}
