//! Backtest simulator: replays the combined signal sequence against a
//! simulated single-position account.
//!
//! Sizing policy: each entry allocates 95% of the current balance as
//! notional; units are tracked so profit is units * (exit - entry). A
//! position still open after the last bar is force-closed at that bar's
//! close.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::indicators::IndicatorSpec;
use crate::signals::{combine_signals, compute_frame};
use crate::types::Bar;

pub const DEFAULT_INITIAL_BALANCE: f64 = 10_000.0;

/// Fraction of the running balance committed per entry.
const POSITION_FRACTION: f64 = 0.95;

/// One closed round trip, ordered by exit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub entry_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub profit: f64,
    pub profit_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_profit: f64,
    pub total_profit_percentage: f64,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub start_price: f64,
    pub end_price: f64,
    pub price_change_percentage: f64,
    pub trades: Vec<Trade>,
}

struct OpenLot {
    units: f64,
    entry_price: f64,
    entry_time: DateTime<Utc>,
}

/// Run the full pipeline: indicators, combined signal, simulation.
pub fn run_backtest(
    bars: &[Bar],
    specs: &[IndicatorSpec],
    initial_balance: f64,
) -> Result<BacktestResult, EngineError> {
    let (frame, active) = compute_frame(bars, specs)?;
    let combined = combine_signals(&frame, &active);
    if combined.iter().all(|&v| v == 0) {
        return Err(EngineError::NoTradableSignal);
    }
    Ok(simulate(frame.bars(), &combined, initial_balance))
}

fn simulate(bars: &[Bar], combined: &[i8], initial_balance: f64) -> BacktestResult {
    let mut balance = initial_balance;
    let mut open: Option<OpenLot> = None;
    let mut trades: Vec<Trade> = Vec::new();

    for (bar, &vote) in bars.iter().zip(combined) {
        match vote {
            1 if open.is_none() => {
                let notional = balance * POSITION_FRACTION;
                let units = notional / bar.close;
                balance -= notional;
                debug!(
                    "entry @ {:.4}: {:.6} units, {:.2} reserved",
                    bar.close, units, notional
                );
                open = Some(OpenLot {
                    units,
                    entry_price: bar.close,
                    entry_time: bar.timestamp,
                });
            }
            -1 => {
                if let Some(lot) = open.take() {
                    trades.push(close_lot(lot, bar, &mut balance));
                }
            }
            _ => {}
        }
    }

    // Auto-liquidation of anything still open at the end of the scan.
    if let (Some(lot), Some(last)) = (open.take(), bars.last()) {
        info!("force-closing open position at final bar {:.4}", last.close);
        trades.push(close_lot(lot, last, &mut balance));
    }

    let total_trades = trades.len() as u32;
    let winning_trades = trades.iter().filter(|t| t.profit > 0.0).count() as u32;
    let win_rate = if total_trades > 0 {
        winning_trades as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    };

    // Drawdown over the equity curve sampled at trade boundaries.
    let mut equity = initial_balance;
    let mut peak = initial_balance;
    let mut max_drawdown: f64 = 0.0;
    for trade in &trades {
        equity += trade.profit;
        peak = peak.max(equity);
        max_drawdown = max_drawdown.max((peak - equity) / peak * 100.0);
    }

    let total_profit = balance - initial_balance;
    let start_price = bars.first().map(|b| b.close).unwrap_or(0.0);
    let end_price = bars.last().map(|b| b.close).unwrap_or(0.0);

    BacktestResult {
        initial_balance,
        final_balance: balance,
        total_profit,
        total_profit_percentage: total_profit / initial_balance * 100.0,
        total_trades,
        winning_trades,
        win_rate,
        max_drawdown,
        start_price,
        end_price,
        price_change_percentage: if start_price != 0.0 {
            (end_price - start_price) / start_price * 100.0
        } else {
            0.0
        },
        trades,
    }
}

fn close_lot(lot: OpenLot, bar: &Bar, balance: &mut f64) -> Trade {
    let proceeds = lot.units * bar.close;
    *balance += proceeds;
    let profit = lot.units * (bar.close - lot.entry_price);
    info!(
        "exit @ {:.4}: profit {:+.2} ({:+.2}%)",
        bar.close,
        profit,
        (bar.close - lot.entry_price) / lot.entry_price * 100.0
    );
    Trade {
        entry_time: lot.entry_time,
        exit_time: bar.timestamp,
        entry_price: lot.entry_price,
        exit_price: bar.close,
        profit,
        profit_percentage: (bar.close - lot.entry_price) / lot.entry_price * 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::testutil::bars_from_closes;
    use crate::indicators::{parse_specs, RawIndicatorSpec};

    fn sma_spec(period: f64) -> Vec<IndicatorSpec> {
        parse_specs(&[RawIndicatorSpec {
            kind: "sma".into(),
            params: [("period".to_string(), period)].into_iter().collect(),
        }])
        .unwrap()
    }

    #[test]
    fn one_buy_one_sell_round_trip() {
        let bars = bars_from_closes(&[100.0, 110.0, 120.0, 130.0]);
        let result = simulate(&bars, &[1, 0, -1, 0], 10_000.0);

        // 95% of 10k at 100 -> 95 units; exit at 120 -> profit 1900.
        assert_eq!(result.total_trades, 1);
        assert_eq!(result.winning_trades, 1);
        assert_eq!(result.win_rate, 100.0);
        assert!((result.final_balance - 11_900.0).abs() < 1e-9);
        assert!((result.total_profit - 1_900.0).abs() < 1e-9);
        assert!((result.total_profit_percentage - 19.0).abs() < 1e-9);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_price, 100.0);
        assert_eq!(trade.exit_price, 120.0);
        assert!((trade.profit_percentage - 20.0).abs() < 1e-9);
    }

    #[test]
    fn losing_trade_sets_drawdown() {
        let bars = bars_from_closes(&[100.0, 90.0]);
        let result = simulate(&bars, &[1, -1], 10_000.0);

        assert_eq!(result.total_trades, 1);
        assert_eq!(result.winning_trades, 0);
        assert!((result.final_balance - 9_050.0).abs() < 1e-9);
        assert!((result.max_drawdown - 9.5).abs() < 1e-9);
    }

    #[test]
    fn open_position_is_force_closed_at_last_bar() {
        let bars = bars_from_closes(&[100.0, 110.0, 130.0]);
        let result = simulate(&bars, &[1, 0, 0], 10_000.0);

        assert_eq!(result.total_trades, 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_price, 130.0);
        assert_eq!(trade.exit_time, bars[2].timestamp);
        assert!((result.final_balance - 12_850.0).abs() < 1e-9);
    }

    #[test]
    fn sell_without_position_is_ignored() {
        let bars = bars_from_closes(&[100.0, 100.0, 105.0]);
        let result = simulate(&bars, &[-1, 1, -1], 10_000.0);

        assert_eq!(result.total_trades, 1);
        assert_eq!(result.trades[0].entry_price, 100.0);
        assert_eq!(result.trades[0].exit_price, 105.0);
    }

    #[test]
    fn winning_streak_has_zero_drawdown() {
        let closes: Vec<f64> = (0..8).map(|i| 100.0 + 10.0 * i as f64).collect();
        let bars = bars_from_closes(&closes);
        let result = simulate(&bars, &[1, -1, 1, -1, 1, -1, 1, -1], 10_000.0);

        assert_eq!(result.total_trades, 4);
        assert_eq!(result.winning_trades, 4);
        assert_eq!(result.max_drawdown, 0.0);
        assert!(result.final_balance > 10_000.0);
    }

    #[test]
    fn buy_and_hold_drift_is_reported() {
        let bars = bars_from_closes(&[200.0, 250.0, 300.0]);
        let result = simulate(&bars, &[1, 0, -1], 10_000.0);

        assert_eq!(result.start_price, 200.0);
        assert_eq!(result.end_price, 300.0);
        assert!((result.price_change_percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn all_neutral_signals_are_no_tradable_signal() {
        // A constant series never crosses its own SMA.
        let bars = bars_from_closes(&[100.0; 30]);
        let err = run_backtest(&bars, &sma_spec(5.0), 10_000.0).unwrap_err();
        assert!(matches!(err, EngineError::NoTradableSignal));
    }

    #[test]
    fn too_short_series_is_insufficient_data() {
        let bars = bars_from_closes(&[100.0, 101.0]);
        let err = run_backtest(&bars, &sma_spec(5.0), 10_000.0).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { .. }));
    }
}
