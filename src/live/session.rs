//! Live signal session: the per-connection polling loop and its
//! keep-alive sibling.
//!
//! Each iteration fetches the latest window for the session's symbol,
//! recomputes the combined signal when the close has actually moved, and
//! feeds the result through the trade manager. The loop ends when the
//! task is aborted or the connection's outbound channel closes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::trade_manager::TradeManager;
use crate::error::EngineError;
use crate::indicators::IndicatorSpec;
use crate::market_data::MarketDataSource;
use crate::signals::evaluate_latest;
use crate::types::{Outbound, WsMessage};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
/// Minimum spacing between emitted signals.
pub const MIN_EMIT_GAP: Duration = Duration::from_secs(60);
/// Relative close move below which the window counts as unchanged.
const PRICE_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub symbol: String,
    pub interval: String,
    pub fetch_limit: u32,
}

pub async fn run_polling_loop(
    provider: Arc<dyn MarketDataSource>,
    specs: Vec<IndicatorSpec>,
    config: SessionConfig,
    outbound: mpsc::Sender<Outbound>,
) {
    let mut manager = TradeManager::new();
    let mut last_close: Option<f64> = None;
    let mut last_emit: Option<Instant> = None;

    info!("polling loop started for {} ({})", config.symbol, config.interval);
    loop {
        match provider
            .fetch(&config.symbol, &config.interval, config.fetch_limit)
            .await
        {
            Err(e) => warn!("{}: fetch failed, will retry: {}", config.symbol, e),
            Ok(bars) => {
                if let Some(last_bar) = bars.last() {
                    let close = last_bar.close;
                    let moved = last_close
                        .map_or(true, |prev| ((close - prev) / prev).abs() > PRICE_EPSILON);
                    if moved {
                        last_close = Some(close);
                        if let Err(e) =
                            step(&bars, &specs, &mut manager, &mut last_emit, &outbound).await
                        {
                            debug!("{}: ending session: {e}", config.symbol);
                            return;
                        }
                    }
                } else {
                    warn!("{}: provider returned no bars, will retry", config.symbol);
                }
            }
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Evaluate one fresh window. `TransportDisconnect` means the outbound
/// channel is closed and the session should end.
async fn step(
    bars: &[crate::types::Bar],
    specs: &[IndicatorSpec],
    manager: &mut TradeManager,
    last_emit: &mut Option<Instant>,
    outbound: &mpsc::Sender<Outbound>,
) -> Result<(), EngineError> {
    let signal = match evaluate_latest(bars, specs) {
        Ok(signal) => signal,
        Err(e) => {
            warn!("signal evaluation failed: {e}");
            return Ok(());
        }
    };
    if signal.direction == 0 {
        return Ok(());
    }
    let gate_open = last_emit.map_or(true, |t| t.elapsed() >= MIN_EMIT_GAP);
    if !gate_open {
        debug!("signal suppressed, emit gate still closed");
        return Ok(());
    }
    *last_emit = Some(Instant::now());

    if let Some(event) = manager.process_signal(&signal) {
        info!(
            "trade event: {:?} @ {:.4} ({:+.2}%)",
            event.trade_type, event.price, event.profit
        );
        outbound
            .send(Outbound::Data(WsMessage::TradeEvent(event)))
            .await
            .map_err(|_| EngineError::TransportDisconnect)?;
    }
    Ok(())
}

/// Sends a ping through the connection's outbound channel every 30 s so
/// idle subscriptions keep their socket warm.
pub async fn run_keepalive_loop(outbound: mpsc::Sender<Outbound>) {
    loop {
        sleep(KEEPALIVE_INTERVAL).await;
        if outbound.send(Outbound::Ping).await.is_err() {
            return;
        }
    }
}
