//! REST handlers: cached market data and one-shot backtests.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::backtest::run_backtest;
use crate::error::EngineError;
use crate::indicators::parse_specs;
use crate::types::{AppState, BacktestRequest};

fn error_body(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "error": message.into() }))
}

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::InvalidSpec(_) => StatusCode::BAD_REQUEST,
        EngineError::DataUnavailable { .. } => StatusCode::NOT_FOUND,
        EngineError::InsufficientData { .. } | EngineError::NoTradableSignal => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EngineError::TransportDisconnect => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GET /api/market-data - cached bar series for the watchlist
pub async fn get_market_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.cache.snapshot().await;
    if snapshot.is_empty() {
        return (StatusCode::NOT_FOUND, error_body("no market data cached yet")).into_response();
    }
    Json(snapshot).into_response()
}

/// POST /api/run-backtest - fetch fresh bars and replay the strategy
pub async fn run_backtest_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BacktestRequest>,
) -> impl IntoResponse {
    if request.symbols.len() != 1 || request.timeframes.len() != 1 {
        return (
            StatusCode::BAD_REQUEST,
            error_body("exactly one symbol and one timeframe are required"),
        )
            .into_response();
    }
    let symbol = request.symbols[0].clone();
    let timeframe = request.timeframes[0].clone();

    let specs = match parse_specs(&request.indicators) {
        Ok(specs) => specs,
        Err(e) => return (status_for(&e), error_body(e.to_string())).into_response(),
    };

    info!("backtest requested: {symbol} {timeframe} with {} indicators", specs.len());

    let bars = match state
        .provider
        .fetch(&symbol, &timeframe, state.settings.fetch_limit)
        .await
    {
        Ok(bars) => bars,
        Err(e) => {
            warn!("backtest fetch failed: {e}");
            return (status_for(&e), error_body(e.to_string())).into_response();
        }
    };

    match run_backtest(&bars, &specs, state.settings.initial_balance) {
        Ok(result) => {
            info!(
                "backtest finished: {} trades, {:.2}% total profit",
                result.total_trades, result.total_profit_percentage
            );
            let result_value = match serde_json::to_value(&result) {
                Ok(value) => value,
                Err(e) => {
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        error_body(format!("failed to encode result: {e}")),
                    )
                        .into_response()
                }
            };
            // {symbol: {timeframe: result}}, the shape the frontend expects.
            let mut by_timeframe = serde_json::Map::new();
            by_timeframe.insert(timeframe, result_value);
            let mut by_symbol = serde_json::Map::new();
            by_symbol.insert(symbol, serde_json::Value::Object(by_timeframe));
            Json(serde_json::Value::Object(by_symbol)).into_response()
        }
        Err(e) => {
            warn!("backtest failed: {e}");
            (status_for(&e), error_body(e.to_string())).into_response()
        }
    }
}
