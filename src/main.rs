use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use signalbridge::api;
use signalbridge::binance::{BinanceClient, DEFAULT_BASE_URL};
use signalbridge::indicators::parse_specs;
use signalbridge::live::{ConnectionManager, SessionConfig};
use signalbridge::market_cache::{spawn_refresh_task, MarketCache};
use signalbridge::market_data::MarketDataSource;
use signalbridge::{AppState, ClientMessage, EngineSettings, Outbound, WsMessage};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Port to run the web server on
    #[arg(short, long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Symbols prefetched into the market cache (comma-separated)
    #[arg(
        short,
        long,
        default_value = "ETHUSDT,BTCUSDT,AVAXUSDT,SOLUSDT,RENDERUSDT,FETUSDT",
        env = "WATCHLIST"
    )]
    symbols: String,

    /// Kline interval for the cache and the live default
    #[arg(short, long, default_value = "1h")]
    interval: String,

    /// Bars fetched per provider call
    #[arg(long, default_value = "100")]
    fetch_limit: u32,

    /// Binance API base URL
    #[arg(long, default_value = DEFAULT_BASE_URL, env = "BINANCE_BASE_URL")]
    binance_url: String,

    /// Seconds between market cache refreshes
    #[arg(long, default_value = "900")]
    cache_refresh_secs: u64,

    /// Starting balance for backtests
    #[arg(long, default_value = "10000")]
    initial_balance: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signalbridge=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    info!("Starting signalbridge server");
    info!("Watchlist: {}", args.symbols);
    info!("Interval: {}", args.interval);
    info!("Port: {}", args.port);

    let provider: Arc<dyn MarketDataSource> =
        Arc::new(BinanceClient::new(args.binance_url.clone()));
    let cache = Arc::new(MarketCache::new());

    let symbols: Vec<String> = args
        .symbols
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    info!("Prefetching market data for {} symbols...", symbols.len());
    cache
        .refresh(provider.as_ref(), &symbols, &args.interval, args.fetch_limit)
        .await;

    // Steady-state cache refresh on a fixed schedule
    let _refresh_task = spawn_refresh_task(
        cache.clone(),
        provider.clone(),
        symbols,
        args.interval.clone(),
        args.fetch_limit,
        Duration::from_secs(args.cache_refresh_secs),
    );

    let state = Arc::new(AppState {
        provider,
        cache,
        connections: ConnectionManager::new(),
        settings: EngineSettings {
            default_interval: args.interval,
            fetch_limit: args.fetch_limit,
            initial_balance: args.initial_balance,
        },
    });

    // Build router
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/market-data", get(api::get_market_data))
        .route("/api/run-backtest", post(api::run_backtest_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    info!("Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(64);

    // Writer task: drains the outbound channel into the socket. Sessions
    // and the keep-alive loop only ever see the channel.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let message = match frame {
                Outbound::Data(msg) => match serde_json::to_string(&msg) {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        warn!("failed to encode outbound message: {e}");
                        continue;
                    }
                },
                Outbound::Ping => Message::Ping(Bytes::new()),
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut active_session: Option<Uuid> = None;
    while let Some(Ok(message)) = receiver.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let client_msg: ClientMessage = match serde_json::from_str(text.as_str()) {
            Ok(msg) => msg,
            Err(e) => {
                send_error(&tx, format!("malformed request: {e}")).await;
                continue;
            }
        };

        match client_msg.action.as_str() {
            "subscribe" => {
                let Some(symbol) = client_msg.symbol.clone() else {
                    send_error(&tx, "subscribe requires a symbol".to_string()).await;
                    continue;
                };
                let specs = match parse_specs(&client_msg.indicators) {
                    Ok(specs) => specs,
                    Err(e) => {
                        send_error(&tx, e.to_string()).await;
                        continue;
                    }
                };

                // One live session per socket: a new subscribe replaces
                // the previous one.
                if let Some(old) = active_session.take() {
                    state.connections.close(old).await;
                }

                let interval = client_msg
                    .interval
                    .clone()
                    .unwrap_or_else(|| state.settings.default_interval.clone());
                let indicators = specs.iter().map(|s| s.kind.name().to_string()).collect();
                let config = SessionConfig {
                    symbol: symbol.clone(),
                    interval: interval.clone(),
                    fetch_limit: state.settings.fetch_limit,
                };

                let id = state
                    .connections
                    .open(state.provider.clone(), specs, config, tx.clone())
                    .await;
                active_session = Some(id);

                let _ = tx
                    .send(Outbound::Data(WsMessage::Subscribed {
                        connection_id: id,
                        symbol,
                        interval,
                        indicators,
                    }))
                    .await;
            }
            "unsubscribe" => {
                if let Some(id) = active_session.take() {
                    state.connections.close(id).await;
                }
            }
            other => {
                send_error(&tx, format!("unknown action: {other:?}")).await;
            }
        }
    }

    // Client went away: tear down this connection's session (idempotent)
    // and let the writer drain out.
    if let Some(id) = active_session {
        state.connections.close(id).await;
    }
    drop(tx);
    let _ = writer.await;
    info!("WebSocket client disconnected");
}

async fn send_error(tx: &mpsc::Sender<Outbound>, message: String) {
    let _ = tx.send(Outbound::Data(WsMessage::Error { message })).await;
}
