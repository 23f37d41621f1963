//! Connection registry.
//!
//! Owns every live session's polling and keep-alive task handles and
//! guarantees joint cancellation on teardown. The registry map is the only
//! state shared across sessions; add/remove/lookup serialize through its
//! lock.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use super::session::{run_keepalive_loop, run_polling_loop, SessionConfig};
use crate::indicators::IndicatorSpec;
use crate::market_data::MarketDataSource;
use crate::types::Outbound;

pub struct LiveSessionHandle {
    pub symbol: String,
    polling: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

#[derive(Default)]
pub struct ConnectionManager {
    sessions: RwLock<HashMap<Uuid, LiveSessionHandle>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new live session: spawns its polling loop and keep-alive
    /// task and returns the connection id.
    pub async fn open(
        &self,
        provider: Arc<dyn MarketDataSource>,
        specs: Vec<IndicatorSpec>,
        config: SessionConfig,
        outbound: mpsc::Sender<Outbound>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let symbol = config.symbol.clone();
        let polling = tokio::spawn(run_polling_loop(
            provider,
            specs,
            config,
            outbound.clone(),
        ));
        let keepalive = tokio::spawn(run_keepalive_loop(outbound));

        self.sessions.write().await.insert(
            id,
            LiveSessionHandle {
                symbol: symbol.clone(),
                polling,
                keepalive,
            },
        );
        info!("live session {id} opened for {symbol}");
        id
    }

    /// Cancel exactly this session's tasks and drop it from the registry.
    /// Idempotent: only the first call finds anything to do.
    pub async fn close(&self, id: Uuid) -> bool {
        match self.sessions.write().await.remove(&id) {
            Some(handle) => {
                handle.polling.abort();
                handle.keepalive.abort();
                info!("live session {id} closed ({})", handle.symbol);
                true
            }
            None => false,
        }
    }

    pub async fn close_all(&self) {
        let mut sessions = self.sessions.write().await;
        for (id, handle) in sessions.drain() {
            handle.polling.abort();
            handle.keepalive.abort();
            info!("live session {id} closed ({})", handle.symbol);
        }
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
