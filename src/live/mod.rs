//! Live trading surface: the per-connection signal session, its
//! trade-state machine, and the connection registry that owns them.

pub mod connections;
pub mod session;
pub mod trade_manager;

pub use connections::{ConnectionManager, LiveSessionHandle};
pub use session::{SessionConfig, KEEPALIVE_INTERVAL, MIN_EMIT_GAP, POLL_INTERVAL};
pub use trade_manager::{PositionSide, TradeManager};
