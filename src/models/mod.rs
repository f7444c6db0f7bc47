//! Domain models shared across the engine.

mod candle;
mod job;
mod position;
mod signal;
mod ticker;
mod trade;

pub use candle::{closes, volumes, Candle};
pub use job::{Job, JobId};
pub use position::PositionSnapshot;
pub use signal::{RiskAction, RiskKind, Signal};
pub use ticker::TickerSymbol;
pub use trade::{TradeRecord, TradeSide, MIN_ORDER_VALUE, MIN_TRADE_VOLUME};
