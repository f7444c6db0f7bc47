//! Signal generators.
//!
//! Each strategy consumes cached market reads and produces one [`Signal`]
//! per cycle. Variants shorter on history than their required window return
//! `Hold`, never an error and never a trade.

mod adaptive;
mod band;
mod breakout;
mod ensemble;
pub mod indicators;
mod momentum;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveTime, Utc};

pub use adaptive::AdaptiveStrategy;
pub use band::BandStrategy;
pub use breakout::BreakoutStrategy;
pub use ensemble::EnsembleStrategy;
pub use momentum::MomentumStrategy;

use crate::config::JobConfig;
use crate::error::EngineError;
use crate::exchange::MarketData;
use crate::models::{PositionSnapshot, Signal, TickerSymbol};

/// A signal generator. Implementations are stateless between cycles; all
/// market access goes through the cached [`MarketData`] facade.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate_signal(
        &self,
        ticker: &TickerSymbol,
        market: &MarketData,
        snapshot: &PositionSnapshot,
    ) -> Result<Signal, EngineError>;
}

/// Build the strategy a job config names. Config validation has already
/// rejected unknown names, but the factory still refuses them.
pub fn build_strategy(config: &JobConfig) -> Result<Box<dyn Strategy>, EngineError> {
    build_named(&config.strategy, config)
}

pub(crate) fn build_named(
    name: &str,
    config: &JobConfig,
) -> Result<Box<dyn Strategy>, EngineError> {
    match name {
        "band" => Ok(Box::new(BandStrategy::new(
            config.params.band.clone(),
            config.candle_interval.clone(),
        ))),
        "breakout" => Ok(Box::new(BreakoutStrategy::new(
            config.params.breakout.clone(),
        ))),
        "momentum" => Ok(Box::new(MomentumStrategy::new(
            config.params.momentum.clone(),
            config.candle_interval.clone(),
        ))),
        "ensemble" => Ok(Box::new(EnsembleStrategy::new(config)?)),
        "adaptive" => Ok(Box::new(AdaptiveStrategy::new(config)?)),
        other => Err(EngineError::Config(format!("unknown strategy '{other}'"))),
    }
}

/// Exchange-local wall-clock time (KST, UTC+9). Daily candles roll over at
/// 09:00 local, which anchors the breakout pre-session window and the
/// time-of-day weighting.
pub(crate) fn exchange_local_time() -> NaiveTime {
    let kst = FixedOffset::east_opt(9 * 3600).expect("fixed offset");
    Utc::now().with_timezone(&kst).time()
}
