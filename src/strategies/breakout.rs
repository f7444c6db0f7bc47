//! Breakout strategy: volatility-range breakout over daily candles.
//!
//! Checks run in a fixed order: the pre-session liquidation window, then
//! profit-target / stop-loss thresholds, then the breakout entry itself.

use async_trait::async_trait;
use chrono::NaiveTime;
use rust_decimal::prelude::ToPrimitive;
use tracing::info;

use crate::config::BreakoutParams;
use crate::error::EngineError;
use crate::exchange::MarketData;
use crate::models::{Candle, PositionSnapshot, Signal, TickerSymbol};

use super::{exchange_local_time, Strategy};

pub struct BreakoutStrategy {
    params: BreakoutParams,
}

impl BreakoutStrategy {
    pub fn new(params: BreakoutParams) -> Self {
        Self { params }
    }

    /// Liquidation window just before the 09:00 daily candle rollover.
    fn in_presession_window(local: NaiveTime) -> bool {
        let start = NaiveTime::from_hms_opt(8, 50, 0).expect("valid time");
        let end = NaiveTime::from_hms_opt(9, 0, 0).expect("valid time");
        local >= start && local < end
    }

    fn evaluate(
        &self,
        local: NaiveTime,
        snapshot: &PositionSnapshot,
        yesterday: &Candle,
        today: &Candle,
    ) -> Signal {
        let holding = snapshot.has_position();

        // 1. Unconditional liquidation ahead of the session rollover.
        if Self::in_presession_window(local) {
            if holding {
                info!("pre-session window: liquidating breakout position");
                return Signal::Sell;
            }
            return Signal::Hold;
        }

        // 2. Profit target / stop loss on the open position.
        if let Some(rate) = snapshot.profit_rate() {
            if rate >= self.params.target_profit || rate <= -self.params.stop_loss {
                return Signal::Sell;
            }
        }

        // 3. Range breakout entry.
        let (Some(open), Some(high), Some(low), Some(price)) = (
            today.open.to_f64(),
            yesterday.high.to_f64(),
            yesterday.low.to_f64(),
            snapshot.current_price.to_f64(),
        ) else {
            return Signal::Hold;
        };
        let target = open + self.params.k * (high - low);
        if price > target && !holding {
            return Signal::Buy;
        }

        Signal::Hold
    }
}

#[async_trait]
impl Strategy for BreakoutStrategy {
    fn name(&self) -> &'static str {
        "breakout"
    }

    async fn generate_signal(
        &self,
        ticker: &TickerSymbol,
        market: &MarketData,
        snapshot: &PositionSnapshot,
    ) -> Result<Signal, EngineError> {
        let candles = market.candles(ticker, "day", 2).await?;
        if candles.len() < 2 {
            return Ok(Signal::Hold);
        }
        let yesterday = &candles[candles.len() - 2];
        let today = &candles[candles.len() - 1];

        Ok(self.evaluate(exchange_local_time(), snapshot, yesterday, today))
    }
}
