//! Band strategy: rolling mean ± k·σ with momentum and sell-pressure
//! filters.

use async_trait::async_trait;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::BandParams;
use crate::error::EngineError;
use crate::exchange::MarketData;
use crate::models::{closes, volumes, PositionSnapshot, Signal, TickerSymbol};

use super::indicators;
use super::Strategy;

/// Ask/bid volume ratio above which the sell-pressure filter defers a buy.
const SELL_PRESSURE_RATIO: f64 = 1.5;

pub struct BandStrategy {
    params: BandParams,
    interval: String,
}

impl BandStrategy {
    pub fn new(params: BandParams, interval: String) -> Self {
        Self { params, interval }
    }

    /// Decide from a close/volume series, the current price, and the
    /// orderbook imbalance. Pure so tests can drive it directly.
    fn evaluate(
        &self,
        close_series: &[f64],
        volume_series: &[f64],
        price: f64,
        ask_bid_ratio: f64,
    ) -> Signal {
        let window = self.params.window;
        if close_series.len() < window {
            return Signal::Hold;
        }

        let recent = &close_series[close_series.len() - window..];
        let Some(mean) = indicators::mean(recent) else {
            return Signal::Hold;
        };
        let Some(sd) = indicators::std_dev(recent) else {
            return Signal::Hold;
        };
        if sd <= f64::EPSILON {
            // Flat series: bands collapse onto the mean, no edge either way.
            return Signal::Hold;
        }

        let upper = mean + self.params.multiplier * sd;
        let lower = mean - self.params.multiplier * sd;

        if price > upper {
            if self.upward_momentum(close_series) {
                // Still climbing: scale out instead of dumping the position.
                let strength = ((price - upper) / (upper - mean)).clamp(0.25, 1.0);
                let ratio = Decimal::from_f64(strength).unwrap_or(Decimal::ONE);
                return Signal::partial_sell(ratio);
            }
            return Signal::Sell;
        }

        if price < lower {
            if self.sell_pressure(close_series, volume_series, ask_bid_ratio) {
                debug!(ask_bid_ratio, "band buy deferred by sell pressure");
                return Signal::Hold;
            }
            return Signal::Buy;
        }

        Signal::Hold
    }

    /// Momentum filter: the last three closes keep rising.
    fn upward_momentum(&self, close_series: &[f64]) -> bool {
        let n = close_series.len();
        n >= 3 && close_series[n - 1] > close_series[n - 2] && close_series[n - 2] > close_series[n - 3]
    }

    /// Sell-pressure filter: heavy ask-side book, or falling closes on
    /// above-average volume.
    fn sell_pressure(
        &self,
        close_series: &[f64],
        volume_series: &[f64],
        ask_bid_ratio: f64,
    ) -> bool {
        if ask_bid_ratio > SELL_PRESSURE_RATIO {
            return true;
        }

        let n = close_series.len();
        if n < 3 || volume_series.len() < 3 {
            return false;
        }
        let falling = close_series[n - 1] < close_series[n - 2]
            && close_series[n - 2] < close_series[n - 3];
        let Some(avg_volume) = indicators::mean(volume_series) else {
            return false;
        };
        let vn = volume_series.len();
        let recent_volume = indicators::mean(&volume_series[vn - 3..]).unwrap_or(0.0);

        falling && recent_volume > avg_volume
    }
}

#[async_trait]
impl Strategy for BandStrategy {
    fn name(&self) -> &'static str {
        "band"
    }

    async fn generate_signal(
        &self,
        ticker: &TickerSymbol,
        market: &MarketData,
        snapshot: &PositionSnapshot,
    ) -> Result<Signal, EngineError> {
        let count = (self.params.window + 10) as u32;
        let candles = market.candles(ticker, &self.interval, count).await?;
        let close_series = closes(&candles);
        let volume_series = volumes(&candles);
        let price = snapshot.current_price.to_f64().unwrap_or(0.0);

        // The orderbook read only matters near the lower band; fetch it
        // lazily and fall back to neutral when it is unavailable.
        let ask_bid_ratio = match market.orderbook(ticker).await {
            Ok(book) => book.ask_bid_ratio(),
            Err(_) => 1.0,
        };

        Ok(self.evaluate(&close_series, &volume_series, price, ask_bid_ratio))
    }
}
