//! Adaptive strategy: classifies the market regime, then delegates to a
//! fixed sub-strategy per regime.

use async_trait::async_trait;
use chrono::Timelike;
use tracing::debug;

use crate::config::JobConfig;
use crate::error::EngineError;
use crate::exchange::MarketData;
use crate::models::{closes, PositionSnapshot, Signal, TickerSymbol};

use super::indicators;
use super::{exchange_local_time, BandStrategy, BreakoutStrategy, MomentumStrategy, Strategy};

/// Short σ / long σ above which the market counts as high-volatility.
const VOLATILITY_RATIO_THRESHOLD: f64 = 1.5;
/// Absolute per-step SMA slope above which the market counts as trending.
const TREND_SLOPE_THRESHOLD: f64 = 0.002;

const SHORT_WINDOW: usize = 10;
const LONG_WINDOW: usize = 40;
const SMA_PERIOD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regime {
    HighVolatility,
    Trending,
    RangingDay,
    RangingNight,
}

pub struct AdaptiveStrategy {
    interval: String,
    band: BandStrategy,
    breakout: BreakoutStrategy,
    momentum: MomentumStrategy,
}

impl AdaptiveStrategy {
    pub fn new(config: &JobConfig) -> Result<Self, EngineError> {
        Ok(Self {
            interval: config.candle_interval.clone(),
            band: BandStrategy::new(config.params.band.clone(), config.candle_interval.clone()),
            breakout: BreakoutStrategy::new(config.params.breakout.clone()),
            momentum: MomentumStrategy::new(
                config.params.momentum.clone(),
                config.candle_interval.clone(),
            ),
        })
    }

    fn classify(close_series: &[f64], hour: u32) -> Option<Regime> {
        if close_series.len() < LONG_WINDOW {
            return None;
        }

        let long = &close_series[close_series.len() - LONG_WINDOW..];
        let short = &close_series[close_series.len() - SHORT_WINDOW..];

        let long_sd = indicators::std_dev(long)?;
        let short_sd = indicators::std_dev(short)?;
        if long_sd <= f64::EPSILON {
            // Perfectly flat history reads as ranging, not as an error.
            return Some(Self::ranging(hour));
        }
        if short_sd / long_sd > VOLATILITY_RATIO_THRESHOLD {
            return Some(Regime::HighVolatility);
        }

        let sma = indicators::sma(long, SMA_PERIOD)?;
        let tail = &sma[sma.len().saturating_sub(5)..];
        if let Some(s) = indicators::slope(tail) {
            if s.abs() > TREND_SLOPE_THRESHOLD {
                return Some(Regime::Trending);
            }
        }

        Some(Self::ranging(hour))
    }

    fn ranging(hour: u32) -> Regime {
        if (9..=20).contains(&hour) {
            Regime::RangingDay
        } else {
            Regime::RangingNight
        }
    }
}

#[async_trait]
impl Strategy for AdaptiveStrategy {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    async fn generate_signal(
        &self,
        ticker: &TickerSymbol,
        market: &MarketData,
        snapshot: &PositionSnapshot,
    ) -> Result<Signal, EngineError> {
        let candles = market
            .candles(ticker, &self.interval, LONG_WINDOW as u32 + 10)
            .await?;
        let close_series = closes(&candles);

        let hour = exchange_local_time().hour();
        let Some(regime) = Self::classify(&close_series, hour) else {
            return Ok(Signal::Hold);
        };
        debug!(?regime, "adaptive regime");

        let delegate: &dyn Strategy = match regime {
            Regime::HighVolatility => &self.momentum,
            Regime::Trending => &self.breakout,
            Regime::RangingDay => &self.band,
            Regime::RangingNight => &self.momentum,
        };
        delegate.generate_signal(ticker, market, snapshot).await
    }
}
