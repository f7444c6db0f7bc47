//! Momentum strategy: Wilder RSI crossings, divergence, and
//! multi-timeframe alignment with a volume-confirmation gate.

use async_trait::async_trait;
use tracing::debug;

use crate::config::MomentumParams;
use crate::error::EngineError;
use crate::exchange::MarketData;
use crate::models::{closes, volumes, PositionSnapshot, Signal, TickerSymbol};

use super::indicators;
use super::Strategy;

pub struct MomentumStrategy {
    params: MomentumParams,
    interval: String,
}

impl MomentumStrategy {
    pub fn new(params: MomentumParams, interval: String) -> Self {
        Self { params, interval }
    }

    /// Decide from the base-interval series plus the latest slow-interval
    /// RSI. Triggers are independent; the first that fires wins.
    fn evaluate(
        &self,
        close_series: &[f64],
        volume_series: &[f64],
        slow_rsi: Option<f64>,
    ) -> Signal {
        let period = self.params.period;
        let Some(series) = indicators::rsi_series(close_series, period) else {
            return Signal::Hold;
        };
        if series.len() < 2 {
            return Signal::Hold;
        }
        let current = series[series.len() - 1];
        let previous = series[series.len() - 2];

        let raw = self
            .crossing(previous, current)
            .or_else(|| self.divergence(close_series, &series))
            .or_else(|| self.timeframe_alignment(current, slow_rsi))
            .unwrap_or(Signal::Hold);

        // Volume gate: a buy without volume behind it is downgraded.
        if raw == Signal::Buy && !self.volume_confirms(volume_series) {
            debug!("momentum buy downgraded by volume gate");
            return Signal::Hold;
        }
        raw
    }

    fn crossing(&self, previous: f64, current: f64) -> Option<Signal> {
        if previous <= self.params.oversold && current > self.params.oversold {
            return Some(Signal::Buy);
        }
        if previous >= self.params.overbought && current < self.params.overbought {
            return Some(Signal::Sell);
        }
        None
    }

    /// Price/oscillator divergence over the last `period` points: a fresh
    /// price extreme the oscillator refuses to confirm.
    fn divergence(&self, close_series: &[f64], rsi_values: &[f64]) -> Option<Signal> {
        let lookback = self.params.period.min(rsi_values.len());
        if lookback < 3 {
            return None;
        }
        let n = close_series.len();
        let prices = &close_series[n - lookback..];
        let rsis = &rsi_values[rsi_values.len() - lookback..];
        let last = lookback - 1;

        // Extremes among the earlier points of the window.
        let (min_idx, _) = prices[..last]
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        let (max_idx, _) = prices[..last]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        // Bullish: lower price low, higher oscillator low.
        if prices[last] < prices[min_idx] && rsis[last] > rsis[min_idx] {
            return Some(Signal::Buy);
        }
        // Bearish: higher price high, lower oscillator high.
        if prices[last] > prices[max_idx] && rsis[last] < rsis[max_idx] {
            return Some(Signal::Sell);
        }
        None
    }

    /// Both timeframes stretched the same way.
    fn timeframe_alignment(&self, current: f64, slow_rsi: Option<f64>) -> Option<Signal> {
        let slow = slow_rsi?;
        if current < self.params.oversold && slow < self.params.oversold {
            return Some(Signal::Buy);
        }
        if current > self.params.overbought && slow > self.params.overbought {
            return Some(Signal::Sell);
        }
        None
    }

    fn volume_confirms(&self, volume_series: &[f64]) -> bool {
        let Some(avg) = indicators::mean(volume_series) else {
            // No volume data: do not block the signal on a missing read.
            return true;
        };
        volume_series.last().map_or(true, |last| *last >= avg)
    }
}

#[async_trait]
impl Strategy for MomentumStrategy {
    fn name(&self) -> &'static str {
        "momentum"
    }

    async fn generate_signal(
        &self,
        ticker: &TickerSymbol,
        market: &MarketData,
        _snapshot: &PositionSnapshot,
    ) -> Result<Signal, EngineError> {
        let count = (self.params.period * 3 + 2) as u32;
        let candles = market.candles(ticker, &self.interval, count).await?;
        let close_series = closes(&candles);
        let volume_series = volumes(&candles);

        // The slow timeframe is confirmation only; unavailable is neutral.
        let slow_rsi = match market
            .candles(ticker, &self.params.slow_interval, count)
            .await
        {
            Ok(slow) => indicators::rsi(&closes(&slow), self.params.period),
            Err(_) => None,
        };

        Ok(self.evaluate(&close_series, &volume_series, slow_rsi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy() -> MomentumStrategy {
        MomentumStrategy::new(
            MomentumParams {
                period: 14,
                oversold: 30.0,
                overbought: 70.0,
                slow_interval: "minute240".to_string(),
            },
            "minute60".to_string(),
        )
    }

    /// Falling series that turns up at the very end: the RSI crosses back up
    /// through the oversold line on the final close.
    fn oversold_recovery() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..30).map(|i| 200.0 - 4.0 * i as f64).collect();
        closes.push(closes[closes.len() - 1] + 30.0);
        closes
    }

    #[test]
    fn test_short_series_holds() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        assert_eq!(
            strategy().evaluate(&closes, &vec![10.0; 10], None),
            Signal::Hold
        );
    }

    #[test]
    fn test_oversold_crossing_buys() {
        let closes = oversold_recovery();
        let volumes = vec![10.0; closes.len()];
        assert_eq!(strategy().evaluate(&closes, &volumes, None), Signal::Buy);
    }

    #[test]
    fn test_volume_gate_downgrades_buy() {
        let closes = oversold_recovery();
        // Latest volume well below the rolling average.
        let mut volumes = vec![10.0; closes.len()];
        *volumes.last_mut().unwrap() = 1.0;
        assert_eq!(strategy().evaluate(&closes, &volumes, None), Signal::Hold);
    }

    #[test]
    fn test_overbought_crossing_sells() {
        // Rising series that breaks down at the end.
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 + 4.0 * i as f64).collect();
        closes.push(closes[closes.len() - 1] - 30.0);
        let volumes = vec![10.0; closes.len()];
        assert_eq!(strategy().evaluate(&closes, &volumes, None), Signal::Sell);
    }

    #[test]
    fn test_timeframe_alignment_sells_when_both_overbought() {
        // Steadily rising series keeps RSI pinned high without a crossing
        // or divergence; the slow timeframe agreeing forces the sell.
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + 2.0 * i as f64).collect();
        let volumes = vec![10.0; closes.len()];
        assert_eq!(
            strategy().evaluate(&closes, &volumes, Some(85.0)),
            Signal::Sell
        );
    }

    #[test]
    fn test_flat_series_holds() {
        let closes = vec![100.0; 40];
        let volumes = vec![10.0; 40];
        assert_eq!(strategy().evaluate(&closes, &volumes, None), Signal::Hold);
    }
}
