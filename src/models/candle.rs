//! OHLCV candle data.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV candle. Produced by the exchange, consumed read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Candle {
    /// Candle range relative to the open, used as a daily-volatility proxy.
    /// Zero when the open is zero.
    pub fn range_ratio(&self) -> f64 {
        if self.open.is_zero() {
            return 0.0;
        }
        ((self.high - self.low) / self.open).to_f64().unwrap_or(0.0)
    }
}

/// Extract closes as `f64` for indicator math.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .filter_map(|c| c.close.to_f64())
        .collect()
}

/// Extract volumes as `f64`.
pub fn volumes(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .filter_map(|c| c.volume.to_f64())
        .collect()
}
