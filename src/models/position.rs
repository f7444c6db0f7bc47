//! Read-consistent view of an open position.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::trade::MIN_TRADE_VOLUME;

/// Snapshot of a position assembled from cached reads at the start of a
/// cycle. The whole cycle decides against this one view; it is never
/// reassembled mid-cycle from re-queried values.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    /// Base-asset volume currently held.
    pub held_volume: Decimal,
    /// Volume-weighted average buy price, zero when nothing is held.
    pub avg_buy_price: Decimal,
    /// Last traded price at snapshot time.
    pub current_price: Decimal,
}

impl PositionSnapshot {
    /// Whether there is a position worth evaluating.
    pub fn has_position(&self) -> bool {
        self.held_volume > MIN_TRADE_VOLUME && self.avg_buy_price > Decimal::ZERO
    }

    /// Current quote-currency value of the holding.
    pub fn held_value(&self) -> Decimal {
        self.held_volume * self.current_price
    }

    /// Quote-currency amount already invested at the average buy price.
    pub fn invested_amount(&self) -> Decimal {
        self.held_volume * self.avg_buy_price
    }

    /// Signed return of the position as a fraction, `None` without a
    /// position.
    pub fn profit_rate(&self) -> Option<f64> {
        if !self.has_position() {
            return None;
        }
        ((self.current_price - self.avg_buy_price) / self.avg_buy_price).to_f64()
    }
}
