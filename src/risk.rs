//! Risk overrides: stop-loss, take-profit, trailing-stop.
//!
//! Evaluated every cycle ahead of the strategy signal. At most one action
//! fires; stop-loss is checked before take-profit before trailing-stop, and
//! the first matching condition wins.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

use crate::models::{PositionSnapshot, RiskAction, RiskKind};

#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Loss fraction at which the whole position is dumped.
    pub stop_loss: f64,
    /// Gain fraction at which half the position is realized.
    pub take_profit: f64,
    /// Gain fraction above which the trailing stop arms.
    pub trailing_trigger: f64,
    /// Fraction of the recent high below which the trailing stop fires.
    pub trailing_drawdown: Decimal,
    /// Candles of lookback used for the recent high.
    pub lookback: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss: -0.03,
            take_profit: 0.05,
            trailing_trigger: 0.03,
            trailing_drawdown: dec!(0.98),
            lookback: 24,
        }
    }
}

pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Evaluate the open position. `recent_high` is the highest high over
    /// the lookback window, when candle data was available.
    /// `prevent_loss_sale` suppresses the automatic stop-loss: explicit
    /// configuration overrides it.
    pub fn evaluate(
        &self,
        snapshot: &PositionSnapshot,
        recent_high: Option<Decimal>,
        prevent_loss_sale: bool,
    ) -> Option<RiskAction> {
        let rate = snapshot.profit_rate()?;

        if rate <= self.config.stop_loss {
            if prevent_loss_sale {
                warn!(
                    profit_rate = rate,
                    "stop-loss condition met but prevent_loss_sale is set"
                );
                return None;
            }
            return Some(RiskAction {
                kind: RiskKind::StopLoss,
                portion: Decimal::ONE,
                reason: format!("loss {:.2}% breached stop-loss", rate * 100.0),
            });
        }

        if rate >= self.config.take_profit {
            return Some(RiskAction {
                kind: RiskKind::TakeProfit,
                portion: dec!(0.5),
                reason: format!("gain {:.2}% hit take-profit", rate * 100.0),
            });
        }

        if rate > self.config.trailing_trigger {
            if let Some(high) = recent_high {
                if high > Decimal::ZERO
                    && snapshot.current_price < high * self.config.trailing_drawdown
                {
                    return Some(RiskAction {
                        kind: RiskKind::TrailingStop,
                        portion: dec!(0.7),
                        reason: format!(
                            "price {} fell below {:.0}% of recent high {}",
                            snapshot.current_price,
                            self.config.trailing_drawdown.to_f64().unwrap_or(0.98) * 100.0,
                            high
                        ),
                    });
                }
            }
        }

        None
    }

    pub fn lookback(&self) -> u32 {
        self.config.lookback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> RiskManager {
        RiskManager::new(RiskConfig::default())
    }

    fn snapshot(avg: Decimal, price: Decimal) -> PositionSnapshot {
        PositionSnapshot {
            held_volume: dec!(1),
            avg_buy_price: avg,
            current_price: price,
        }
    }

    #[test]
    fn test_stop_loss_fires_full_portion() {
        // -5% loss, prevention off.
        let action = manager()
            .evaluate(&snapshot(dec!(100), dec!(95)), None, false)
            .unwrap();
        assert_eq!(action.kind, RiskKind::StopLoss);
        assert_eq!(action.portion, Decimal::ONE);
    }

    #[test]
    fn test_prevent_loss_sale_suppresses_stop_loss() {
        let action = manager().evaluate(&snapshot(dec!(100), dec!(95)), None, true);
        assert!(action.is_none());
    }

    #[test]
    fn test_take_profit_fires_half_portion() {
        let action = manager()
            .evaluate(&snapshot(dec!(100), dec!(106)), None, false)
            .unwrap();
        assert_eq!(action.kind, RiskKind::TakeProfit);
        assert_eq!(action.portion, dec!(0.5));
    }

    #[test]
    fn test_stop_loss_checked_before_take_profit() {
        // Both thresholds can't be true at once for one snapshot, but the
        // ordering shows at exactly the stop boundary.
        let action = manager()
            .evaluate(&snapshot(dec!(100), dec!(97)), None, false)
            .unwrap();
        assert_eq!(action.kind, RiskKind::StopLoss);
    }

    #[test]
    fn test_trailing_stop_needs_trigger_and_drawdown() {
        // +4% gain, price 2.5% off the recent high.
        let action = manager()
            .evaluate(&snapshot(dec!(100), dec!(104)), Some(dec!(106.7)), false)
            .unwrap();
        assert_eq!(action.kind, RiskKind::TrailingStop);
        assert_eq!(action.portion, dec!(0.7));

        // Same gain but price still near the high: nothing fires.
        let action = manager().evaluate(&snapshot(dec!(100), dec!(104)), Some(dec!(105)), false);
        assert!(action.is_none());

        // No recent high available: trailing stop cannot fire.
        let action = manager().evaluate(&snapshot(dec!(100), dec!(104)), None, false);
        assert!(action.is_none());
    }

    #[test]
    fn test_no_position_no_action() {
        let flat = PositionSnapshot {
            held_volume: Decimal::ZERO,
            avg_buy_price: Decimal::ZERO,
            current_price: dec!(100),
        };
        assert!(manager().evaluate(&flat, None, false).is_none());
    }

    #[test]
    fn test_small_gain_no_action() {
        let action = manager().evaluate(&snapshot(dec!(100), dec!(102)), Some(dec!(110)), false);
        assert!(action.is_none());
    }
}
