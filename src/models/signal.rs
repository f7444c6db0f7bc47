//! Strategy signals and risk overrides.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Recommended action for one trading cycle.
///
/// `PartialSell` always carries a ratio in (0, 1]; use
/// [`Signal::partial_sell`] to construct one so the invariant holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "signal", content = "ratio")]
pub enum Signal {
    Buy,
    Sell,
    PartialSell(Decimal),
    Hold,
}

impl Signal {
    /// Build a `PartialSell`, clamping the ratio into (0, 1]. A non-positive
    /// ratio degrades to `Hold` rather than producing an invalid variant.
    pub fn partial_sell(ratio: Decimal) -> Self {
        if ratio <= Decimal::ZERO {
            return Signal::Hold;
        }
        Signal::PartialSell(ratio.min(Decimal::ONE))
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Signal::Sell | Signal::PartialSell(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::PartialSell(_) => "PARTIAL_SELL",
            Signal::Hold => "HOLD",
        }
    }
}

/// Which risk rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskKind {
    StopLoss,
    TakeProfit,
    TrailingStop,
}

impl RiskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskKind::StopLoss => "stop_loss",
            RiskKind::TakeProfit => "take_profit",
            RiskKind::TrailingStop => "trailing_stop",
        }
    }
}

/// A risk override. When present it supersedes the strategy signal for the
/// current cycle.
#[derive(Debug, Clone)]
pub struct RiskAction {
    pub kind: RiskKind,
    /// Fraction of the held volume to sell, in (0, 1].
    pub portion: Decimal,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_partial_sell_clamps_ratio() {
        assert_eq!(Signal::partial_sell(dec!(1.5)), Signal::PartialSell(dec!(1)));
        assert_eq!(Signal::partial_sell(dec!(0.4)), Signal::PartialSell(dec!(0.4)));
    }

    #[test]
    fn test_partial_sell_rejects_non_positive() {
        assert_eq!(Signal::partial_sell(Decimal::ZERO), Signal::Hold);
        assert_eq!(Signal::partial_sell(dec!(-0.2)), Signal::Hold);
    }

    #[test]
    fn test_is_sell() {
        assert!(Signal::Sell.is_sell());
        assert!(Signal::partial_sell(dec!(0.3)).is_sell());
        assert!(!Signal::Buy.is_sell());
        assert!(!Signal::Hold.is_sell());
    }
}
