//! Executed-trade records and exchange order minimums.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::TickerSymbol;

/// Exchange minimum order value in quote-currency units. Sell requests whose
/// estimated value falls below this are adjusted or rejected before
/// submission.
pub const MIN_ORDER_VALUE: Decimal = dec!(5000);

/// Smallest tradable base-asset volume. Anything at or below this counts as
/// no position.
pub const MIN_TRADE_VOLUME: Decimal = dec!(0.00000001);

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

/// Append-only record of one completed (or best-effort-estimated) order,
/// written to the trade ledger exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub user_id: String,
    pub ticker: TickerSymbol,
    pub side: TradeSide,
    pub price: Decimal,
    pub volume: Decimal,
    pub amount: Decimal,
    /// Realized quote-currency P&L; sells only.
    pub profit_loss: Option<Decimal>,
    pub strategy: String,
    pub executed_at: DateTime<Utc>,
}

impl TradeRecord {
    /// Realized P&L of a sell against an average buy price.
    pub fn realized_pnl(price: Decimal, avg_buy_price: Decimal, volume: Decimal) -> Decimal {
        (price - avg_buy_price) * volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realized_pnl() {
        assert_eq!(
            TradeRecord::realized_pnl(dec!(110), dec!(100), dec!(2)),
            dec!(20)
        );
        assert_eq!(
            TradeRecord::realized_pnl(dec!(90), dec!(100), dec!(2)),
            dec!(-20)
        );
    }
}
