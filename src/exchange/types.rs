//! Exchange capability surface.
//!
//! The wire protocol itself is out of scope; everything above this trait
//! treats the exchange as a capability that may return an "unavailable"
//! sentinel (`Ok(None)`) instead of raising.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ExchangeError;
use crate::models::{Candle, TickerSymbol};

/// Result of an order submission. Created by the exchange layer, consumed
/// once by the executor, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub success: bool,
    /// `None` means fill state unknown; success does not imply an immediate
    /// fill.
    pub filled: Option<bool>,
    pub uuid: Option<String>,
    pub error: Option<String>,
}

impl OrderResult {
    pub fn accepted(uuid: impl Into<String>) -> Self {
        Self {
            success: true,
            filled: None,
            uuid: Some(uuid.into()),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            filled: None,
            uuid: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregated orderbook view used by the sell-pressure filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orderbook {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub total_bid_volume: Decimal,
    pub total_ask_volume: Decimal,
}

impl Orderbook {
    /// Ask volume over bid volume; above 1 means more supply sitting on the
    /// book than demand. Neutral 1.0 when bids are empty.
    pub fn ask_bid_ratio(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        if self.total_bid_volume.is_zero() {
            return 1.0;
        }
        (self.total_ask_volume / self.total_bid_volume)
            .to_f64()
            .unwrap_or(1.0)
    }
}

/// Raw exchange operations. Reads return `Ok(None)` when the exchange
/// answered but had no usable data; callers must treat that as unavailable,
/// never as zero.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn price(&self, ticker: &TickerSymbol) -> Result<Option<Decimal>, ExchangeError>;

    async fn balance(&self, asset: &str) -> Result<Option<Decimal>, ExchangeError>;

    async fn avg_buy_price(&self, ticker: &TickerSymbol)
        -> Result<Option<Decimal>, ExchangeError>;

    async fn candles(
        &self,
        ticker: &TickerSymbol,
        interval: &str,
        count: u32,
    ) -> Result<Option<Vec<Candle>>, ExchangeError>;

    async fn orderbook(&self, ticker: &TickerSymbol) -> Result<Option<Orderbook>, ExchangeError>;

    /// Market buy spending `amount` quote-currency units.
    async fn market_buy(
        &self,
        ticker: &TickerSymbol,
        amount: Decimal,
    ) -> Result<OrderResult, ExchangeError>;

    /// Market sell of `volume` base-asset units.
    async fn market_sell(
        &self,
        ticker: &TickerSymbol,
        volume: Decimal,
    ) -> Result<OrderResult, ExchangeError>;
}
