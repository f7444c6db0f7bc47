//! Cached, retrying facade the trading cycle reads the market through.

use std::time::Duration;

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::EngineError;
use crate::models::{Candle, PositionSnapshot, TickerSymbol};

use super::cache::{CacheKind, CacheValue, MarketCache};
use super::retry::ResilientExchange;
use super::types::{OrderResult, Orderbook};

/// Per-operation-kind time-to-live.
#[derive(Debug, Clone)]
pub struct CacheTtls {
    pub price: Duration,
    pub balance: Duration,
    pub avg_buy_price: Duration,
    pub candles: Duration,
    pub orderbook: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            price: Duration::from_secs(10),
            balance: Duration::from_secs(30),
            avg_buy_price: Duration::from_secs(30),
            candles: Duration::from_secs(60),
            orderbook: Duration::from_secs(5),
        }
    }
}

/// Owns the market cache and the resilient client. All reads the engine
/// makes go through here; both order submissions invalidate the cache
/// synchronously before hitting the exchange.
pub struct MarketData {
    client: ResilientExchange,
    cache: MarketCache,
    ttls: CacheTtls,
}

impl MarketData {
    pub fn new(client: ResilientExchange, cache: MarketCache, ttls: CacheTtls) -> Self {
        Self {
            client,
            cache,
            ttls,
        }
    }

    pub async fn price(&self, ticker: &TickerSymbol) -> Result<Decimal, EngineError> {
        let value = self
            .cache
            .get_or_fetch(CacheKind::Price, ticker.as_str(), self.ttls.price, || async {
                self.client.price(ticker).await.map(CacheValue::Price)
            })
            .await?;
        match value {
            CacheValue::Price(p) => Ok(p),
            other => Err(EngineError::Invariant(format!(
                "price cache held {other:?}"
            ))),
        }
    }

    pub async fn balance(&self, asset: &str) -> Result<Decimal, EngineError> {
        let value = self
            .cache
            .get_or_fetch(CacheKind::Balance, asset, self.ttls.balance, || async {
                self.client.balance(asset).await.map(CacheValue::Balance)
            })
            .await?;
        match value {
            CacheValue::Balance(b) => Ok(b),
            other => Err(EngineError::Invariant(format!(
                "balance cache held {other:?}"
            ))),
        }
    }

    pub async fn avg_buy_price(&self, ticker: &TickerSymbol) -> Result<Decimal, EngineError> {
        let value = self
            .cache
            .get_or_fetch(
                CacheKind::AvgBuyPrice,
                ticker.as_str(),
                self.ttls.avg_buy_price,
                || async {
                    self.client
                        .avg_buy_price(ticker)
                        .await
                        .map(CacheValue::AvgBuyPrice)
                },
            )
            .await?;
        match value {
            CacheValue::AvgBuyPrice(p) => Ok(p),
            other => Err(EngineError::Invariant(format!(
                "avg-buy-price cache held {other:?}"
            ))),
        }
    }

    pub async fn candles(
        &self,
        ticker: &TickerSymbol,
        interval: &str,
        count: u32,
    ) -> Result<Vec<Candle>, EngineError> {
        let args = format!("{ticker}:{interval}:{count}");
        let value = self
            .cache
            .get_or_fetch(CacheKind::Candles, &args, self.ttls.candles, || async {
                self.client
                    .candles(ticker, interval, count)
                    .await
                    .map(CacheValue::Candles)
            })
            .await?;
        match value {
            CacheValue::Candles(c) => Ok(c),
            other => Err(EngineError::Invariant(format!(
                "candle cache held {other:?}"
            ))),
        }
    }

    pub async fn orderbook(&self, ticker: &TickerSymbol) -> Result<Orderbook, EngineError> {
        let value = self
            .cache
            .get_or_fetch(
                CacheKind::Orderbook,
                ticker.as_str(),
                self.ttls.orderbook,
                || async { self.client.orderbook(ticker).await.map(CacheValue::Orderbook) },
            )
            .await?;
        match value {
            CacheValue::Orderbook(o) => Ok(o),
            other => Err(EngineError::Invariant(format!(
                "orderbook cache held {other:?}"
            ))),
        }
    }

    /// Assemble the position view the whole cycle decides against. One set
    /// of cached reads; callers must not rebuild it mid-cycle.
    pub async fn snapshot(&self, ticker: &TickerSymbol) -> Result<PositionSnapshot, EngineError> {
        let current_price = self.price(ticker).await?;
        let held_volume = self.balance(ticker.base()).await?;
        let avg_buy_price = self.avg_buy_price(ticker).await?;

        Ok(PositionSnapshot {
            held_volume,
            avg_buy_price,
            current_price,
        })
    }

    /// Bypass the cache for a balance read; used by the executor's fill
    /// confirmation, which explicitly wants post-trade state.
    pub async fn fresh_balance(&self, asset: &str) -> Result<Decimal, EngineError> {
        self.client.balance(asset).await
    }

    /// Submit a market buy. The cache is cleared synchronously first so no
    /// stale pre-trade read survives the order, regardless of outcome.
    pub async fn market_buy(
        &self,
        ticker: &TickerSymbol,
        amount: Decimal,
    ) -> Result<OrderResult, EngineError> {
        self.cache.invalidate_all();
        debug!(ticker = %ticker, amount = %amount, "submitting market buy");
        self.client.market_buy(ticker, amount).await
    }

    /// Submit a market sell. Same invalidation discipline as buys.
    pub async fn market_sell(
        &self,
        ticker: &TickerSymbol,
        volume: Decimal,
    ) -> Result<OrderResult, EngineError> {
        self.cache.invalidate_all();
        debug!(ticker = %ticker, volume = %volume, "submitting market sell");
        self.client.market_sell(ticker, volume).await
    }

    #[cfg(test)]
    pub fn cache(&self) -> &MarketCache {
        &self.cache
    }
}
