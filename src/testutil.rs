//! Shared test doubles. Compiled only for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::ExchangeError;
use crate::exchange::{
    CacheTtls, Exchange, MarketCache, MarketData, OrderResult, Orderbook, ResilientExchange,
    RetryPolicy,
};
use crate::models::{Candle, TickerSymbol};

/// Scripted in-memory exchange. Every read serves the configured state;
/// orders are recorded and answered from a response queue (accepted by
/// default).
#[derive(Default)]
pub struct FakeExchange {
    price: Mutex<Option<Decimal>>,
    balances: Mutex<HashMap<String, Decimal>>,
    avg_buy_price: Mutex<Option<Decimal>>,
    candles: Mutex<Vec<Candle>>,
    orderbook: Mutex<Option<Orderbook>>,

    order_responses: Mutex<VecDeque<OrderResult>>,
    pub buys: Mutex<Vec<(String, Decimal)>>,
    pub sells: Mutex<Vec<(String, Decimal)>>,
    pub price_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
}

impl FakeExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, price: Decimal) {
        *self.price.lock().unwrap() = Some(price);
    }

    pub fn set_balance(&self, asset: &str, amount: Decimal) {
        self.balances
            .lock()
            .unwrap()
            .insert(asset.to_string(), amount);
    }

    pub fn set_avg_buy_price(&self, price: Decimal) {
        *self.avg_buy_price.lock().unwrap() = Some(price);
    }

    pub fn set_candles(&self, candles: Vec<Candle>) {
        *self.candles.lock().unwrap() = candles;
    }

    pub fn set_orderbook(&self, orderbook: Orderbook) {
        *self.orderbook.lock().unwrap() = Some(orderbook);
    }

    pub fn queue_order_response(&self, response: OrderResult) {
        self.order_responses.lock().unwrap().push_back(response);
    }

    fn next_order_response(&self) -> OrderResult {
        self.order_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| OrderResult::accepted("fake-order"))
    }
}

#[async_trait]
impl Exchange for FakeExchange {
    async fn price(&self, _ticker: &TickerSymbol) -> Result<Option<Decimal>, ExchangeError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.price.lock().unwrap())
    }

    async fn balance(&self, asset: &str) -> Result<Option<Decimal>, ExchangeError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(
            self.balances
                .lock()
                .unwrap()
                .get(asset)
                .copied()
                .unwrap_or(Decimal::ZERO),
        ))
    }

    async fn avg_buy_price(
        &self,
        _ticker: &TickerSymbol,
    ) -> Result<Option<Decimal>, ExchangeError> {
        Ok(Some(
            self.avg_buy_price.lock().unwrap().unwrap_or(Decimal::ZERO),
        ))
    }

    async fn candles(
        &self,
        _ticker: &TickerSymbol,
        _interval: &str,
        count: u32,
    ) -> Result<Option<Vec<Candle>>, ExchangeError> {
        let candles = self.candles.lock().unwrap();
        if candles.is_empty() {
            return Ok(None);
        }
        let start = candles.len().saturating_sub(count as usize);
        Ok(Some(candles[start..].to_vec()))
    }

    async fn orderbook(&self, _ticker: &TickerSymbol) -> Result<Option<Orderbook>, ExchangeError> {
        Ok(self.orderbook.lock().unwrap().clone())
    }

    async fn market_buy(
        &self,
        ticker: &TickerSymbol,
        amount: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        self.buys
            .lock()
            .unwrap()
            .push((ticker.to_string(), amount));
        Ok(self.next_order_response())
    }

    async fn market_sell(
        &self,
        ticker: &TickerSymbol,
        volume: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        self.sells
            .lock()
            .unwrap()
            .push((ticker.to_string(), volume));
        Ok(self.next_order_response())
    }
}

/// `MarketData` over a fake exchange with no retry delays.
pub fn market_data(fake: Arc<FakeExchange>) -> MarketData {
    let policy = RetryPolicy {
        max_retries: 1,
        base_delay: Duration::ZERO,
        factor: 1.0,
        rate_limit_multiplier: 1.0,
    };
    MarketData::new(
        ResilientExchange::new(fake, policy),
        MarketCache::new(64),
        CacheTtls::default(),
    )
}

/// Daily candle with a given open and high-low span, close at the open.
pub fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
    Candle {
        open,
        high,
        low,
        close,
        volume: dec!(100),
        timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    }
}
