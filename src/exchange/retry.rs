//! Bounded retry with exponential backoff around every exchange operation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{EngineError, ExchangeError};
use crate::models::{Candle, TickerSymbol};

use super::types::{Exchange, OrderResult, Orderbook};

/// Backoff parameters. Attempt `i` (zero-based) is followed by a sleep of
/// `base_delay * factor^i`, multiplied by `rate_limit_multiplier` when the
/// failure was a rate-limit response.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub rate_limit_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            rate_limit_multiplier: 5.0,
        }
    }
}

impl RetryPolicy {
    /// Run `op` up to `max_retries` times. `Ok(None)` and `Err(_)` both
    /// count as retryable failures; exhausting every attempt yields
    /// `EngineError::Unavailable`, which callers must treat as "no data",
    /// never as zero.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, ExchangeError>>,
    {
        for attempt in 0..self.max_retries {
            let rate_limited = match op().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {
                    debug!(op = what, attempt, "exchange returned no data");
                    false
                }
                Err(e) => {
                    warn!(op = what, attempt, error = %e, "exchange call failed");
                    e.is_rate_limit()
                }
            };

            let mut delay = self.base_delay.mul_f64(self.factor.powi(attempt as i32));
            if rate_limited {
                delay = delay.mul_f64(self.rate_limit_multiplier);
            }
            sleep(delay).await;
        }

        warn!(op = what, retries = self.max_retries, "retries exhausted");
        Err(EngineError::Unavailable)
    }
}

/// Retry wrapper over a raw [`Exchange`]. The single point through which
/// all market data and order submission flow.
#[derive(Clone)]
pub struct ResilientExchange {
    inner: Arc<dyn Exchange>,
    policy: RetryPolicy,
}

impl ResilientExchange {
    pub fn new(inner: Arc<dyn Exchange>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub async fn price(&self, ticker: &TickerSymbol) -> Result<Decimal, EngineError> {
        self.policy
            .run("price", || self.inner.price(ticker))
            .await
    }

    pub async fn balance(&self, asset: &str) -> Result<Decimal, EngineError> {
        self.policy
            .run("balance", || self.inner.balance(asset))
            .await
    }

    pub async fn avg_buy_price(&self, ticker: &TickerSymbol) -> Result<Decimal, EngineError> {
        self.policy
            .run("avg_buy_price", || self.inner.avg_buy_price(ticker))
            .await
    }

    pub async fn candles(
        &self,
        ticker: &TickerSymbol,
        interval: &str,
        count: u32,
    ) -> Result<Vec<Candle>, EngineError> {
        self.policy
            .run("candles", || self.inner.candles(ticker, interval, count))
            .await
    }

    pub async fn orderbook(&self, ticker: &TickerSymbol) -> Result<Orderbook, EngineError> {
        self.policy
            .run("orderbook", || self.inner.orderbook(ticker))
            .await
    }

    /// Submit a market buy. Transport failures are retried; a response the
    /// exchange actually produced is terminal either way, so an order is
    /// never submitted twice.
    pub async fn market_buy(
        &self,
        ticker: &TickerSymbol,
        amount: Decimal,
    ) -> Result<OrderResult, EngineError> {
        self.policy
            .run("market_buy", || async {
                self.inner.market_buy(ticker, amount).await.map(Some)
            })
            .await
    }

    /// Submit a market sell. Same retry discipline as [`Self::market_buy`].
    pub async fn market_sell(
        &self,
        ticker: &TickerSymbol,
        volume: Decimal,
    ) -> Result<OrderResult, EngineError> {
        self.policy
            .run("market_sell", || async {
                self.inner.market_sell(ticker, volume).await.map(Some)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_unavailable() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            rate_limit_multiplier: 5.0,
        };
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<Decimal, EngineError> = policy
            .run("price", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            })
            .await;

        assert!(matches!(result, Err(EngineError::Unavailable)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 0.5s + 1.0s + 2.0s of backoff under paused time.
        assert_eq!(started.elapsed(), Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures_stops_retrying() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: Result<u32, EngineError> = policy
            .run("balance", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ExchangeError::Http("boom".into()))
                    } else {
                        Ok(Some(42))
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_extends_delay() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            rate_limit_multiplier: 5.0,
        };
        let started = Instant::now();

        let result: Result<Decimal, EngineError> = policy
            .run("price", || async { Err(ExchangeError::RateLimited) })
            .await;

        assert!(matches!(result, Err(EngineError::Unavailable)));
        // 0.5s*5 + 1.0s*5 under paused time.
        assert_eq!(started.elapsed(), Duration::from_millis(7500));
    }
}
