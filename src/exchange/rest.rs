//! REST exchange client (Upbit-style endpoint shapes).
//!
//! Kept deliberately thin: the engine only depends on the [`Exchange`]
//! trait, and this struct exists so the binary can run against a real
//! account. Quote endpoints are public; account and order endpoints send the
//! bearer token from `EXCHANGE_TOKEN`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::error::ExchangeError;
use crate::models::{Candle, TickerSymbol};

use super::types::{Exchange, OrderResult, Orderbook};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RestExchange {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct TickerDto {
    trade_price: Decimal,
}

#[derive(Deserialize)]
struct CandleDto {
    opening_price: Decimal,
    high_price: Decimal,
    low_price: Decimal,
    trade_price: Decimal,
    candle_acc_trade_volume: Decimal,
    timestamp: i64,
}

#[derive(Deserialize)]
struct AccountDto {
    currency: String,
    balance: Decimal,
    avg_buy_price: Decimal,
}

#[derive(Deserialize)]
struct OrderbookUnitDto {
    ask_price: Decimal,
    bid_price: Decimal,
}

#[derive(Deserialize)]
struct OrderbookDto {
    total_ask_size: Decimal,
    total_bid_size: Decimal,
    orderbook_units: Vec<OrderbookUnitDto>,
}

#[derive(Deserialize)]
struct OrderDto {
    uuid: String,
}

impl RestExchange {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ExchangeError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            token,
        })
    }

    /// Build from `EXCHANGE_URL` / `EXCHANGE_TOKEN` environment variables.
    pub fn from_env() -> Result<Self, ExchangeError> {
        let base_url =
            std::env::var("EXCHANGE_URL").unwrap_or_else(|_| "https://api.upbit.com".to_string());
        let token = std::env::var("EXCHANGE_TOKEN").ok();
        Self::new(base_url, token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        authed: bool,
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "exchange GET");

        let mut request = self.client.get(&url);
        if authed {
            let token = self
                .token
                .as_deref()
                .ok_or_else(|| ExchangeError::Api("EXCHANGE_TOKEN not configured".into()))?;
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::Http(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExchangeError::RateLimited);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Api(format!("{status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| ExchangeError::Api(e.to_string()))
    }

    async fn post_order(&self, params: &[(&str, String)]) -> Result<OrderResult, ExchangeError> {
        let url = format!("{}/v1/orders", self.base_url);
        debug!(url = %url, "exchange POST order");

        let token = self
            .token
            .as_deref()
            .ok_or_else(|| ExchangeError::Api("EXCHANGE_TOKEN not configured".into()))?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .form(params)
            .send()
            .await
            .map_err(|e| ExchangeError::Http(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExchangeError::RateLimited);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Ok(OrderResult::rejected(format!("{status}: {body}")));
        }

        let order: OrderDto = response
            .json()
            .await
            .map_err(|e| ExchangeError::Api(e.to_string()))?;
        Ok(OrderResult::accepted(order.uuid))
    }

    fn candle_path(interval: &str) -> Option<String> {
        match interval {
            "day" => Some("/v1/candles/days".to_string()),
            "week" => Some("/v1/candles/weeks".to_string()),
            other => other
                .strip_prefix("minute")
                .and_then(|unit| unit.parse::<u32>().ok())
                .map(|unit| format!("/v1/candles/minutes/{unit}")),
        }
    }
}

#[async_trait]
impl Exchange for RestExchange {
    async fn price(&self, ticker: &TickerSymbol) -> Result<Option<Decimal>, ExchangeError> {
        let path = format!("/v1/ticker?markets={ticker}");
        let tickers: Vec<TickerDto> = self.get_json(&path, false).await?;
        Ok(tickers.first().map(|t| t.trade_price))
    }

    async fn balance(&self, asset: &str) -> Result<Option<Decimal>, ExchangeError> {
        let accounts: Vec<AccountDto> = self.get_json("/v1/accounts", true).await?;
        // An asset the account has never touched is a genuine zero, not
        // missing data.
        Ok(Some(
            accounts
                .iter()
                .find(|a| a.currency == asset)
                .map(|a| a.balance)
                .unwrap_or(Decimal::ZERO),
        ))
    }

    async fn avg_buy_price(
        &self,
        ticker: &TickerSymbol,
    ) -> Result<Option<Decimal>, ExchangeError> {
        let accounts: Vec<AccountDto> = self.get_json("/v1/accounts", true).await?;
        Ok(Some(
            accounts
                .iter()
                .find(|a| a.currency == ticker.base())
                .map(|a| a.avg_buy_price)
                .unwrap_or(Decimal::ZERO),
        ))
    }

    async fn candles(
        &self,
        ticker: &TickerSymbol,
        interval: &str,
        count: u32,
    ) -> Result<Option<Vec<Candle>>, ExchangeError> {
        let base = Self::candle_path(interval)
            .ok_or_else(|| ExchangeError::Api(format!("unknown candle interval: {interval}")))?;
        let path = format!("{base}?market={ticker}&count={}", count.min(200));
        let dtos: Vec<CandleDto> = self.get_json(&path, false).await?;

        if dtos.is_empty() {
            return Ok(None);
        }

        // The exchange returns newest-first; the engine wants oldest-first.
        let mut candles: Vec<Candle> = dtos
            .into_iter()
            .filter_map(|c| {
                let timestamp = Utc.timestamp_millis_opt(c.timestamp).single()?;
                Some(Candle {
                    open: c.opening_price,
                    high: c.high_price,
                    low: c.low_price,
                    close: c.trade_price,
                    volume: c.candle_acc_trade_volume,
                    timestamp,
                })
            })
            .collect();
        candles.reverse();
        Ok(Some(candles))
    }

    async fn orderbook(&self, ticker: &TickerSymbol) -> Result<Option<Orderbook>, ExchangeError> {
        let path = format!("/v1/orderbook?markets={ticker}");
        let books: Vec<OrderbookDto> = self.get_json(&path, false).await?;
        let Some(book) = books.into_iter().next() else {
            return Ok(None);
        };
        let Some(top) = book.orderbook_units.first() else {
            return Ok(None);
        };
        Ok(Some(Orderbook {
            best_bid: top.bid_price,
            best_ask: top.ask_price,
            total_bid_volume: book.total_bid_size,
            total_ask_volume: book.total_ask_size,
        }))
    }

    async fn market_buy(
        &self,
        ticker: &TickerSymbol,
        amount: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        self.post_order(&[
            ("market", ticker.to_string()),
            ("side", "bid".to_string()),
            ("ord_type", "price".to_string()),
            ("price", amount.to_string()),
        ])
        .await
    }

    async fn market_sell(
        &self,
        ticker: &TickerSymbol,
        volume: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        self.post_order(&[
            ("market", ticker.to_string()),
            ("side", "ask".to_string()),
            ("ord_type", "market".to_string()),
            ("volume", volume.to_string()),
        ])
        .await
    }
}
