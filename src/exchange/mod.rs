//! Exchange access: transport, retry wrapper, cache, and the read facade
//! the trading cycle goes through.

mod cache;
mod market_data;
mod rest;
mod retry;
mod types;

pub use cache::{CacheKind, CacheValue, MarketCache};
pub use market_data::{CacheTtls, MarketData};
pub use rest::RestExchange;
pub use retry::{ResilientExchange, RetryPolicy};
pub use types::{Exchange, OrderResult, Orderbook};
