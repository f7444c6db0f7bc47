//! Engine error taxonomy.
//!
//! Every failure a cycle can hit maps to a named variant so callers can
//! distinguish "data unavailable" from validation problems from rejected
//! orders. `Unavailable` is deliberately its own variant: a read that
//! exhausted its retries must never be mistaken for a zero value.

use thiserror::Error;

/// Errors raised by the trading engine. All of these are caught at the
/// cycle boundary; none terminates a job's timer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Exchange data unavailable after exhausting retries.
    #[error("exchange data unavailable")]
    Unavailable,

    /// Sell portion outside (0, 1].
    #[error("invalid sell portion: {0}")]
    InvalidPortion(String),

    /// No balance to act on.
    #[error("no balance for {0}")]
    NoBalance(String),

    /// Order volume below the exchange minimum.
    #[error("order volume too small: {0}")]
    TooSmallVolume(String),

    /// Total held value below the minimum order value; no sell is possible.
    #[error("insufficient total value: {0}")]
    InsufficientTotalValue(String),

    /// Exchange rejected the order.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// A computed value violated an internal invariant. Logged at the
    /// highest severity; the cycle aborts without submitting.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Invalid job configuration, surfaced at job start.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// Errors from the raw exchange transport, below the retry wrapper.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The exchange signalled a rate limit; retries back off ×5.
    #[error("rate limited")]
    RateLimited,

    #[error("http error: {0}")]
    Http(String),

    #[error("exchange api error: {0}")]
    Api(String),
}

impl ExchangeError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ExchangeError::RateLimited)
    }
}

impl EngineError {
    /// Stable machine-readable kind for logs and ledger notes.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Unavailable => "unavailable",
            EngineError::InvalidPortion(_) => "invalid_portion",
            EngineError::NoBalance(_) => "no_balance",
            EngineError::TooSmallVolume(_) => "too_small_volume",
            EngineError::InsufficientTotalValue(_) => "insufficient_total_value",
            EngineError::OrderRejected(_) => "order_rejected",
            EngineError::Invariant(_) => "invariant",
            EngineError::Config(_) => "config",
            EngineError::Exchange(_) => "exchange",
        }
    }
}
