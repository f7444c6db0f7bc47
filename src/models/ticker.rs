//! Ticker symbol for a tradable base/quote asset pair.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a tradable pair, e.g. `KRW-BTC`.
///
/// The quote currency comes first, exchange-style; the symbol is used as a
/// map key everywhere and never parsed beyond the two accessors below.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerSymbol(String);

impl TickerSymbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quote currency (the part before the dash), or the whole symbol if
    /// there is no dash.
    pub fn quote(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }

    /// Base asset (the part after the dash).
    pub fn base(&self) -> &str {
        self.0.split('-').nth(1).unwrap_or(&self.0)
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TickerSymbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
