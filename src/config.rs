//! Per-job configuration.
//!
//! One explicit struct per job, validated once at job start. The engine
//! never branches on the config's representation at decision time.

use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::TickerSymbol;

pub const KNOWN_STRATEGIES: &[&str] = &["band", "breakout", "momentum", "ensemble", "adaptive"];

/// Everything one trading job needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub user_id: String,
    pub ticker: TickerSymbol,
    /// One of [`KNOWN_STRATEGIES`].
    pub strategy: String,

    /// Candle granularity string, e.g. `minute60` or `day`.
    #[serde(default = "default_candle_interval")]
    pub candle_interval: String,

    /// Base quote-currency amount per buy, before volatility adjustment.
    pub buy_amount: Decimal,

    /// Cash floor that must remain after a buy.
    #[serde(default)]
    pub min_cash: Decimal,

    /// Seconds between cycles.
    #[serde(default = "default_sleep_time")]
    pub sleep_time: u64,

    /// Fraction of the holding sold on a plain Sell signal.
    #[serde(default = "default_sell_portion")]
    pub sell_portion: Decimal,

    /// Block any sale below the break-even price (fee-adjusted).
    #[serde(default)]
    pub prevent_loss_sale: bool,

    /// Disables all selling; buys accumulate.
    #[serde(default)]
    pub long_term_investment: bool,

    /// Cap on total invested amount; zero means unlimited.
    #[serde(default)]
    pub max_order_amount: Decimal,

    #[serde(default)]
    pub params: StrategyParams,
}

fn default_candle_interval() -> String {
    "minute60".to_string()
}

fn default_sleep_time() -> u64 {
    600
}

fn default_sell_portion() -> Decimal {
    dec!(0.5)
}

/// Strategy-specific tuning knobs, all optional in the jobs file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyParams {
    #[serde(default)]
    pub band: BandParams,
    #[serde(default)]
    pub breakout: BreakoutParams,
    #[serde(default)]
    pub momentum: MomentumParams,
    #[serde(default)]
    pub ensemble: EnsembleParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandParams {
    pub window: usize,
    pub multiplier: f64,
}

impl Default for BandParams {
    fn default() -> Self {
        Self {
            window: 20,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakoutParams {
    /// Range multiplier on yesterday's high-low span.
    pub k: f64,
    /// Take-profit threshold as a fraction, e.g. 0.05.
    pub target_profit: f64,
    /// Stop-loss threshold as a positive fraction, e.g. 0.03.
    pub stop_loss: f64,
}

impl Default for BreakoutParams {
    fn default() -> Self {
        Self {
            k: 0.5,
            target_profit: 0.05,
            stop_loss: 0.03,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumParams {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
    /// Slower interval for multi-timeframe confirmation.
    pub slow_interval: String,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
            slow_interval: "minute240".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleParams {
    /// Sub-strategy names; at least two.
    pub members: Vec<String>,
    /// Base weight per member, same order. Empty means equal weights.
    pub weights: Vec<f64>,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            members: vec!["band".to_string(), "momentum".to_string()],
            weights: Vec::new(),
        }
    }
}

impl JobConfig {
    /// Validate once at job start. After this the engine trusts the values.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !KNOWN_STRATEGIES.contains(&self.strategy.as_str()) {
            return Err(EngineError::Config(format!(
                "unknown strategy '{}'",
                self.strategy
            )));
        }
        if self.buy_amount <= Decimal::ZERO {
            return Err(EngineError::Config("buy_amount must be positive".into()));
        }
        if self.sell_portion <= Decimal::ZERO || self.sell_portion > Decimal::ONE {
            return Err(EngineError::Config(format!(
                "sell_portion must be in (0, 1], got {}",
                self.sell_portion
            )));
        }
        if self.sleep_time == 0 {
            return Err(EngineError::Config("sleep_time must be positive".into()));
        }
        if self.min_cash < Decimal::ZERO || self.max_order_amount < Decimal::ZERO {
            return Err(EngineError::Config(
                "min_cash and max_order_amount must be non-negative".into(),
            ));
        }
        if self.params.band.window < 2 {
            return Err(EngineError::Config("band window must be >= 2".into()));
        }
        if self.params.momentum.period < 2 {
            return Err(EngineError::Config("momentum period must be >= 2".into()));
        }
        if self.params.momentum.oversold >= self.params.momentum.overbought {
            return Err(EngineError::Config(
                "momentum oversold must be below overbought".into(),
            ));
        }
        if self.strategy == "ensemble" {
            let members = &self.params.ensemble.members;
            if members.len() < 2 {
                return Err(EngineError::Config(
                    "ensemble needs at least two members".into(),
                ));
            }
            for member in members {
                if member == "ensemble" || !KNOWN_STRATEGIES.contains(&member.as_str()) {
                    return Err(EngineError::Config(format!(
                        "invalid ensemble member '{member}'"
                    )));
                }
            }
            let weights = &self.params.ensemble.weights;
            if !weights.is_empty() && weights.len() != members.len() {
                return Err(EngineError::Config(
                    "ensemble weights must match members".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Jobs file fed to the `run` subcommand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsFile {
    pub jobs: Vec<JobConfig>,
}

impl JobsFile {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let file: JobsFile = serde_json::from_str(&raw)?;
        Ok(file)
    }
}
