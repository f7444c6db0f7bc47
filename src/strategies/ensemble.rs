//! Ensemble strategy: time-of-day weighted vote over sub-strategies.

use async_trait::async_trait;
use chrono::Timelike;
use tracing::debug;

use crate::config::JobConfig;
use crate::error::EngineError;
use crate::exchange::MarketData;
use crate::models::{PositionSnapshot, Signal, TickerSymbol};

use super::{build_named, exchange_local_time, Strategy};

/// Weighted score a vote must clear before the ensemble emits a direction.
const SCORE_THRESHOLD: f64 = 0.4;

pub struct EnsembleStrategy {
    members: Vec<Box<dyn Strategy>>,
    base_weights: Vec<f64>,
}

impl EnsembleStrategy {
    pub fn new(config: &JobConfig) -> Result<Self, EngineError> {
        let names = &config.params.ensemble.members;
        let mut members = Vec::with_capacity(names.len());
        for name in names {
            if name == "ensemble" {
                return Err(EngineError::Config("ensemble cannot nest itself".into()));
            }
            members.push(build_named(name, config)?);
        }

        let base_weights = if config.params.ensemble.weights.is_empty() {
            vec![1.0; members.len()]
        } else {
            config.params.ensemble.weights.clone()
        };
        if base_weights.len() != members.len() {
            return Err(EngineError::Config(
                "ensemble weights must match members".into(),
            ));
        }

        Ok(Self {
            members,
            base_weights,
        })
    }

    /// Hour-of-day coefficient per member. Breakout carries most weight
    /// during the daytime session, band during the quiet overnight hours,
    /// momentum in the evening.
    fn time_weight(name: &str, hour: u32) -> f64 {
        match name {
            "breakout" if (9..=17).contains(&hour) => 1.25,
            "breakout" => 0.9,
            "band" if hour <= 8 => 1.25,
            "momentum" if hour >= 18 => 1.1,
            _ => 1.0,
        }
    }

    /// Combine sub-signals: at least two must agree in direction and the
    /// weighted score must clear the threshold.
    fn combine(&self, votes: &[(&str, Signal)], hour: u32) -> Signal {
        let mut score = 0.0;
        let mut total_weight = 0.0;
        let mut buys = 0usize;
        let mut sells = 0usize;

        for ((name, signal), base) in votes.iter().zip(&self.base_weights) {
            let direction = match signal {
                Signal::Buy => {
                    buys += 1;
                    1.0
                }
                Signal::Sell | Signal::PartialSell(_) => {
                    sells += 1;
                    -1.0
                }
                Signal::Hold => 0.0,
            };
            let weight = base * Self::time_weight(name, hour);
            score += direction * weight;
            total_weight += weight;
        }

        if total_weight <= f64::EPSILON {
            return Signal::Hold;
        }
        let score = score / total_weight;
        debug!(score, buys, sells, "ensemble vote");

        if buys >= 2 && score > SCORE_THRESHOLD {
            Signal::Buy
        } else if sells >= 2 && score < -SCORE_THRESHOLD {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

#[async_trait]
impl Strategy for EnsembleStrategy {
    fn name(&self) -> &'static str {
        "ensemble"
    }

    async fn generate_signal(
        &self,
        ticker: &TickerSymbol,
        market: &MarketData,
        snapshot: &PositionSnapshot,
    ) -> Result<Signal, EngineError> {
        let mut votes = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let signal = member.generate_signal(ticker, market, snapshot).await?;
            votes.push((member.name(), signal));
        }

        let hour = exchange_local_time().hour();
        Ok(self.combine(&votes, hour))
    }
}
