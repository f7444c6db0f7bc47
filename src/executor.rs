//! Order sizing and submission.
//!
//! Buys are volatility-adjusted and clamped against the configured cap and
//! available cash. Sells go through the minimum-order-value adjustment the
//! exchange forces on small positions. Every submitted order is confirmed
//! against a fresh balance read and recorded once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, info, warn};

use crate::config::JobConfig;
use crate::db::TradeLedger;
use crate::error::EngineError;
use crate::exchange::MarketData;
use crate::models::{
    Candle, PositionSnapshot, TickerSymbol, TradeRecord, TradeSide, MIN_ORDER_VALUE,
    MIN_TRADE_VOLUME,
};
use crate::notify::Notifier;

/// Fee cushion applied when bumping a sell up to the exchange minimum.
const MIN_ORDER_CUSHION: Decimal = dec!(1.02);

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Wait before the post-order balance read. Zero in tests.
    pub confirm_delay: Duration,
    /// Daily candles considered for the volatility adjustment.
    pub volatility_window: u32,
    /// Mean daily range ratio at or above this damps the buy to x0.7.
    pub high_volatility: f64,
    /// Mean daily range ratio at or below this boosts the buy to x1.3.
    pub low_volatility: f64,
    /// Hard ceiling on a single volatility-adjusted buy.
    pub max_single_order: Decimal,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            confirm_delay: Duration::from_secs(2),
            volatility_window: 7,
            high_volatility: 0.05,
            low_volatility: 0.02,
            max_single_order: dec!(50000),
        }
    }
}

/// What a dispatch attempt produced. Skips are normal outcomes, not errors.
#[derive(Debug)]
pub enum ExecutionOutcome {
    Executed(TradeRecord),
    Skipped(String),
}

pub struct OrderExecutor {
    market: Arc<MarketData>,
    ledger: Option<Arc<TradeLedger>>,
    notifier: Arc<dyn Notifier>,
    config: ExecutorConfig,
}

impl OrderExecutor {
    pub fn new(
        market: Arc<MarketData>,
        ledger: Option<Arc<TradeLedger>>,
        notifier: Arc<dyn Notifier>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            market,
            ledger,
            notifier,
            config,
        }
    }

    /// Size and submit a market buy.
    pub async fn execute_buy(
        &self,
        job: &JobConfig,
        snapshot: &PositionSnapshot,
    ) -> Result<ExecutionOutcome, EngineError> {
        let ticker = &job.ticker;

        // Sizing depends on the volatility read; without it no order goes out.
        let candles = self
            .market
            .candles(ticker, "day", self.config.volatility_window)
            .await?;
        let multiplier = volatility_multiplier(
            &candles,
            self.config.high_volatility,
            self.config.low_volatility,
        );

        let mut amount = (job.buy_amount * multiplier)
            .clamp(MIN_ORDER_VALUE, self.config.max_single_order);

        if job.max_order_amount > Decimal::ZERO {
            let headroom = job.max_order_amount - snapshot.invested_amount();
            if headroom < amount {
                amount = headroom;
            }
        }

        if amount < MIN_ORDER_VALUE {
            info!(ticker = %ticker, amount = %amount, "buy below exchange minimum, skipping");
            return Ok(ExecutionOutcome::Skipped(format!(
                "buy amount {amount} below minimum {MIN_ORDER_VALUE}"
            )));
        }

        let cash = self.market.balance(ticker.quote()).await?;
        if cash < job.min_cash + amount {
            info!(ticker = %ticker, cash = %cash, amount = %amount, "cash floor reached, skipping buy");
            return Ok(ExecutionOutcome::Skipped(format!(
                "cash {cash} below min_cash {} + amount {amount}",
                job.min_cash
            )));
        }
        let amount = amount.round_dp(0);

        let held_before = snapshot.held_volume;
        let result = self.market.market_buy(ticker, amount).await?;
        if !result.success {
            return Err(EngineError::OrderRejected(
                result.error.unwrap_or_else(|| "unknown".to_string()),
            ));
        }

        let filled = self.confirm_buy_fill(ticker, held_before).await;
        let volume = filled.unwrap_or_else(|| {
            if snapshot.current_price > Decimal::ZERO {
                (amount / snapshot.current_price).round_dp(8)
            } else {
                Decimal::ZERO
            }
        });
        let price = if volume > Decimal::ZERO {
            (amount / volume).round_dp(4)
        } else {
            snapshot.current_price
        };

        let record = TradeRecord {
            user_id: job.user_id.clone(),
            ticker: ticker.clone(),
            side: TradeSide::Buy,
            price,
            volume,
            amount,
            profit_loss: None,
            strategy: job.strategy.clone(),
            executed_at: Utc::now(),
        };
        self.record_trade(&record).await;

        Ok(ExecutionOutcome::Executed(record))
    }

    /// Validate, adjust, and submit a market sell of `portion` of the
    /// holding. `label` names what triggered it for the ledger.
    pub async fn execute_sell(
        &self,
        job: &JobConfig,
        snapshot: &PositionSnapshot,
        portion: Decimal,
        label: &str,
    ) -> Result<ExecutionOutcome, EngineError> {
        let ticker = &job.ticker;

        if portion <= Decimal::ZERO || portion > Decimal::ONE {
            return Err(EngineError::InvalidPortion(portion.to_string()));
        }
        if snapshot.held_volume <= MIN_TRADE_VOLUME {
            return Err(EngineError::NoBalance(ticker.base().to_string()));
        }

        if job.prevent_loss_sale {
            let break_even = snapshot.avg_buy_price * dec!(1.002);
            if snapshot.current_price < break_even {
                info!(
                    ticker = %ticker,
                    price = %snapshot.current_price,
                    break_even = %break_even,
                    "prevent_loss_sale blocked sale below break-even"
                );
                return Ok(ExecutionOutcome::Skipped(
                    "price below break-even with prevent_loss_sale".to_string(),
                ));
            }
        }

        let total_value = snapshot.held_value();
        let adjusted = adjust_sell_portion(total_value, portion)?;
        let mut volume = if adjusted >= Decimal::ONE {
            snapshot.held_volume
        } else {
            (snapshot.held_volume * adjusted).round_dp(8)
        };

        if volume <= MIN_TRADE_VOLUME {
            // Portion math can underflow the tradable minimum on tiny
            // holdings; the whole position is still worth selling if the
            // total passed the value check above.
            warn!(ticker = %ticker, volume = %volume, "sell volume underflow, selling full position");
            volume = snapshot.held_volume;
            if volume <= MIN_TRADE_VOLUME {
                return Err(EngineError::TooSmallVolume(volume.to_string()));
            }
        }

        let recomputed_value = volume * snapshot.current_price;
        if recomputed_value < MIN_ORDER_VALUE {
            // The adjusted portion should always clear the minimum; getting
            // here means the sizing math is wrong, not the market.
            return Err(EngineError::Invariant(format!(
                "adjusted sell value {recomputed_value} below minimum {MIN_ORDER_VALUE}"
            )));
        }

        let held_before = snapshot.held_volume;
        let mut result = self.market.market_sell(ticker, volume).await?;
        if !result.success && volume < held_before && is_too_small_volume(result.error.as_deref()) {
            // The exchange knows its own minimum better than our estimate
            // does; one resubmission with the whole position, then give up.
            warn!(
                ticker = %ticker,
                volume = %volume,
                "exchange rejected sell volume as too small, retrying with full position"
            );
            volume = held_before;
            result = self.market.market_sell(ticker, volume).await?;
        }
        if !result.success {
            return Err(EngineError::OrderRejected(
                result.error.unwrap_or_else(|| "unknown".to_string()),
            ));
        }

        let sold = self.confirm_sell_fill(ticker, held_before).await.unwrap_or(volume);
        let amount = (sold * snapshot.current_price).round_dp(0);
        let pnl = TradeRecord::realized_pnl(snapshot.current_price, snapshot.avg_buy_price, sold);

        let record = TradeRecord {
            user_id: job.user_id.clone(),
            ticker: ticker.clone(),
            side: TradeSide::Sell,
            price: snapshot.current_price,
            volume: sold,
            amount,
            profit_loss: Some(pnl),
            strategy: label.to_string(),
            executed_at: Utc::now(),
        };
        self.record_trade(&record).await;

        Ok(ExecutionOutcome::Executed(record))
    }

    /// Post-order balance delta for a buy. `None` when the read failed or
    /// the fill has not landed yet.
    async fn confirm_buy_fill(
        &self,
        ticker: &TickerSymbol,
        held_before: Decimal,
    ) -> Option<Decimal> {
        if !self.config.confirm_delay.is_zero() {
            tokio::time::sleep(self.config.confirm_delay).await;
        }
        match self.market.fresh_balance(ticker.base()).await {
            Ok(after) if after > held_before => Some(after - held_before),
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "fill confirmation read failed");
                None
            }
        }
    }

    async fn confirm_sell_fill(
        &self,
        ticker: &TickerSymbol,
        held_before: Decimal,
    ) -> Option<Decimal> {
        if !self.config.confirm_delay.is_zero() {
            tokio::time::sleep(self.config.confirm_delay).await;
        }
        match self.market.fresh_balance(ticker.base()).await {
            Ok(after) if after < held_before => Some(held_before - after),
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "fill confirmation read failed");
                None
            }
        }
    }

    /// Ledger write is fire-and-forget; notification is best effort. A
    /// trade that executed is never un-executed by bookkeeping failures.
    async fn record_trade(&self, record: &TradeRecord) {
        if let Some(ledger) = &self.ledger {
            let ledger = Arc::clone(ledger);
            let record = record.clone();
            tokio::spawn(async move {
                if let Err(err) = ledger.append_trade(&record).await {
                    error!(error = %err, "trade ledger append failed");
                }
            });
        }
        self.notifier.notify_trade(record).await;
    }
}

/// Exchange-side minimum-volume rejection. Worth one full-position retry;
/// any other rejection is terminal.
fn is_too_small_volume(error: Option<&str>) -> bool {
    error.is_some_and(|e| e.contains("too_small_volume") || e.contains("under_min"))
}

/// Buy-size multiplier from recent daily ranges. Wide ranges damp the
/// order, narrow ranges boost it, anything between is left alone.
pub fn volatility_multiplier(candles: &[Candle], high: f64, low: f64) -> Decimal {
    if candles.is_empty() {
        return Decimal::ONE;
    }
    let mean_ratio =
        candles.iter().map(Candle::range_ratio).sum::<f64>() / candles.len() as f64;
    if mean_ratio >= high {
        dec!(0.7)
    } else if mean_ratio <= low {
        dec!(1.3)
    } else {
        Decimal::ONE
    }
}

/// Lift a sell portion over the exchange minimum order value.
///
/// A requested portion whose estimated value clears the minimum passes
/// through untouched. Below it, a position worth less than the minimum
/// cannot be sold at all, a position worth less than twice the minimum is
/// escalated to a full sale, and anything larger gets the smallest portion
/// that clears the minimum with a fee cushion.
pub fn adjust_sell_portion(
    total_value: Decimal,
    portion: Decimal,
) -> Result<Decimal, EngineError> {
    let estimated = total_value * portion;
    if estimated >= MIN_ORDER_VALUE {
        return Ok(portion);
    }
    if total_value < MIN_ORDER_VALUE {
        return Err(EngineError::InsufficientTotalValue(format!(
            "held value {total_value} below minimum order {MIN_ORDER_VALUE}"
        )));
    }
    if total_value < MIN_ORDER_VALUE * dec!(2) {
        return Ok(Decimal::ONE);
    }
    let lifted = (MIN_ORDER_VALUE * MIN_ORDER_CUSHION / total_value).min(Decimal::ONE);
    Ok(lifted)
}
