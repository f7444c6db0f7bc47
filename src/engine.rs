//! One trading cycle: snapshot, risk overrides, strategy signal, dispatch.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::JobConfig;
use crate::error::EngineError;
use crate::exchange::MarketData;
use crate::executor::{ExecutionOutcome, OrderExecutor};
use crate::models::{PositionSnapshot, Signal, MIN_TRADE_VOLUME};
use crate::risk::RiskManager;
use crate::strategies::build_strategy;

/// What a finished cycle decided and did. Surfaced to the scheduler for
/// logging and to the status view.
#[derive(Debug)]
pub enum CycleOutcome {
    Traded(ExecutionOutcome),
    RiskTriggered(ExecutionOutcome),
    Held,
    Skipped(String),
}

pub struct TradingEngine {
    market: Arc<MarketData>,
    executor: OrderExecutor,
    risk: RiskManager,
}

impl TradingEngine {
    pub fn new(market: Arc<MarketData>, executor: OrderExecutor, risk: RiskManager) -> Self {
        Self {
            market,
            executor,
            risk,
        }
    }

    /// Run one decision cycle for a job. Every decision in the cycle reads
    /// the same snapshot; risk overrides preempt the strategy entirely.
    pub async fn run_cycle(&self, job: &JobConfig) -> Result<CycleOutcome, EngineError> {
        let ticker = &job.ticker;
        let snapshot = self.market.snapshot(ticker).await?;

        if snapshot.has_position() {
            let recent_high = self.recent_high(job).await;
            if let Some(action) = self.risk.evaluate(
                &snapshot,
                recent_high,
                job.prevent_loss_sale,
            ) {
                info!(
                    ticker = %ticker,
                    kind = action.kind.as_str(),
                    portion = %action.portion,
                    reason = %action.reason,
                    "risk override triggered"
                );
                if job.long_term_investment {
                    info!(ticker = %ticker, "long_term_investment holds through risk override");
                    return Ok(CycleOutcome::Skipped("long_term_investment".to_string()));
                }
                let label = format!("risk:{}", action.kind.as_str());
                let outcome = self
                    .executor
                    .execute_sell(job, &snapshot, action.portion, &label)
                    .await?;
                return Ok(CycleOutcome::RiskTriggered(outcome));
            }
        }

        let strategy = build_strategy(job)?;
        let signal = strategy.generate_signal(ticker, &self.market, &snapshot).await?;
        info!(ticker = %ticker, strategy = strategy.name(), signal = signal.as_str(), "signal");

        match signal {
            Signal::Buy => {
                let outcome = self.executor.execute_buy(job, &snapshot).await?;
                Ok(CycleOutcome::Traded(outcome))
            }
            Signal::Sell => self.dispatch_sell(job, &snapshot, job.sell_portion).await,
            Signal::PartialSell(portion) => self.dispatch_sell(job, &snapshot, portion).await,
            Signal::Hold => Ok(CycleOutcome::Held),
        }
    }

    async fn dispatch_sell(
        &self,
        job: &JobConfig,
        snapshot: &PositionSnapshot,
        portion: Decimal,
    ) -> Result<CycleOutcome, EngineError> {
        if job.long_term_investment {
            info!(ticker = %job.ticker, "long_term_investment holds through sell signal");
            return Ok(CycleOutcome::Skipped("long_term_investment".to_string()));
        }
        if snapshot.held_volume <= MIN_TRADE_VOLUME {
            return Ok(CycleOutcome::Skipped("sell signal with no position".to_string()));
        }
        let outcome = self
            .executor
            .execute_sell(job, snapshot, portion, &job.strategy)
            .await?;
        Ok(CycleOutcome::Traded(outcome))
    }

    /// Highest high over the risk lookback, for the trailing stop. A failed
    /// candle read disables the trailing stop for this cycle only.
    async fn recent_high(&self, job: &JobConfig) -> Option<Decimal> {
        match self
            .market
            .candles(&job.ticker, &job.candle_interval, self.risk.lookback())
            .await
        {
            Ok(candles) => candles.iter().map(|c| c.high).max(),
            Err(err) => {
                warn!(error = %err, "recent-high lookup failed, trailing stop inactive");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use crate::executor::ExecutorConfig;
    use crate::models::{Candle, TickerSymbol};
    use crate::notify::LogNotifier;
    use crate::risk::RiskConfig;
    use crate::testutil::{candle, market_data, FakeExchange};

    fn engine(fake: Arc<FakeExchange>) -> TradingEngine {
        let market = Arc::new(market_data(fake));
        let executor = OrderExecutor::new(
            Arc::clone(&market),
            None,
            Arc::new(LogNotifier),
            ExecutorConfig {
                confirm_delay: Duration::ZERO,
                ..ExecutorConfig::default()
            },
        );
        TradingEngine::new(market, executor, RiskManager::new(RiskConfig::default()))
    }

    fn job() -> JobConfig {
        JobConfig {
            user_id: "u1".to_string(),
            ticker: TickerSymbol::new("KRW-BTC"),
            strategy: "band".to_string(),
            candle_interval: "minute60".to_string(),
            buy_amount: dec!(10000),
            min_cash: Decimal::ZERO,
            sleep_time: 600,
            sell_portion: dec!(0.5),
            prevent_loss_sale: false,
            long_term_investment: false,
            max_order_amount: Decimal::ZERO,
            params: Default::default(),
        }
    }

    // Flat closes give the band strategy nothing to act on.
    fn flat_candles(price: Decimal, count: usize) -> Vec<Candle> {
        (0..count).map(|_| candle(price, price, price, price)).collect()
    }

    #[tokio::test]
    async fn test_risk_stop_loss_preempts_strategy() {
        let fake = Arc::new(FakeExchange::new());
        // Holding 1 BTC bought at 10000, now 9400: -6% breaches stop-loss.
        fake.set_price(dec!(9400));
        fake.set_balance("BTC", dec!(1));
        fake.set_avg_buy_price(dec!(10000));
        fake.set_candles(flat_candles(dec!(9400), 40));

        let outcome = engine(Arc::clone(&fake)).run_cycle(&job()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::RiskTriggered(_)));
        // Full position sold.
        assert_eq!(fake.sells.lock().unwrap()[0].1, dec!(1));
    }

    #[tokio::test]
    async fn test_long_term_investment_blocks_risk_sell() {
        let fake = Arc::new(FakeExchange::new());
        // -6% breaches the stop-loss, but the job never sells.
        fake.set_price(dec!(9400));
        fake.set_balance("BTC", dec!(1));
        fake.set_avg_buy_price(dec!(10000));
        fake.set_candles(flat_candles(dec!(9400), 40));

        let mut config = job();
        config.long_term_investment = true;
        let outcome = engine(Arc::clone(&fake)).run_cycle(&config).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Skipped(_)));
        assert!(fake.sells.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prevent_loss_sale_falls_through_to_strategy() {
        let fake = Arc::new(FakeExchange::new());
        fake.set_price(dec!(9400));
        fake.set_balance("BTC", dec!(1));
        fake.set_avg_buy_price(dec!(10000));
        fake.set_candles(flat_candles(dec!(9400), 40));

        let mut config = job();
        config.prevent_loss_sale = true;
        let outcome = engine(Arc::clone(&fake)).run_cycle(&config).await.unwrap();
        // Stop-loss suppressed; flat band holds.
        assert!(matches!(outcome, CycleOutcome::Held));
        assert!(fake.sells.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sell_signal_without_position_is_skipped() {
        let fake = Arc::new(FakeExchange::new());
        fake.set_price(dec!(100));
        fake.set_balance("BTC", Decimal::ZERO);
        fake.set_candles(flat_candles(dec!(100), 40));

        let eng = engine(Arc::clone(&fake));
        let snapshot = PositionSnapshot {
            held_volume: Decimal::ZERO,
            avg_buy_price: Decimal::ZERO,
            current_price: dec!(100),
        };
        let outcome = eng.dispatch_sell(&job(), &snapshot, dec!(0.5)).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Skipped(_)));
        assert!(fake.sells.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_long_term_investment_holds_through_sell() {
        let fake = Arc::new(FakeExchange::new());
        let eng = engine(Arc::clone(&fake));

        let mut config = job();
        config.long_term_investment = true;
        let snapshot = PositionSnapshot {
            held_volume: dec!(1),
            avg_buy_price: dec!(100),
            current_price: dec!(110),
        };
        let outcome = eng.dispatch_sell(&config, &snapshot, dec!(0.5)).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Skipped(_)));
        assert!(fake.sells.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flat_market_holds() {
        let fake = Arc::new(FakeExchange::new());
        fake.set_price(dec!(100));
        fake.set_balance("KRW", dec!(100000));
        fake.set_candles(flat_candles(dec!(100), 40));

        let outcome = engine(Arc::clone(&fake)).run_cycle(&job()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Held));
    }
}
