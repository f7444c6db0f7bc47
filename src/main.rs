//! Crypto trading engine.
//!
//! Runs strategy-driven trading jobs against an exchange REST API, with
//! volatility-aware sizing, risk overrides, and an append-only trade ledger.

mod config;
mod db;
mod engine;
mod error;
mod exchange;
mod executor;
mod models;
mod notify;
mod risk;
mod scheduler;
mod strategies;
#[cfg(test)]
mod testutil;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::JobsFile;
use crate::db::TradeLedger;
use crate::engine::TradingEngine;
use crate::exchange::{CacheTtls, MarketCache, MarketData, ResilientExchange, RestExchange, RetryPolicy};
use crate::executor::{ExecutorConfig, OrderExecutor};
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::risk::{RiskConfig, RiskManager};
use crate::scheduler::JobScheduler;

/// Trading engine CLI.
#[derive(Parser)]
#[command(name = "coinpilot")]
#[command(about = "Strategy-driven crypto trading engine", long_about = None)]
struct Cli {
    /// Trade ledger database path
    #[arg(short, long, default_value = "sqlite:./coinpilot.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start trading every job in the jobs file
    Run {
        /// Jobs file (JSON)
        #[arg(short, long, default_value = "jobs.json")]
        jobs: String,
    },

    /// Validate a jobs file without trading
    Check {
        /// Jobs file (JSON)
        #[arg(short, long, default_value = "jobs.json")]
        jobs: String,
    },

    /// Show a user's trade history and aggregate stats
    Status {
        /// User id to report on
        user: String,

        /// Number of recent trades to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Check { jobs } => {
            let file = JobsFile::load(&jobs)?;
            let mut failures = 0;
            for job in &file.jobs {
                let id = JobScheduler::job_id(job);
                match job.validate() {
                    Ok(()) => println!("{id:<30} ok"),
                    Err(err) => {
                        failures += 1;
                        println!("{id:<30} {err}");
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} invalid job(s)");
            }
            println!("{} job(s) valid", file.jobs.len());
        }

        Commands::Status { user, limit } => {
            let ledger = TradeLedger::new(&cli.database).await?;

            let stats = ledger.trade_stats(&user).await?;
            println!("\nUser: {user}");
            println!("  Trades:       {}", stats.total_trades);
            println!("  Buys:         {}", stats.buy_count);
            println!("  Sells:        {}", stats.sell_count);
            println!("  Bought:       {:.0}", stats.total_bought);
            println!("  Sold:         {:.0}", stats.total_sold);
            println!("  Realized P&L: {:.0}", stats.realized_pnl);

            let trades = ledger.recent_trades(&user, limit).await?;
            if trades.is_empty() {
                return Ok(());
            }
            println!(
                "\n{:<24} {:<10} {:<5} {:>14} {:>14} {:>12}",
                "EXECUTED", "TICKER", "SIDE", "PRICE", "VOLUME", "AMOUNT"
            );
            println!("{}", "-".repeat(84));
            for trade in trades {
                println!(
                    "{:<24} {:<10} {:<5} {:>14.2} {:>14.8} {:>12.0}",
                    trade.executed_at, trade.ticker, trade.side, trade.price, trade.volume,
                    trade.amount
                );
            }
        }

        Commands::Run { jobs } => {
            let file = JobsFile::load(&jobs)?;
            info!(jobs = file.jobs.len(), "loaded jobs file");

            let rest = RestExchange::from_env()?;
            let client = ResilientExchange::new(Arc::new(rest), RetryPolicy::default());
            let market = Arc::new(MarketData::new(
                client,
                MarketCache::new(64),
                CacheTtls::default(),
            ));

            let ledger = Arc::new(TradeLedger::new(&cli.database).await?);
            let notifier: Arc<dyn Notifier> = match WebhookNotifier::from_env() {
                Some(webhook) => Arc::new(webhook),
                None => Arc::new(LogNotifier),
            };

            let executor = OrderExecutor::new(
                Arc::clone(&market),
                Some(ledger),
                notifier,
                ExecutorConfig::default(),
            );
            let engine = Arc::new(TradingEngine::new(
                market,
                executor,
                RiskManager::new(RiskConfig::default()),
            ));

            let scheduler = JobScheduler::new(engine);
            for job in file.jobs {
                match scheduler.start_job(job) {
                    Ok(id) => info!(job_id = %id, "scheduled"),
                    Err(err) => anyhow::bail!("failed to start job: {err}"),
                }
            }

            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received");
            scheduler.shutdown().await;
        }
    }

    Ok(())
}
