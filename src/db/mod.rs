//! Trade ledger persistence.
//!
//! Append-only record of every executed order plus simple aggregate stats.
//! Ledger writes never block or fail a trade; the executor fires them off
//! and logs failures.

use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::models::TradeRecord;

pub struct TradeLedger {
    pool: SqlitePool,
}

/// Row shape handed back from the ledger.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredTrade {
    pub id: i64,
    pub user_id: String,
    pub ticker: String,
    pub side: String,
    pub price: f64,
    pub volume: f64,
    pub amount: f64,
    pub profit_loss: Option<f64>,
    pub strategy: String,
    pub executed_at: String,
}

/// Aggregate stats over one user's trades.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct TradeStats {
    pub total_trades: i64,
    pub buy_count: i64,
    pub sell_count: i64,
    pub total_bought: f64,
    pub total_sold: f64,
    pub realized_pnl: f64,
}

impl TradeLedger {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to trade ledger database")?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;

        Ok(ledger)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                ticker TEXT NOT NULL,
                side TEXT NOT NULL,
                price REAL NOT NULL,
                volume REAL NOT NULL,
                amount REAL NOT NULL,
                profit_loss REAL,
                strategy TEXT NOT NULL,
                executed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_trades_user ON trades (user_id, executed_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn append_trade(&self, record: &TradeRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades (user_id, ticker, side, price, volume, amount, profit_loss, strategy, executed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.user_id)
        .bind(record.ticker.as_str())
        .bind(record.side.as_str())
        .bind(record.price.to_f64().unwrap_or(0.0))
        .bind(record.volume.to_f64().unwrap_or(0.0))
        .bind(record.amount.to_f64().unwrap_or(0.0))
        .bind(record.profit_loss.and_then(|p| p.to_f64()))
        .bind(&record.strategy)
        .bind(record.executed_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to insert trade record")?;

        Ok(())
    }

    /// Most recent trades for a user, newest first.
    pub async fn recent_trades(&self, user_id: &str, limit: i64) -> Result<Vec<StoredTrade>> {
        let rows = sqlx::query_as::<_, StoredTrade>(
            "SELECT * FROM trades WHERE user_id = ? ORDER BY executed_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn trade_stats(&self, user_id: &str) -> Result<TradeStats> {
        let stats = sqlx::query_as::<_, TradeStats>(
            r#"
            SELECT
                COUNT(*) AS total_trades,
                COALESCE(SUM(side = 'BUY'), 0) AS buy_count,
                COALESCE(SUM(side = 'SELL'), 0) AS sell_count,
                COALESCE(SUM(CASE WHEN side = 'BUY' THEN amount ELSE 0 END), 0.0) AS total_bought,
                COALESCE(SUM(CASE WHEN side = 'SELL' THEN amount ELSE 0 END), 0.0) AS total_sold,
                COALESCE(SUM(profit_loss), 0.0) AS realized_pnl
            FROM trades WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use crate::models::{TickerSymbol, TradeSide};

    fn record(side: TradeSide, amount: rust_decimal::Decimal) -> TradeRecord {
        TradeRecord {
            user_id: "u1".to_string(),
            ticker: TickerSymbol::new("KRW-BTC"),
            side,
            price: dec!(50000000),
            volume: dec!(0.0002),
            amount,
            profit_loss: match side {
                TradeSide::Sell => Some(dec!(150)),
                TradeSide::Buy => None,
            },
            strategy: "band".to_string(),
            executed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let ledger = TradeLedger::new("sqlite::memory:").await.unwrap();
        ledger
            .append_trade(&record(TradeSide::Buy, dec!(10000)))
            .await
            .unwrap();
        ledger
            .append_trade(&record(TradeSide::Sell, dec!(10150)))
            .await
            .unwrap();

        let trades = ledger.recent_trades("u1", 10).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, "SELL");
        assert_eq!(trades[1].side, "BUY");
    }

    #[tokio::test]
    async fn test_stats_aggregate_per_user() {
        let ledger = TradeLedger::new("sqlite::memory:").await.unwrap();
        ledger
            .append_trade(&record(TradeSide::Buy, dec!(10000)))
            .await
            .unwrap();
        ledger
            .append_trade(&record(TradeSide::Buy, dec!(20000)))
            .await
            .unwrap();
        ledger
            .append_trade(&record(TradeSide::Sell, dec!(15000)))
            .await
            .unwrap();

        let stats = ledger.trade_stats("u1").await.unwrap();
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.buy_count, 2);
        assert_eq!(stats.sell_count, 1);
        assert!((stats.total_bought - 30000.0).abs() < 1e-9);
        assert!((stats.total_sold - 15000.0).abs() < 1e-9);
        assert!((stats.realized_pnl - 150.0).abs() < 1e-9);

        let empty = ledger.trade_stats("nobody").await.unwrap();
        assert_eq!(empty.total_trades, 0);
        assert_eq!(empty.realized_pnl, 0.0);
    }
}
