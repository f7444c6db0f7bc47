//! Trade notifications. Delivery is best effort; a failed notification
//! never fails the trade that triggered it.

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use crate::models::TradeRecord;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_trade(&self, record: &TradeRecord);
}

/// Default notifier: structured log line per trade.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_trade(&self, record: &TradeRecord) {
        info!(
            user_id = %record.user_id,
            ticker = %record.ticker,
            side = record.side.as_str(),
            price = %record.price,
            volume = %record.volume,
            amount = %record.amount,
            strategy = %record.strategy,
            "trade executed"
        );
    }
}

/// Posts trade summaries to a webhook URL (Slack-compatible payload).
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("NOTIFY_WEBHOOK_URL").ok().map(Self::new)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_trade(&self, record: &TradeRecord) {
        let pnl = record
            .profit_loss
            .map(|p| format!(" (P&L {p})"))
            .unwrap_or_default();
        let payload = json!({
            "text": format!(
                "[{}] {} {} {} @ {} for {}{}",
                record.strategy,
                record.side.as_str(),
                record.volume,
                record.ticker,
                record.price,
                record.amount,
                pnl,
            ),
        });
        if let Err(err) = self.client.post(&self.url).json(&payload).send().await {
            error!(error = %err, "webhook notification failed");
        }
    }
}
