//! Scheduled trading jobs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::TickerSymbol;

/// Identifier for a (user, ticker) trading job.
pub type JobId = String;

/// One running trading assignment with its own interval timer. Owned
/// exclusively by the scheduler; mutated only by scheduler callbacks and
/// explicit stop requests.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub job_id: JobId,
    pub user_id: String,
    pub ticker: TickerSymbol,
    pub strategy: String,
    pub interval_secs: u64,
    pub running: bool,
    pub run_count: u64,
    pub last_run: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        job_id: JobId,
        user_id: String,
        ticker: TickerSymbol,
        strategy: String,
        interval_secs: u64,
    ) -> Self {
        Self {
            job_id,
            user_id,
            ticker,
            strategy,
            interval_secs,
            running: true,
            run_count: 0,
            last_run: None,
        }
    }
}
