//! TTL cache over exchange read calls.
//!
//! The map lives behind one coarse mutex held only for bookkeeping; the
//! underlying fetch always runs outside the lock so slow network I/O never
//! serializes concurrent jobs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::EngineError;
use crate::models::Candle;

use super::types::Orderbook;

/// What kind of read an entry memoizes. Entry caps are enforced per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Price,
    Balance,
    AvgBuyPrice,
    Candles,
    Orderbook,
}

/// Cached value, typed by operation kind.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Price(Decimal),
    Balance(Decimal),
    AvgBuyPrice(Decimal),
    Candles(Vec<Candle>),
    Orderbook(Orderbook),
}

struct Entry {
    value: CacheValue,
    recorded_at: Instant,
}

/// Memoizes exchange reads with per-call TTLs. Invalidated wholesale before
/// every order submission.
pub struct MarketCache {
    entries: Mutex<HashMap<(CacheKind, String), Entry>>,
    max_per_kind: usize,
}

impl Default for MarketCache {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MarketCache {
    pub fn new(max_per_kind: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_per_kind: max_per_kind.max(1),
        }
    }

    /// Return the cached value on a hit within `ttl`; otherwise run `fetch`,
    /// record the result, and return it. The lock is never held across the
    /// fetch, so two jobs missing the same key may fetch concurrently; the
    /// later insert simply wins.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        kind: CacheKind,
        args: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<CacheValue, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheValue, EngineError>>,
    {
        if let Some(hit) = self.lookup(kind, args, ttl) {
            return Ok(hit);
        }

        let value = fetch().await?;
        self.store(kind, args, value.clone());
        Ok(value)
    }

    fn lookup(&self, kind: CacheKind, args: &str, ttl: Duration) -> Option<CacheValue> {
        let entries = self.entries.lock().expect("market cache poisoned");
        let entry = entries.get(&(kind, args.to_string()))?;
        if entry.recorded_at.elapsed() <= ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn store(&self, kind: CacheKind, args: &str, value: CacheValue) {
        let mut entries = self.entries.lock().expect("market cache poisoned");

        let of_kind = entries.iter().filter(|((k, _), _)| *k == kind).count();
        if of_kind >= self.max_per_kind {
            // Evict the least-recently-recorded entry of this kind.
            if let Some(oldest) = entries
                .iter()
                .filter(|((k, _), _)| *k == kind)
                .min_by_key(|(_, e)| e.recorded_at)
                .map(|(key, _)| key.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            (kind, args.to_string()),
            Entry {
                value,
                recorded_at: Instant::now(),
            },
        );
    }

    /// Drop every entry. Called synchronously before any buy or sell
    /// submission so the next cycle re-fetches post-trade state.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.lock().expect("market cache poisoned");
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "market cache invalidated");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("market cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn price_value(p: Decimal) -> CacheValue {
        CacheValue::Price(p)
    }

    #[tokio::test]
    async fn test_hit_within_ttl_fetches_once() {
        let cache = MarketCache::default();
        let fetches = AtomicU32::new(0);
        let ttl = Duration::from_secs(60);

        for _ in 0..2 {
            let got = cache
                .get_or_fetch(CacheKind::Price, "KRW-BTC", ttl, || {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    async { Ok(price_value(dec!(100))) }
                })
                .await
                .unwrap();
            assert!(matches!(got, CacheValue::Price(p) if p == dec!(100)));
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let cache = MarketCache::default();
        let fetches = AtomicU32::new(0);

        // Zero TTL: every read is a miss.
        for _ in 0..2 {
            cache
                .get_or_fetch(CacheKind::Price, "KRW-BTC", Duration::ZERO, || {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    async { Ok(price_value(dec!(100))) }
                })
                .await
                .unwrap();
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_all_forces_refetch() {
        let cache = MarketCache::default();
        let fetches = AtomicU32::new(0);
        let ttl = Duration::from_secs(60);

        let fetch_price = || {
            fetches.fetch_add(1, Ordering::SeqCst);
            async { Ok(price_value(dec!(100))) }
        };

        cache
            .get_or_fetch(CacheKind::Price, "KRW-BTC", ttl, fetch_price)
            .await
            .unwrap();
        cache.invalidate_all();
        assert!(cache.is_empty());

        cache
            .get_or_fetch(CacheKind::Price, "KRW-BTC", ttl, fetch_price)
            .await
            .unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_per_kind_cap_evicts_oldest() {
        let cache = MarketCache::new(2);
        let ttl = Duration::from_secs(60);

        for (i, market) in ["KRW-BTC", "KRW-ETH", "KRW-XRP"].into_iter().enumerate() {
            cache
                .get_or_fetch(CacheKind::Price, market, ttl, || async move {
                    Ok(price_value(Decimal::from(i as i64)))
                })
                .await
                .unwrap();
            // Distinct recorded_at values.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(cache.len(), 2);
        // The first-recorded entry is gone; a re-read fetches again.
        let fetched = AtomicU32::new(0);
        cache
            .get_or_fetch(CacheKind::Price, "KRW-BTC", ttl, || {
                fetched.fetch_add(1, Ordering::SeqCst);
                async { Ok(price_value(dec!(7))) }
            })
            .await
            .unwrap();
        assert_eq!(fetched.load(Ordering::SeqCst), 1);
    }
}
