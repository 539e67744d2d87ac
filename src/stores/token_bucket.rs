#![warn(missing_docs)]
//! Token Bucket store: continuous refill, burst up to capacity.
//!
//! Each identifier owns a bucket of capacity `C` that refills continuously
//! at `r` tokens/second, capped at `C`. A request of cost `c` is admitted
//! iff the current token count is at least `c`, in which case `c` is
//! deducted. See `spec.md` §4.3.

use ahash::AHashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::interval;

use crate::spec::RateSpec;
use crate::stores::{ConsumeFuture, Decision, LimiterStore, DEFAULT_SWEEP_INTERVAL};

#[cfg(feature = "logger")]
use tracing::trace;

/// Configuration for a [`TokenBucketStore`].
#[derive(Debug, Clone, Copy)]
pub struct TokenBucketConfig {
    /// Maximum number of tokens a bucket can hold.
    pub capacity: f64,
    /// Refill rate in tokens per second — the `refill_rate` option in
    /// `spec.md` §6. There is no implicit derivation from a `RateSpec`;
    /// callers that want refill to track `rate.per_second()` pass that
    /// value in explicitly.
    pub refill_rate: f64,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            capacity: 6.0,
            refill_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// In-process, mutex-guarded Token Bucket store.
pub struct TokenBucketStore {
    buckets: Arc<Mutex<AHashMap<String, BucketState>>>,
    config: TokenBucketConfig,
}

impl TokenBucketStore {
    /// Builds a store and spawns the background eviction sweeper (`spec.md`
    /// §9: local stores must not grow unbounded). The sweeper's idle TTL is
    /// derived from `config` alone (`capacity / refill_rate`); `rate` is
    /// accepted only so every store constructor takes the same shape.
    pub fn new(rate: &RateSpec, config: TokenBucketConfig) -> Self {
        Self::with_sweep_interval(rate, config, DEFAULT_SWEEP_INTERVAL)
    }

    /// Like [`TokenBucketStore::new`] but with an explicit sweep interval,
    /// useful for tests that don't want to wait five minutes.
    pub fn with_sweep_interval(
        _rate: &RateSpec,
        config: TokenBucketConfig,
        sweep_interval: Duration,
    ) -> Self {
        let buckets: Arc<Mutex<AHashMap<String, BucketState>>> = Arc::new(Mutex::new(AHashMap::new()));

        let sweep_map = buckets.clone();
        let idle_ttl = if config.refill_rate > 0.0 {
            Duration::from_secs_f64((config.capacity / config.refill_rate).min(86_400.0))
        } else {
            Duration::from_secs(86_400)
        };
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let mut map = sweep_map.lock().await;
                map.retain(|_, v| now.duration_since(v.last_refill) <= idle_ttl);
            }
        });

        Self { buckets, config }
    }

    async fn refill_and_consume(&self, identifier: &str, cost: f64) -> Decision {
        let now = Instant::now();
        let mut map = self.buckets.lock().await;

        let state = map.entry(identifier.to_string()).or_insert(BucketState {
            tokens: self.config.capacity,
            last_refill: now,
        });

        if now >= state.last_refill {
            let elapsed = now.duration_since(state.last_refill).as_secs_f64();
            state.tokens = (state.tokens + self.config.refill_rate * elapsed).min(self.config.capacity);
            state.last_refill = now;
        }
        // Clock non-monotonicity: skip the refill step, state untouched.

        let allow = state.tokens >= cost;
        if allow {
            state.tokens -= cost;
        }

        #[cfg(feature = "logger")]
        trace!(identifier, allow, tokens = state.tokens, "token bucket decision");

        Decision {
            allow,
            remaining: state.tokens / cost.max(f64::MIN_POSITIVE),
            reset: None,
        }
    }
}

impl LimiterStore for TokenBucketStore {
    fn consume<'a>(&'a self, identifier: &'a str, cost: u64) -> ConsumeFuture<'a> {
        let cost = cost.max(1) as f64;
        Box::pin(async move { Ok(self.refill_and_consume(identifier, cost).await) })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    fn spec() -> RateSpec {
        RateSpec::new(6, Duration::from_secs(60)).unwrap()
    }

    #[tokio::test]
    async fn burst_then_refill() {
        // capacity 6, refill 0.1/s (6 per 60s)
        let store = TokenBucketStore::with_sweep_interval(
            &spec(),
            TokenBucketConfig { capacity: 6.0, refill_rate: 0.1 },
            Duration::from_secs(300),
        );

        for _ in 0..6 {
            let d = store.consume("a", 1).await.unwrap();
            assert!(d.allow);
        }

        let d = store.consume("a", 1).await.unwrap();
        assert!(!d.allow);
        assert!(d.remaining.abs() < 1e-6);

        sleep(Duration::from_millis(2100)).await;
        // ~0.21s idle at 0.1/s refills ~0.021 tokens; not enough yet, still denied.
        let d = store.consume("a", 1).await.unwrap();
        assert!(!d.allow);
    }

    #[tokio::test]
    async fn independent_identifiers() {
        let store = TokenBucketStore::with_sweep_interval(
            &spec(),
            TokenBucketConfig { capacity: 1.0, refill_rate: 0.0 },
            Duration::from_secs(300),
        );

        assert!(store.consume("flood", 1).await.unwrap().allow);
        assert!(!store.consume("flood", 1).await.unwrap().allow);
        // identifier "other" is untouched by the flood against "flood".
        assert!(store.consume("other", 1).await.unwrap().allow);
    }

    #[tokio::test]
    async fn fractional_tokens_are_retained() {
        let store = TokenBucketStore::with_sweep_interval(
            &spec(),
            TokenBucketConfig { capacity: 2.0, refill_rate: 1.0 },
            Duration::from_secs(300),
        );

        assert!(store.consume("a", 1).await.unwrap().allow);
        sleep(Duration::from_millis(500)).await;
        let d = store.consume("a", 1).await.unwrap();
        // started at 1 remaining, refilled ~0.5 over 500ms, consumed 1 more -> ~0.5 remaining
        assert!(d.allow);
        assert!(d.remaining < 1.0);
    }
}
