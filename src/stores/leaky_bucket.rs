#![warn(missing_docs)]
//! Leaky Bucket store, used as a meter rather than a queue.
//!
//! `level` starts at 0, drains at `r` units/second, and a request of cost
//! `c` is admitted iff `level + c <= C`, incrementing `level` by `c` on
//! admission. See `spec.md` §4.4.

use ahash::AHashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::interval;

use crate::spec::RateSpec;
use crate::stores::{ConsumeFuture, Decision, LimiterStore, DEFAULT_SWEEP_INTERVAL};

#[cfg(feature = "logger")]
use tracing::trace;

/// Configuration for a [`LeakyBucketStore`].
#[derive(Debug, Clone, Copy)]
pub struct LeakyBucketConfig {
    /// Maximum level a bucket can reach before pours are rejected.
    pub capacity: f64,
    /// Leak rate in units per second — the `leak_rate` option in `spec.md`
    /// §6. There is no implicit derivation from a `RateSpec`; callers that
    /// want leaking to track `rate.per_second()` pass that value in
    /// explicitly.
    pub leak_rate: f64,
}

impl Default for LeakyBucketConfig {
    fn default() -> Self {
        Self {
            capacity: 6.0,
            leak_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BucketState {
    level: f64,
    last_leak: Instant,
}

/// In-process, mutex-guarded Leaky Bucket (meter) store.
pub struct LeakyBucketStore {
    buckets: Arc<Mutex<AHashMap<String, BucketState>>>,
    config: LeakyBucketConfig,
}

impl LeakyBucketStore {
    /// Builds a store and spawns the background eviction sweeper. The
    /// sweeper's idle TTL is derived from `config` alone (`capacity /
    /// leak_rate`); `rate` is accepted only so every store constructor
    /// takes the same shape.
    pub fn new(rate: &RateSpec, config: LeakyBucketConfig) -> Self {
        Self::with_sweep_interval(rate, config, DEFAULT_SWEEP_INTERVAL)
    }

    /// Like [`LeakyBucketStore::new`] but with an explicit sweep interval.
    pub fn with_sweep_interval(
        _rate: &RateSpec,
        config: LeakyBucketConfig,
        sweep_interval: Duration,
    ) -> Self {
        let buckets: Arc<Mutex<AHashMap<String, BucketState>>> = Arc::new(Mutex::new(AHashMap::new()));

        let sweep_map = buckets.clone();
        let idle_ttl = if config.leak_rate > 0.0 {
            Duration::from_secs_f64((config.capacity / config.leak_rate).min(86_400.0))
        } else {
            Duration::from_secs(86_400)
        };
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let mut map = sweep_map.lock().await;
                map.retain(|_, v| now.duration_since(v.last_leak) <= idle_ttl);
            }
        });

        Self { buckets, config }
    }

    async fn leak_and_pour(&self, identifier: &str, cost: f64) -> Decision {
        let now = Instant::now();
        let mut map = self.buckets.lock().await;

        let state = map.entry(identifier.to_string()).or_insert(BucketState {
            level: 0.0,
            last_leak: now,
        });

        if now >= state.last_leak {
            let elapsed = now.duration_since(state.last_leak).as_secs_f64();
            state.level = (state.level - self.config.leak_rate * elapsed).max(0.0);
            state.last_leak = now;
        }

        let allow = state.level + cost <= self.config.capacity;
        if allow {
            state.level += cost;
        }

        #[cfg(feature = "logger")]
        trace!(identifier, allow, level = state.level, "leaky bucket decision");

        Decision {
            allow,
            remaining: (self.config.capacity - state.level) / cost.max(f64::MIN_POSITIVE),
            reset: None,
        }
    }
}

impl LimiterStore for LeakyBucketStore {
    fn consume<'a>(&'a self, identifier: &'a str, cost: u64) -> ConsumeFuture<'a> {
        let cost = cost.max(1) as f64;
        Box::pin(async move { Ok(self.leak_and_pour(identifier, cost).await) })
    }
}
