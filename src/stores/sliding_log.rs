#![warn(missing_docs)]
//! Sliding Window Log store.
//!
//! Per identifier, the wallclock timestamps of recent admitted *and*
//! attempted requests are kept in a non-decreasing log. On each call, `now`
//! is appended unconditionally, entries older than `now - D` are pruned,
//! and the request is admitted iff the resulting log size is `<= R`. See
//! `spec.md` §4.6.

use ahash::AHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;

use crate::spec::RateSpec;
use crate::stores::{ConsumeFuture, Decision, LimiterStore, DEFAULT_SWEEP_INTERVAL};

#[cfg(feature = "logger")]
use tracing::trace;

#[derive(Debug, Clone, Default)]
struct LogState {
    entries: VecDeque<std::time::SystemTime>,
}

/// In-process, mutex-guarded Sliding Window Log store.
///
/// Exact within the resolution of `SystemTime`, at the cost of O(R) memory
/// per identifier instead of the O(1) footprint of the windowed stores.
pub struct SlidingLogStore {
    logs: Arc<Mutex<AHashMap<String, LogState>>>,
    rate: RateSpec,
}

impl SlidingLogStore {
    /// Builds a store and spawns the background eviction sweeper.
    pub fn new(rate: RateSpec) -> Self {
        Self::with_sweep_interval(rate, DEFAULT_SWEEP_INTERVAL)
    }

    /// Like [`SlidingLogStore::new`] but with an explicit sweep interval.
    pub fn with_sweep_interval(rate: RateSpec, sweep_interval: Duration) -> Self {
        let logs: Arc<Mutex<AHashMap<String, LogState>>> = Arc::new(Mutex::new(AHashMap::new()));
        let sweep_logs = logs.clone();
        let period = rate.period();
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                ticker.tick().await;
                let now = std::time::SystemTime::now();
                let mut map = sweep_logs.lock().await;
                map.retain(|_, state| {
                    prune(&mut state.entries, now, period);
                    !state.entries.is_empty()
                });
            }
        });

        Self { logs, rate }
    }

    async fn check(&self, identifier: &str) -> Decision {
        let now = std::time::SystemTime::now();
        let period = self.rate.period();
        let r = self.rate.requests();
        let mut map = self.logs.lock().await;
        let state = map.entry(identifier.to_string()).or_default();

        // Every call records an attempt, admitted or not — the log holds
        // timestamps of recent admitted *and* attempted requests, appended
        // in non-decreasing order under the lock before the size check.
        state.entries.push_back(now);
        prune(&mut state.entries, now, period);

        let allow = (state.entries.len() as u64) <= r;

        let remaining = r.saturating_sub(state.entries.len() as u64) as f64;
        let reset = state.entries.back().copied().map(|latest| latest + period);

        #[cfg(feature = "logger")]
        trace!(identifier, allow, log_len = state.entries.len(), "sliding log decision");

        Decision { allow, remaining, reset }
    }
}

/// Drops entries at or before `now - period`.
fn prune(entries: &mut VecDeque<std::time::SystemTime>, now: std::time::SystemTime, period: Duration) {
    let cutoff = now.checked_sub(period);
    while let Some(&oldest) = entries.front() {
        match cutoff {
            Some(cutoff) if oldest <= cutoff => {
                entries.pop_front();
            }
            _ => break,
        }
    }
}

impl LimiterStore for SlidingLogStore {
    fn consume<'a>(&'a self, identifier: &'a str, _cost: u64) -> ConsumeFuture<'a> {
        Box::pin(async move { Ok(self.check(identifier).await) })
    }
}
