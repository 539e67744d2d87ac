#![warn(missing_docs)]
//! Sliding Window Counter store — a weighted approximation of the sliding
//! log that keeps only `O(D / 1s)` state per identifier.
//!
//! Time is partitioned into adjacent, epoch-aligned major windows of length
//! `D`, each further divided into 1-second sub-windows. The effective count
//! at `now` is `floor(prior_sum * (1 - f) + current_sum)`, where `f` is the
//! elapsed fraction of the *current* major window, derived from `D` itself
//! (never hard-coded to 60 seconds — see `DESIGN.md` for why the source
//! material's `now.minute / 60` formulation doesn't generalize). See
//! `spec.md` §4.7.

use ahash::AHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;

use crate::spec::RateSpec;
use crate::stores::fixed_window::floor_to_window;
use crate::stores::{ConsumeFuture, Decision, LimiterStore, DEFAULT_SWEEP_INTERVAL};

#[cfg(feature = "logger")]
use tracing::trace;

const SUB_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
struct CounterState {
    // sub-window start (epoch seconds, floored to 1s) -> count
    sub_windows: BTreeMap<u64, u64>,
}

/// In-process, mutex-guarded Sliding Window Counter store.
pub struct SlidingWindowCounterStore {
    counters: Arc<Mutex<AHashMap<String, CounterState>>>,
    rate: RateSpec,
}

impl SlidingWindowCounterStore {
    /// Builds a store and spawns the background eviction sweeper.
    pub fn new(rate: RateSpec) -> Self {
        Self::with_sweep_interval(rate, DEFAULT_SWEEP_INTERVAL)
    }

    /// Like [`SlidingWindowCounterStore::new`] but with an explicit sweep interval.
    pub fn with_sweep_interval(rate: RateSpec, sweep_interval: Duration) -> Self {
        let counters: Arc<Mutex<AHashMap<String, CounterState>>> = Arc::new(Mutex::new(AHashMap::new()));
        let sweep_counters = counters.clone();
        let period = rate.period();
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                ticker.tick().await;
                let now = std::time::SystemTime::now();
                let mut map = sweep_counters.lock().await;
                map.retain(|_, state| {
                    prune(&mut state.sub_windows, now, period);
                    !state.sub_windows.is_empty()
                });
            }
        });

        Self { counters, rate }
    }

    async fn check(&self, identifier: &str) -> Decision {
        let now = std::time::SystemTime::now();
        let period = self.rate.period();
        let r = self.rate.requests();
        let mut map = self.counters.lock().await;
        let is_first_ever_call = !map.contains_key(identifier);
        let state = map.entry(identifier.to_string()).or_default();

        prune(&mut state.sub_windows, now, period);

        // Every call increments its sub-window bucket, admitted or not —
        // spec.md §4.7 increments unconditionally, before the weighted sum
        // is even computed, so sustained overload keeps counting against
        // the budget instead of going quiet once requests start rejecting.
        let bucket = epoch_secs(floor_to_window(now, SUB_WINDOW));
        *state.sub_windows.entry(bucket).or_insert(0) += 1;

        if is_first_ever_call {
            // An identifier with no prior history (including one swept
            // away after going idle) has nothing to weigh yet — admit it
            // unconditionally rather than reject on its own first
            // increment, mirroring fixed_window.rs's missing-record branch
            // and the original source's `except KeyError` fallback.
            #[cfg(feature = "logger")]
            trace!(identifier, allow = true, "sliding window counter decision (first call)");
            return Decision { allow: true, remaining: r as f64, reset: None };
        }

        let major_start = floor_to_window(now, period);
        let major_start_secs = epoch_secs(major_start);

        let elapsed = now
            .duration_since(major_start)
            .unwrap_or(Duration::ZERO)
            .as_secs_f64();
        let f = (elapsed / period.as_secs_f64().max(f64::MIN_POSITIVE)).clamp(0.0, 1.0);

        let (prior_sum, current_sum) = split_sums(&state.sub_windows, major_start_secs);
        let weighted = (prior_sum as f64 * (1.0 - f) + current_sum as f64).floor();

        let allow = weighted < r as f64;

        let remaining = (r as f64 - weighted).max(0.0);

        #[cfg(feature = "logger")]
        trace!(identifier, allow, weighted, f, "sliding window counter decision");

        // Only `remaining` is reported; spec.md §4.2 omits `reset` for this algorithm.
        Decision { allow, remaining, reset: None }
    }

    /// Seeds `identifier`'s prior major window with `count` attempts,
    /// without going through real `consume()` calls (which would now hit
    /// the same self-inclusive weighted check tests elsewhere exercise
    /// directly). Only for tests that need a primed window without racing
    /// wall-clock time against the pruning cutoff.
    #[cfg(test)]
    pub(crate) async fn seed_prior_window(&self, identifier: &str, count: u64) {
        let now = std::time::SystemTime::now();
        let major_start = floor_to_window(now, self.rate.period());
        let prior_bucket = epoch_secs(major_start) - 1;
        let mut map = self.counters.lock().await;
        let state = map.entry(identifier.to_string()).or_default();
        state.sub_windows.insert(prior_bucket, count);
    }
}

fn epoch_secs(t: std::time::SystemTime) -> u64 {
    t.duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Sums sub-window counts strictly before `major_start_secs` (the prior
/// major window) and at-or-after it (the current major window).
fn split_sums(sub_windows: &BTreeMap<u64, u64>, major_start_secs: u64) -> (u64, u64) {
    let mut prior = 0u64;
    let mut current = 0u64;
    for (&start, &count) in sub_windows {
        if start < major_start_secs {
            prior += count;
        } else {
            current += count;
        }
    }
    (prior, current)
}

/// Drops sub-windows strictly older than `now - period`.
fn prune(sub_windows: &mut BTreeMap<u64, u64>, now: std::time::SystemTime, period: Duration) {
    let cutoff = now
        .checked_sub(period)
        .map(epoch_secs)
        .unwrap_or(0);
    sub_windows.retain(|&start, _| start > cutoff);
}

impl LimiterStore for SlidingWindowCounterStore {
    fn consume<'a>(&'a self, identifier: &'a str, _cost: u64) -> ConsumeFuture<'a> {
        Box::pin(async move { Ok(self.check(identifier).await) })
    }
}
