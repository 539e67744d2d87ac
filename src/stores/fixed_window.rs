#![warn(missing_docs)]
//! Fixed Window Counter store.
//!
//! Time is partitioned into fixed, epoch-aligned windows of length `D`. If
//! the current aligned window is later than the stored one, the counter
//! resets. The request that opens a window is counted immediately (not
//! deferred to the next call), so the strict `<` admission check admits
//! exactly `R - 1` requests per window — preserved here for fidelity
//! rather than "fixed" to the nominal `R`.

use ahash::AHashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::time::interval;

use crate::spec::RateSpec;
use crate::stores::{ConsumeFuture, Decision, LimiterStore, DEFAULT_SWEEP_INTERVAL};

#[cfg(feature = "logger")]
use tracing::trace;

/// Floors `now` to the most recent multiple of `period` since the Unix epoch.
///
/// Deterministic and independent of call history, per `spec.md` §4.5.
pub(crate) fn floor_to_window(now: SystemTime, period: Duration) -> SystemTime {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    let period_secs = period.as_secs_f64().max(f64::MIN_POSITIVE);
    let windows_elapsed = (since_epoch.as_secs_f64() / period_secs).floor();
    UNIX_EPOCH + Duration::from_secs_f64(windows_elapsed * period_secs)
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    count: u64,
    window_start: SystemTime,
}

/// In-process, mutex-guarded Fixed Window Counter store.
pub struct FixedWindowStore {
    windows: Arc<Mutex<AHashMap<String, WindowState>>>,
    rate: RateSpec,
}

impl FixedWindowStore {
    /// Builds a store and spawns the background eviction sweeper.
    pub fn new(rate: RateSpec) -> Self {
        Self::with_sweep_interval(rate, DEFAULT_SWEEP_INTERVAL)
    }

    /// Like [`FixedWindowStore::new`] but with an explicit sweep interval.
    pub fn with_sweep_interval(rate: RateSpec, sweep_interval: Duration) -> Self {
        let windows: Arc<Mutex<AHashMap<String, WindowState>>> = Arc::new(Mutex::new(AHashMap::new()));
        let sweep_map = windows.clone();
        let period = rate.period();
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                ticker.tick().await;
                let now = SystemTime::now();
                let mut map = sweep_map.lock().await;
                map.retain(|_, v| {
                    now.duration_since(v.window_start).unwrap_or(Duration::ZERO) <= period
                });
            }
        });

        Self { windows, rate }
    }

    async fn check(&self, identifier: &str) -> Decision {
        let now = SystemTime::now();
        let latest = floor_to_window(now, self.rate.period());
        let r = self.rate.requests();
        let mut map = self.windows.lock().await;

        // The request that opens a window already occupies one slot: it is
        // counted immediately rather than left for the next call to notice,
        // which is what produces the documented R - 1 admissions per window
        // (see the test below and DESIGN.md for the exact trace).
        let decision = match map.get_mut(identifier) {
            None => {
                map.insert(identifier.to_string(), WindowState { count: 1, window_start: latest });
                Decision { allow: true, remaining: r as f64, reset: Some(latest + self.rate.period()) }
            }
            Some(state) if state.window_start < latest => {
                state.count = 1;
                state.window_start = latest;
                Decision { allow: true, remaining: r as f64, reset: Some(latest + self.rate.period()) }
            }
            Some(state) if state.count + 1 < r => {
                state.count += 1;
                Decision {
                    allow: true,
                    remaining: (r - state.count) as f64,
                    reset: Some(state.window_start + self.rate.period()),
                }
            }
            Some(state) => Decision {
                allow: false,
                remaining: 0.0,
                reset: Some(state.window_start + self.rate.period()),
            },
        };

        #[cfg(feature = "logger")]
        trace!(identifier, allow = decision.allow, "fixed window decision");

        decision
    }
}

impl LimiterStore for FixedWindowStore {
    fn consume<'a>(&'a self, identifier: &'a str, _cost: u64) -> ConsumeFuture<'a> {
        Box::pin(async move { Ok(self.check(identifier).await) })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn spec() -> RateSpec {
        RateSpec::new(6, Duration::from_secs(60)).unwrap()
    }

    #[tokio::test]
    async fn admits_exactly_r_minus_one_per_window() {
        let store = FixedWindowStore::with_sweep_interval(spec(), Duration::from_secs(300));

        let mut admitted = 0;
        for _ in 0..10 {
            if store.consume("a", 1).await.unwrap().allow {
                admitted += 1;
            }
        }
        // The window-opening call starts count at 1 (it already occupies a
        // slot); the next 4 calls increment count to 2..5, each passing
        // `count + 1 < 6`; the 6th call sees count == 5 and `5 + 1 < 6` is
        // false, so it rejects. 5 admits, 5 rejects out of 10.
        assert_eq!(admitted, 5);
    }

    #[tokio::test]
    async fn alignment_is_deterministic() {
        let now = UNIX_EPOCH + Duration::from_secs(125);
        let floored = floor_to_window(now, Duration::from_secs(60));
        assert_eq!(floored, UNIX_EPOCH + Duration::from_secs(120));
    }

    #[tokio::test]
    async fn independent_identifiers() {
        let store = FixedWindowStore::with_sweep_interval(
            RateSpec::new(1, Duration::from_secs(60)).unwrap(),
            Duration::from_secs(300),
        );
        assert!(store.consume("flood", 1).await.unwrap().allow);
        assert!(!store.consume("flood", 1).await.unwrap().allow);
        assert!(store.consume("other", 1).await.unwrap().allow);
    }
}
