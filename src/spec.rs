#![warn(missing_docs)]
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RateLimiterError, RateLimiterErrorKind};

/// An immutable rate budget: `requests` allowed per `period`.
///
/// `RateSpec` is the policy object every store is configured with. It is
/// deliberately small and `Copy`-free (periods are `Duration`, not `Copy`
/// on all targets) so it can be cloned cheaply and shared behind an `Arc`
/// with a store.
///
/// # Invariants
///
/// - `requests >= 1`
/// - `period > Duration::ZERO`
///
/// Both are enforced at construction; there is no way to observe a
/// `RateSpec` that violates them.
///
/// # Examples
///
/// ```
/// use ratelimit_core::spec::RateSpec;
/// use std::time::Duration;
///
/// let spec = RateSpec::new(6, Duration::from_secs(60)).unwrap();
/// assert_eq!(spec.requests(), 6);
/// assert!((spec.per_second() - 0.1).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSpec {
    requests: u64,
    period: Duration,
}

impl RateSpec {
    /// Constructs a `RateSpec` of `requests` per `period`.
    ///
    /// Returns a [`RateLimiterError`] of kind
    /// [`Configuration`](RateLimiterErrorKind::Configuration) if `requests`
    /// is zero or `period` is zero.
    pub fn new(requests: u64, period: Duration) -> Result<Self, RateLimiterError> {
        if requests == 0 {
            return Err(RateLimiterError::new(
                RateLimiterErrorKind::Configuration,
                "requests must be >= 1".to_string(),
            ));
        }
        if period.is_zero() {
            return Err(RateLimiterError::new(
                RateLimiterErrorKind::Configuration,
                "period must be > 0".to_string(),
            ));
        }
        Ok(Self { requests, period })
    }

    /// The `R` in "R requests per period D".
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// The `D` in "R requests per period D".
    pub fn period(&self) -> Duration {
        self.period
    }

    /// The derived per-second rate, `R / D_seconds`.
    pub fn per_second(&self) -> f64 {
        self.requests as f64 / self.period.as_secs_f64()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_zero_requests() {
        let err = RateSpec::new(0, Duration::from_secs(60)).unwrap_err();
        assert_eq!(*err.kind(), RateLimiterErrorKind::Configuration);
    }

    #[test]
    fn rejects_zero_period() {
        let err = RateSpec::new(6, Duration::ZERO).unwrap_err();
        assert_eq!(*err.kind(), RateLimiterErrorKind::Configuration);
    }

    #[test]
    fn computes_per_second() {
        let spec = RateSpec::new(6, Duration::from_secs(60)).unwrap();
        assert!((spec.per_second() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn equality_is_field_wise() {
        let a = RateSpec::new(6, Duration::from_secs(60)).unwrap();
        let b = RateSpec::new(6, Duration::from_secs(60)).unwrap();
        let c = RateSpec::new(7, Duration::from_secs(60)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
