#![warn(missing_docs)]
//! The five limiter algorithms and their state stores, local and remote.
//!
//! Each store implements one capability set: given an identifier and a
//! request cost, decide whether to admit it and report how much budget is
//! left. This is the "sum type or interface abstraction" `spec.md` §9 asks
//! for, realized here as the [`LimiterStore`] trait so the middleware
//! adapter in [`crate::middleware`] can be generic over the algorithm.

use crate::error::RateLimiterError;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime};

/// Token Bucket store and configuration.
pub mod token_bucket;

/// Leaky Bucket (as a meter) store and configuration.
pub mod leaky_bucket;

/// Fixed Window Counter store and configuration.
pub mod fixed_window;

/// Sliding Window Log store and configuration.
pub mod sliding_log;

/// Sliding Window Counter store and configuration.
pub mod sliding_window_counter;

/// Remote, shared-hash-backed Fixed Window Counter store.
#[cfg(feature = "remote")]
pub mod remote;

/// The outcome of a single `consume` call against a limiter store.
///
/// Mirrors the `(allow, remaining, reset)` triple `spec.md` §4 specifies for
/// every algorithm. `reset` is `None` for algorithms that report only
/// `remaining` (Sliding Window Counter, Token Bucket, Leaky Bucket).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Whether the request is admitted.
    pub allow: bool,
    /// Remaining budget after this decision, never negative on the allow path.
    pub remaining: f64,
    /// When the current window/bucket is expected to reset, if the
    /// algorithm tracks an aligned window.
    pub reset: Option<SystemTime>,
}

/// A future returned by [`LimiterStore::consume`].
pub type ConsumeFuture<'a> = Pin<Box<dyn Future<Output = Result<Decision, RateLimiterError>> + Send + 'a>>;

/// A keyed rate limiter state store implementing one algorithm.
///
/// Implementors own all per-identifier state; the middleware adapter holds
/// only a reference to the store and the immutable [`crate::spec::RateSpec`].
pub trait LimiterStore: Send + Sync {
    /// Runs the algorithm-prescribed sequence (refill/consume,
    /// leak/pour, or a single window check) for `identifier` at a cost of
    /// `cost` (1 for the window algorithms, which are not cost-weighted).
    fn consume<'a>(&'a self, identifier: &'a str, cost: u64) -> ConsumeFuture<'a>;
}

/// Default interval between local-store eviction sweeps.
///
/// Matches the teacher middleware's background cleanup cadence.
pub(crate) const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
