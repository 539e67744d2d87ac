#![warn(missing_docs)]
//! Remote Fixed Window Counter store, backed by a shared hash analogous to
//! a Redis hash (one field per identifier).
//!
//! Identical decision rules to [`crate::stores::fixed_window`], with state
//! externalized as the wire string `"<count>##<window_start_epoch_seconds>"`.
//! See `spec.md` §4.8.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{RateLimiterError, RateLimiterErrorKind};
use crate::spec::RateSpec;
use crate::stores::fixed_window::floor_to_window;
use crate::stores::{ConsumeFuture, Decision, LimiterStore};

#[cfg(feature = "logger")]
use tracing::{debug, trace, warn};

/// How a [`RemoteFixedWindowStore`] behaves when the backing store is
/// unreachable. See `spec.md` §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFailurePolicy {
    /// Admit the request; `remaining` is reported as unknown (`f64::NAN`).
    /// The recommended default for availability.
    FailOpen,
    /// Reject with the equivalent of a 429 and a distinct body, leaving the
    /// decision to the middleware adapter.
    FailClosed,
}

/// A shared hash keyed by `(hash_name, identifier)` whose values are
/// opaque wire strings. Abstracts over the transport so the read-modify-
/// write sequence in `spec.md` §4.8 can be swapped for an atomic
/// server-side script without touching the algorithm.
pub trait RemoteHashStore: Send + Sync {
    /// Reads the field for `identifier`, or `Ok(None)` if absent.
    fn get_field<'a>(
        &'a self,
        hash_name: &'a str,
        identifier: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<String>, RateLimiterError>> + Send + 'a>>;

    /// Writes the field for `identifier`.
    fn set_field<'a>(
        &'a self,
        hash_name: &'a str,
        identifier: &'a str,
        value: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), RateLimiterError>> + Send + 'a>>;
}

/// Encodes `(count, window_start)` as `"<count>##<window_start_epoch_seconds>"`.
fn encode(count: u64, window_start: SystemTime) -> String {
    let epoch = window_start
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64();
    format!("{count}##{epoch}")
}

/// Parses the wire format, truncating fractional seconds for window
/// comparisons as `spec.md` §6 requires.
fn decode(value: &str) -> Option<(u64, SystemTime)> {
    let (count_str, window_str) = value.split_once("##")?;
    let count: u64 = count_str.parse().ok()?;
    let window_secs: f64 = window_str.parse().ok()?;
    let window = UNIX_EPOCH + Duration::from_secs(window_secs.trunc() as u64);
    Some((count, window))
}

/// Remote Fixed Window Counter against a [`RemoteHashStore`].
pub struct RemoteFixedWindowStore<S: RemoteHashStore> {
    store: S,
    hash_name: String,
    rate: RateSpec,
    failure_policy: RemoteFailurePolicy,
}

impl<S: RemoteHashStore> RemoteFixedWindowStore<S> {
    /// Builds a store against `store`, namespacing fields under `hash_name`.
    pub fn new(store: S, hash_name: impl Into<String>, rate: RateSpec, failure_policy: RemoteFailurePolicy) -> Self {
        Self { store, hash_name: hash_name.into(), rate, failure_policy }
    }

    async fn check(&self, identifier: &str) -> Result<Decision, RateLimiterError> {
        let now = SystemTime::now();
        let latest = floor_to_window(now, self.rate.period());
        let r = self.rate.requests();

        let read = self.store.get_field(&self.hash_name, identifier).await;

        let existing = match read {
            Ok(value) => value,
            Err(err) => return self.on_unavailable(identifier, err),
        };

        // The read-modify-write pair below is not atomic; under contention
        // two concurrent requests can race and admit one surplus request.
        // spec.md §4.8 accepts this for the single-client case.
        let decision = match existing.as_deref().and_then(decode) {
            None => {
                let write = self.store.set_field(&self.hash_name, identifier, encode(1, latest)).await;
                if let Err(err) = write {
                    return self.on_unavailable(identifier, err);
                }
                Decision { allow: true, remaining: r as f64, reset: Some(latest + self.rate.period()) }
            }
            Some((_, window)) if window < latest => {
                let write = self.store.set_field(&self.hash_name, identifier, encode(1, latest)).await;
                if let Err(err) = write {
                    return self.on_unavailable(identifier, err);
                }
                Decision { allow: true, remaining: r as f64, reset: Some(latest + self.rate.period()) }
            }
            Some((count, window)) if count + 1 < r => {
                let write = self
                    .store
                    .set_field(&self.hash_name, identifier, encode(count + 1, latest))
                    .await;
                if let Err(err) = write {
                    return self.on_unavailable(identifier, err);
                }
                Decision {
                    allow: true,
                    remaining: (r - count - 1) as f64,
                    reset: Some(window + self.rate.period()),
                }
            }
            Some((_, window)) => Decision { allow: false, remaining: 0.0, reset: Some(window + self.rate.period()) },
        };

        #[cfg(feature = "logger")]
        trace!(identifier, allow = decision.allow, "remote fixed window decision");

        Ok(decision)
    }

    fn on_unavailable(&self, identifier: &str, err: RateLimiterError) -> Result<Decision, RateLimiterError> {
        match self.failure_policy {
            RemoteFailurePolicy::FailOpen => {
                #[cfg(feature = "logger")]
                warn!(identifier, error = %err, "remote store unavailable, failing open");
                Ok(Decision { allow: true, remaining: f64::NAN, reset: None })
            }
            RemoteFailurePolicy::FailClosed => {
                #[cfg(feature = "logger")]
                debug!(identifier, error = %err, "remote store unavailable, failing closed");
                Err(RateLimiterError::new(RateLimiterErrorKind::Store, "Rate limiter unavailable.".to_string()))
            }
        }
    }
}

impl<S: RemoteHashStore> LimiterStore for RemoteFixedWindowStore<S> {
    fn consume<'a>(&'a self, identifier: &'a str, _cost: u64) -> ConsumeFuture<'a> {
        Box::pin(async move { self.check(identifier).await })
    }
}

/// A `redis`-backed [`RemoteHashStore`] using an async connection manager,
/// the same pattern used for distributed rate limiting elsewhere in the
/// retrieved example corpus.
#[cfg(feature = "remote")]
pub struct RedisHashStore {
    connection: redis::aio::ConnectionManager,
}

#[cfg(feature = "remote")]
impl RedisHashStore {
    /// Connects to `redis_url` and wraps it in a reusable connection manager.
    pub async fn connect(redis_url: &str) -> Result<Self, RateLimiterError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| RateLimiterError::new(RateLimiterErrorKind::Store, e.to_string()))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| RateLimiterError::new(RateLimiterErrorKind::Store, e.to_string()))?;
        Ok(Self { connection })
    }
}

#[cfg(feature = "remote")]
impl RemoteHashStore for RedisHashStore {
    fn get_field<'a>(
        &'a self,
        hash_name: &'a str,
        identifier: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<String>, RateLimiterError>> + Send + 'a>> {
        Box::pin(async move {
            let mut conn = self.connection.clone();
            redis::cmd("HGET")
                .arg(hash_name)
                .arg(identifier)
                .query_async(&mut conn)
                .await
                .map_err(RateLimiterError::from)
        })
    }

    fn set_field<'a>(
        &'a self,
        hash_name: &'a str,
        identifier: &'a str,
        value: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), RateLimiterError>> + Send + 'a>> {
        Box::pin(async move {
            let mut conn = self.connection.clone();
            redis::cmd("HSET")
                .arg(hash_name)
                .arg(identifier)
                .arg(value)
                .query_async(&mut conn)
                .await
                .map_err(RateLimiterError::from)
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! An in-memory [`RemoteHashStore`], so this crate's own test suite
    //! never touches the network.
    use super::RemoteHashStore;
    use crate::error::RateLimiterError;
    use ahash::AHashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    pub struct InMemoryHashStore {
        fields: Arc<Mutex<AHashMap<(String, String), String>>>,
        unreachable: Arc<std::sync::atomic::AtomicBool>,
    }

    impl InMemoryHashStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Simulates the store going down (or recovering) for fail-open/
        /// fail-closed and recovery tests.
        pub fn set_unreachable(&self, unreachable: bool) {
            self.unreachable.store(unreachable, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl RemoteHashStore for InMemoryHashStore {
        fn get_field<'a>(
            &'a self,
            hash_name: &'a str,
            identifier: &'a str,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<String>, RateLimiterError>> + Send + 'a>>
        {
            Box::pin(async move {
                if self.unreachable.load(std::sync::atomic::Ordering::SeqCst) {
                    return Err(RateLimiterError::new(
                        crate::error::RateLimiterErrorKind::Store,
                        "simulated connection failure".to_string(),
                    ));
                }
                let map = self.fields.lock().await;
                Ok(map.get(&(hash_name.to_string(), identifier.to_string())).cloned())
            })
        }

        fn set_field<'a>(
            &'a self,
            hash_name: &'a str,
            identifier: &'a str,
            value: String,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), RateLimiterError>> + Send + 'a>> {
            Box::pin(async move {
                if self.unreachable.load(std::sync::atomic::Ordering::SeqCst) {
                    return Err(RateLimiterError::new(
                        crate::error::RateLimiterErrorKind::Store,
                        "simulated connection failure".to_string(),
                    ));
                }
                let mut map = self.fields.lock().await;
                map.insert((hash_name.to_string(), identifier.to_string()), value);
                Ok(())
            })
        }
    }
}
