#![warn(missing_docs)]
//! The middleware adapter: `wrap(handler, identifier_func, rate_spec,
//! options) -> wrapped_handler`.
//!
//! This is the only piece of the crate a host actually calls. It is
//! algorithm-agnostic: any [`LimiterStore`] can back it, so switching from a
//! Token Bucket to a Sliding Window Counter is a construction-time decision,
//! not a code change here. See `spec.md` §4.2.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::{HttpRequest, HttpResponse};
use crate::error::RateLimiterError;
use crate::helpers::box_handler_future;
use crate::spec::RateSpec;
use crate::stores::LimiterStore;

#[cfg(feature = "logger")]
use tracing::warn;

/// The future a [`Handler`] returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HttpResponse> + Send>>;

/// An endpoint handler: takes the incoming request, produces a response.
/// `wrap` turns one `Handler` into another, the same decorator shape
/// `spec.md` §9 calls out ("a function returning a new handler").
pub type Handler = Arc<dyn Fn(HttpRequest) -> HandlerFuture + Send + Sync>;

/// Derives the per-request identifier (by client IP, API key, or any other
/// request attribute). Supplied by the host; out of scope per `spec.md` §1.
pub type IdentifierFn = Arc<dyn Fn(&HttpRequest) -> Result<String, RateLimiterError> + Send + Sync>;

/// Per-algorithm request options, named per `spec.md` §6's
/// `{token_capacity, token_cost, leak_rate, refill_rate}` field set.
///
/// `wrap` itself only consumes `token_cost` (the one knob that applies to
/// every algorithm uniformly: how many budget units this call spends). The
/// other three configure a specific store's own state — `token_capacity`/
/// `refill_rate` a [`crate::stores::token_bucket::TokenBucketConfig`],
/// `leak_rate` a [`crate::stores::leaky_bucket::LeakyBucketConfig`] — and are
/// carried here so a host can load one config object (via the same `serde`
/// derives used elsewhere) and hand its fields to both the store constructor
/// and `wrap`, rather than maintaining two.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimiterOptions {
    /// Token Bucket capacity. Defaults to 6.
    pub token_capacity: f64,
    /// The cost, in budget units, of a single request. Defaults to 1.
    pub token_cost: u64,
    /// Leaky Bucket leak rate, in units per second. Defaults to 1.
    pub leak_rate: f64,
    /// Token Bucket refill rate, in tokens per second. Defaults to 1.
    pub refill_rate: f64,
}

impl Default for RateLimiterOptions {
    fn default() -> Self {
        Self {
            token_capacity: 6.0,
            token_cost: 1,
            leak_rate: 1.0,
            refill_rate: 1.0,
        }
    }
}

/// Wraps `handler` so that every call first consults `store` (keyed by the
/// identifier `identifier_func` derives) before running it.
///
/// Per `spec.md` §4.2:
/// 1. Derive the identifier. A failure here is a host-side client error,
///    not the limiter's concern — it is surfaced as a `400` without ever
///    touching the store.
/// 2. Consult the store for `(allow, remaining, reset)`.
/// 3. Attach `api-ratelimit-*` headers (`reset` omitted when the algorithm
///    doesn't report one).
/// 4. On admission, run `handler` and layer the headers onto its response.
/// 5. On rejection, short-circuit with `429` and the rate-limit-exceeded
///    body; `handler` is never invoked.
pub fn wrap(
    handler: Handler,
    identifier_func: IdentifierFn,
    store: Arc<dyn LimiterStore>,
    rate: RateSpec,
    options: RateLimiterOptions,
) -> Handler {
    Arc::new(move |req: HttpRequest| {
        let handler = handler.clone();
        let identifier_func = identifier_func.clone();
        let store = store.clone();
        let cost = options.token_cost;
        let limit = rate.per_second();

        box_handler_future(async move {
            let identifier = match identifier_func(&req) {
                Ok(id) if !id.is_empty() => id,
                Ok(_) => {
                    return HttpResponse::new()
                        .status(400)
                        .text("Rate limiter identifier must not be empty.");
                }
                Err(err) => {
                    return HttpResponse::new().status(400).text(err.message().to_string());
                }
            };

            let decision = match store.consume(&identifier, cost).await {
                Ok(decision) => decision,
                Err(err) => {
                    #[cfg(feature = "logger")]
                    warn!(identifier = %identifier, error = %err, "rate limiter store error");
                    return HttpResponse::new().status(503).text(err.message().to_string());
                }
            };

            let mut headers_only = HttpResponse::new()
                .set_header("api-ratelimit-limit", format_limit(limit))
                .set_header("api-ratelimit-remaining", format_remaining(decision.remaining));

            if let Some(reset) = decision.reset {
                let epoch = reset
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                headers_only = headers_only.set_header("api-ratelimit-reset", epoch.to_string());
            }

            if decision.allow {
                let mut response = handler(req).await;
                for (key, value) in headers_only.headers.iter() {
                    response = response.set_header(key, value.to_string());
                }
                response
            } else {
                headers_only
                    .status(429)
                    .text(format!("Rate Limit for {identifier} exceeded."))
            }
        })
    })
}

fn format_limit(limit: f64) -> String {
    limit.to_string()
}

fn format_remaining(remaining: f64) -> String {
    if remaining.is_nan() {
        "unknown".to_string()
    } else {
        remaining.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::stores::fixed_window::FixedWindowStore;
    use std::time::Duration;

    fn echo_handler() -> Handler {
        Arc::new(|req: HttpRequest| {
            box_handler_future(async move { HttpResponse::new().status(200).text(format!("hello {}", req.path)) })
        })
    }

    fn by_ip() -> IdentifierFn {
        Arc::new(|req: &HttpRequest| Ok(req.ip.to_string()))
    }

    #[tokio::test]
    async fn admits_and_attaches_headers() {
        let rate = RateSpec::new(6, Duration::from_secs(60)).unwrap();
        let store: Arc<dyn LimiterStore> =
            Arc::new(FixedWindowStore::with_sweep_interval(rate, Duration::from_secs(300)));
        let wrapped = wrap(echo_handler(), by_ip(), store, rate, RateLimiterOptions::default());

        let resp = wrapped(HttpRequest::default()).await;
        assert_eq!(resp.status_code, 200);
        assert!(resp.headers.get("api-ratelimit-limit").is_some());
        assert!(resp.headers.get("api-ratelimit-reset").is_some());
        assert_eq!(resp.body.as_deref(), Some("hello /"));
    }

    #[tokio::test]
    async fn rejects_with_429_and_does_not_invoke_handler() {
        let rate = RateSpec::new(1, Duration::from_secs(60)).unwrap();
        let store: Arc<dyn LimiterStore> =
            Arc::new(FixedWindowStore::with_sweep_interval(rate, Duration::from_secs(300)));
        let wrapped = wrap(echo_handler(), by_ip(), store, rate, RateLimiterOptions::default());

        let first = wrapped(HttpRequest::default()).await;
        assert_eq!(first.status_code, 200);

        let second = wrapped(HttpRequest::default()).await;
        assert_eq!(second.status_code, 429);
        assert_eq!(second.headers.get("api-ratelimit-remaining"), Some("0"));
        assert!(second.body.as_deref().unwrap().contains("exceeded."));
    }

    #[tokio::test]
    async fn identifier_failure_is_a_client_error_not_a_limiter_decision() {
        let rate = RateSpec::new(6, Duration::from_secs(60)).unwrap();
        let store: Arc<dyn LimiterStore> =
            Arc::new(FixedWindowStore::with_sweep_interval(rate, Duration::from_secs(300)));
        let failing_identifier: IdentifierFn = Arc::new(|_req: &HttpRequest| {
            Err(RateLimiterError::new(
                crate::error::RateLimiterErrorKind::Identifier,
                "no api key header".to_string(),
            ))
        });
        let wrapped = wrap(echo_handler(), failing_identifier, store, rate, RateLimiterOptions::default());

        let resp = wrapped(HttpRequest::default()).await;
        assert_eq!(resp.status_code, 400);
        assert!(resp.headers.get("api-ratelimit-limit").is_none());
    }
}
