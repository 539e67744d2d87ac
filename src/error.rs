use std::fmt::Display;

/// Represents the category of error that can occur in the rate limiter core.
///
/// This enum classifies errors for easier handling and reporting. Each
/// variant corresponds to a broad class of errors that may arise during
/// configuration, store access, or identifier extraction.
#[derive(Debug, PartialEq, Eq)]
pub enum RateLimiterErrorKind {
    /// A `RateSpec` or store option was constructed with an invalid value
    /// (non-positive rate, period, or capacity).
    Configuration,
    /// The backing store (local or remote) failed to read or write state.
    Store,
    /// The host-supplied identifier function failed or returned an empty key.
    Identifier,
}

impl Display for RateLimiterErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateLimiterErrorKind::Configuration => write!(f, "configuration error"),
            RateLimiterErrorKind::Store => write!(f, "store error"),
            RateLimiterErrorKind::Identifier => write!(f, "identifier error"),
        }
    }
}

/// A structured error type for the rate limiter core.
///
/// `RateLimiterError` encapsulates both the kind of error (see
/// [`RateLimiterErrorKind`]) and a human-readable message, the same shape the
/// rest of the ecosystem uses for structured error reporting.
///
/// # Examples
///
/// ```
/// use ratelimit_core::error::{RateLimiterError, RateLimiterErrorKind};
///
/// let err = RateLimiterError::new(RateLimiterErrorKind::Configuration, "bad rate".to_string());
/// assert_eq!(*err.kind(), RateLimiterErrorKind::Configuration);
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct RateLimiterError {
    kind: RateLimiterErrorKind,
    message: String,
}

impl RateLimiterError {
    /// Creates a new `RateLimiterError` with the specified kind and message.
    pub fn new(kind: RateLimiterErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    /// Returns a reference to the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns a reference to the error kind.
    pub fn kind(&self) -> &RateLimiterErrorKind {
        &self.kind
    }
}

impl Display for RateLimiterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RateLimiterError: {{ message: {}, kind: {} }}",
            self.message, self.kind
        )
    }
}

impl std::error::Error for RateLimiterError {}

impl From<std::io::Error> for RateLimiterError {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: RateLimiterErrorKind::Store,
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "remote")]
impl From<redis::RedisError> for RateLimiterError {
    fn from(err: redis::RedisError) -> Self {
        Self {
            kind: RateLimiterErrorKind::Store,
            message: err.to_string(),
        }
    }
}
