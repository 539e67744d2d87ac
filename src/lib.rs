#![warn(missing_docs)]

//! # ratelimit-core
//!
//! A library of pluggable rate-limiting algorithms consumed as middleware
//! wrapping request handlers in an HTTP-style service.
//!
//! ## Modules
//!
//! - [`spec`] - The `RateSpec` value object: a budget of `R` requests per period `D`.
//! - [`context`] - Minimal request/response types the middleware contract operates on.
//! - [`stores`] - The five limiter algorithms and the remote store variant.
//! - [`middleware`] - The adapter that wraps a handler with a limiter store.
//! - [`helpers`] - Small async/future helpers shared across the crate.
//! - [`error`] - Structured error types for configuration, store, and identifier failures.

/// The `RateSpec` value object: a budget of `R` requests per period `D`.
///
/// See [`spec::RateSpec`] for details.
pub mod spec;

/// Minimal request/response context the middleware adapter operates on.
///
/// See [`context::HttpRequest`] and [`context::HttpResponse`] for details.
pub mod context;

/// The five limiter algorithms and their state stores, local and remote.
pub mod stores;

/// The middleware adapter: wraps a handler with a limiter store.
pub mod middleware;

/// Small async/future helpers shared across the crate.
pub mod helpers;

/// Structured error types for the rate limiter core.
///
/// This module provides [`error::RateLimiterError`] and
/// [`error::RateLimiterErrorKind`] for classifying configuration, store, and
/// identifier-extraction failures.
pub mod error;

/// Internal test suite for the rate limiter core.
#[cfg(test)]
mod tests;
