#![warn(missing_docs)]
//! Small async/future helpers shared across the crate.

use crate::context::HttpResponse;
use crate::middleware::HandlerFuture;
use std::future::Future;

/// Boxes a future into a [`HandlerFuture`].
///
/// Exists so `middleware::wrap`'s returned closure can return
/// `impl Fn(...) -> HandlerFuture` without every call site repeating
/// `Box::pin(async move { ... })` — a closure's inferred future type
/// doesn't unsize-coerce to `dyn Future` on its own.
pub(crate) fn box_handler_future<F>(future: F) -> HandlerFuture
where
    F: Future<Output = HttpResponse> + Send + 'static,
{
    Box::pin(future)
}
