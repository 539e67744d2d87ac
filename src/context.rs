#![warn(missing_docs)]
//! Minimal request/response context the middleware adapter operates on.
//!
//! `spec.md` places the HTTP server, router, and identifier extraction out
//! of scope: "the core assumes a per-request hook that can (a) identify the
//! caller, (b) run a pre-check, (c) attach response headers, and (d)
//! short-circuit with a rejection response." These types are that hook's
//! vocabulary, trimmed to what the hook needs and nothing a full web
//! framework would otherwise provide (bodies, cookies, multipart, TLS).

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

/// A case-insensitive header map.
///
/// Keys are lower-cased on insert so lookups are case-insensitive without
/// pulling in a full `HeaderMap` implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, replacing any existing value for the same name.
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        self.inner.insert(key.as_ref().to_lowercase(), value.into());
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Iterates over all header name/value pairs, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A minimal incoming request: just enough to extract an identifier from.
///
/// Real method/path/body handling is the host framework's job; this crate
/// only needs the peer address and whatever headers an identifier function
/// wants to inspect (e.g. `X-Forwarded-For`).
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// The direct peer IP address of the connection.
    pub ip: IpAddr,
    /// Request headers.
    pub headers: Headers,
    /// The request path, for host-supplied identifier functions that key on it.
    pub path: String,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            headers: Headers::new(),
            path: String::from("/"),
        }
    }
}

/// A minimal outgoing response: status, headers, and a text body.
///
/// Mirrors the builder style of the teacher's `HttpResponse` (`.status(...)`,
/// `.text(...)`, `.set_header(...)`) without the JSON/HTML/binary/streaming
/// body variants that are out of scope here.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// The numeric HTTP status code.
    pub status_code: u16,
    /// Response headers.
    pub headers: Headers,
    /// The text body, if any has been set.
    pub body: Option<String>,
}

impl HttpResponse {
    /// Creates a fresh response defaulted to `200 OK` with no body.
    pub fn new() -> Self {
        Self {
            status_code: 200,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Sets the status code, returning `self` for chaining.
    pub fn status(mut self, code: u16) -> Self {
        self.status_code = code;
        self
    }

    /// Sets a text body, returning `self` for chaining.
    pub fn text<T: Into<String>>(mut self, body: T) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a single header, returning `self` for chaining.
    pub fn set_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        self.headers.insert(key, value);
        self
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}
