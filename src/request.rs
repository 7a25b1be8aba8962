//! Incoming HTTP request type.

use bytes::Bytes;
use http::HeaderMap;

use crate::method::Method;

/// An incoming HTTP request.
///
/// Immutable for the duration of one request lifecycle, owned by the
/// [`Context`](crate::Context) that wraps it. The query string is split
/// off the URL before any path matching happens.
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        path: String,
        query: Option<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self { method, path, query, headers, body }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }

    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Returns `None` for headers whose
    /// value is not valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
