//! The response under construction.
//!
//! Middleware mutates a `Response` in place through the
//! [`Context`](crate::Context) — `status()` and `set_header()` — until
//! `send()` takes a snapshot of it. Only that snapshot is ever
//! transmitted.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;

/// A response in progress: status (default `200`), header collection,
/// and body. The body stays empty until `send()` provides one.
pub struct Response {
    pub(crate) status: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
}

impl Response {
    pub(crate) fn new() -> Self {
        Self { status: 200, headers: Vec::new(), body: Bytes::new() }
    }

    pub(crate) fn status_only(status: u16) -> Self {
        Self { status, headers: Vec::new(), body: Bytes::new() }
    }

    pub(crate) fn status(&self) -> u16 { self.status }

    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn body(&self) -> &[u8] { &self.body }

    /// Converts into the hyper response handed back to the transport.
    ///
    /// An unrepresentable status or header degrades to a bare `500`
    /// rather than tearing down the connection.
    pub(crate) fn into_hyper(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        match builder.body(Full::new(self.body)) {
            Ok(res) => res,
            Err(e) => {
                tracing::error!("invalid response parts: {e}");
                let mut res = http::Response::new(Full::default());
                *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                res
            }
        }
    }
}
