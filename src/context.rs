//! Per-request context.
//!
//! A [`Context`] binds one [`Request`] to one response-in-progress and to
//! the shared application state. Cloning is cheap — every clone points at
//! the same request — so middleware hands the context to its continuation
//! by value and keeps a clone if it wants to touch the response afterwards.
//!
//! `send()` / `send_json()` are one-shot: the first call wins, any later
//! attempt fails with [`Error::ResponseAlreadySent`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::Serialize;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// The per-request carrier passed through every middleware chain.
pub struct Context<S> {
    inner: Arc<ContextInner<S>>,
}

struct ContextInner<S> {
    req: Request,
    state: Arc<S>,
    res: Mutex<Response>,
    sent: AtomicBool,
    // Filled exactly once by `finish`; the transport takes it after
    // dispatch and writes it to the wire.
    outbox: Mutex<Option<Response>>,
}

impl<S> Clone for Context<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S> Context<S> {
    pub(crate) fn new(req: Request, state: Arc<S>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                req,
                state,
                res: Mutex::new(Response::new()),
                sent: AtomicBool::new(false),
                outbox: Mutex::new(None),
            }),
        }
    }

    pub fn request(&self) -> &Request {
        &self.inner.req
    }

    /// The shared application state.
    ///
    /// Read-mostly and shared across all in-flight requests. The framework
    /// never mutates it and provides no synchronization — mutating it from
    /// middleware without interior locking is a data race.
    pub fn state(&self) -> &S {
        &self.inner.state
    }

    /// Whether `send()` has already completed the response.
    pub fn is_sent(&self) -> bool {
        self.inner.sent.load(Ordering::SeqCst)
    }

    /// Sets the pending status code. Returns `self` for chaining:
    /// `ctx.status(201).send("created")`. No effect once sent.
    pub fn status(&self, code: u16) -> &Self {
        if !self.is_sent() {
            self.res_lock().status = code;
        }
        self
    }

    /// Adds a header to the pending response. No effect once sent.
    pub fn set_header(&self, name: &str, value: &str) -> &Self {
        if !self.is_sent() {
            self.res_lock().headers.push((name.to_owned(), value.to_owned()));
        }
        self
    }

    /// Completes the response with an already-encoded string body.
    ///
    /// No content-type is set — the body is transmitted as-is. This is the
    /// terminal action of a request: the pending status and headers are
    /// snapshotted together with `body` and handed to the transport.
    pub fn send(&self, body: impl Into<String>) -> Result<(), Error> {
        self.finish(Bytes::from(body.into()), None)
    }

    /// Serializes `value` to JSON, sets `content-type: application/json`,
    /// and completes the response.
    ///
    /// A serialization failure leaves the response unsent and propagates
    /// as [`Error::Json`].
    pub fn send_json<T>(&self, value: &T) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(value)?;
        self.finish(Bytes::from(body), Some("application/json"))
    }

    fn finish(&self, body: Bytes, content_type: Option<&'static str>) -> Result<(), Error> {
        if self.inner.sent.swap(true, Ordering::SeqCst) {
            return Err(Error::ResponseAlreadySent);
        }
        let mut res = self.res_lock();
        if let Some(ct) = content_type {
            res.headers.push(("content-type".to_owned(), ct.to_owned()));
        }
        let response = Response {
            status: res.status,
            headers: std::mem::take(&mut res.headers),
            body,
        };
        *self.outbox_lock() = Some(response);
        Ok(())
    }

    /// Status-only response used by the error handlers. Returns `false`
    /// when the response was already sent, in which case nothing happens.
    pub(crate) fn respond_status(&self, status: u16) -> bool {
        if self.inner.sent.swap(true, Ordering::SeqCst) {
            return false;
        }
        *self.outbox_lock() = Some(Response::status_only(status));
        true
    }

    pub(crate) fn take_response(&self) -> Option<Response> {
        self.outbox_lock().take()
    }

    fn res_lock(&self) -> std::sync::MutexGuard<'_, Response> {
        self.inner.res.lock().expect("response state poisoned")
    }

    fn outbox_lock(&self) -> std::sync::MutexGuard<'_, Option<Response>> {
        self.inner.outbox.lock().expect("response state poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    fn ctx() -> Context<()> {
        let req = Request::new(
            Method::Get,
            "/".to_owned(),
            None,
            http::HeaderMap::new(),
            Bytes::new(),
        );
        Context::new(req, Arc::new(()))
    }

    #[test]
    fn send_snapshots_status_and_headers() {
        let ctx = ctx();
        ctx.status(201).set_header("location", "/users/1");
        ctx.send("created").unwrap();

        let res = ctx.take_response().unwrap();
        assert_eq!(res.status(), 201);
        assert_eq!(res.header("location"), Some("/users/1"));
        assert_eq!(res.body(), b"created");
        assert_eq!(res.header("content-type"), None);
    }

    #[test]
    fn send_json_sets_content_type() {
        let ctx = ctx();
        ctx.send_json(&serde_json::json!({ "ok": true })).unwrap();

        let res = ctx.take_response().unwrap();
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body(), br#"{"ok":true}"#);
    }

    #[test]
    fn double_send_fails_loudly() {
        let ctx = ctx();
        ctx.send("first").unwrap();
        assert!(matches!(ctx.send("second"), Err(Error::ResponseAlreadySent)));

        // The first response is the one that goes out.
        assert_eq!(ctx.take_response().unwrap().body(), b"first");
    }

    #[test]
    fn status_after_send_has_no_effect() {
        let ctx = ctx();
        ctx.send("done").unwrap();
        ctx.status(500);
        assert_eq!(ctx.take_response().unwrap().status(), 200);
    }
}
