//! Hierarchical request router.
//!
//! A router owns a base path (its mount point), a map of exact route
//! paths to per-method middleware buckets, and optionally child routers
//! delegated to by base-path prefix. Registration chains by value; build
//! the tree once at startup, before `listen()` — route tables are never
//! mutated afterwards, which is what makes concurrent dispatch safe.
//!
//! Matching is exact-string per path: a route registered at `/users` does
//! not match `/users/1`. There is no `{param}` syntax — a route that needs
//! parameters registers a prefix router and inspects
//! [`Request::path`](crate::Request::path) itself, falling through to the
//! root wildcard bucket.

use std::collections::HashMap;

use tracing::{debug, error};

use crate::context::Context;
use crate::error::Error;
use crate::method::Method;
use crate::middleware::{BoxFuture, BoxedMiddleware, Middleware, Resolution, resolve};

/// One registered path: HTTP method (plus the [`Method::All`] wildcard)
/// mapped to an ordered middleware list.
type RouteEntry<S> = HashMap<Method, Vec<BoxedMiddleware<S>>>;

/// A value accepted by `use_`: either a middleware for the wildcard
/// bucket or a child router to delegate to.
///
/// This is the tagged form of the registration call — dispatch on the
/// variant, not on runtime type inspection.
pub enum Mount<S> {
    Middleware(BoxedMiddleware<S>),
    Router(Router<S>),
}

impl<S: Send + Sync + 'static> Mount<S> {
    pub fn middleware(m: impl Middleware<S>) -> Self {
        Self::Middleware(m.into_boxed_middleware())
    }

    pub fn router(r: Router<S>) -> Self {
        Self::Router(r)
    }
}

/// A path-keyed router with per-method middleware buckets and nested
/// child routers.
pub struct Router<S> {
    base_path: String,
    routes: HashMap<String, RouteEntry<S>>,
    children: HashMap<String, Router<S>>,
}

impl<S: Send + Sync + 'static> Router<S> {
    /// A router mounted at `base_path`.
    ///
    /// For a top-level router the base path is absolute (`/api`); for a
    /// router mounted on another router it is relative to the parent
    /// (`/v2` under `/api` serves `/api/v2/...`).
    ///
    /// Every router starts with a root `/` entry holding an empty
    /// wildcard bucket; that entry doubles as the fallback for paths
    /// that match no exact route and no child.
    pub fn new(base_path: impl Into<String>) -> Self {
        let mut root = RouteEntry::new();
        root.insert(Method::All, Vec::new());
        let mut routes = HashMap::new();
        routes.insert("/".to_owned(), root);
        Self {
            base_path: base_path.into(),
            routes,
            children: HashMap::new(),
        }
    }

    /// The prefix this router is mounted at.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Registers a middleware on the root wildcard bucket, or a child
    /// router under its own base path.
    pub fn use_(mut self, mount: Mount<S>) -> Self {
        match mount {
            Mount::Middleware(m) => {
                self.routes
                    .get_mut("/")
                    .and_then(|entry| entry.get_mut(&Method::All))
                    .expect("root wildcard bucket exists")
                    .push(m);
            }
            Mount::Router(child) => {
                self.children.insert(child.base_path.clone(), child);
            }
        }
        self
    }

    /// Sugar for `use_(Mount::middleware(..))`. Returns `self` for chaining.
    pub fn with(self, middleware: impl Middleware<S>) -> Self {
        self.use_(Mount::middleware(middleware))
    }

    /// Sugar for `use_(Mount::router(..))`. Returns `self` for chaining.
    pub fn mount(self, child: Router<S>) -> Self {
        self.use_(Mount::Router(child))
    }

    /// Appends a middleware to the `method` bucket at `path`, creating
    /// the bucket if absent. `path` is relative to this router's base
    /// path. Returns `self` for chaining.
    pub fn register(mut self, method: Method, path: &str, middleware: impl Middleware<S>) -> Self {
        self.routes
            .entry(path.to_owned())
            .or_default()
            .entry(method)
            .or_default()
            .push(middleware.into_boxed_middleware());
        self
    }

    pub fn all(self, path: &str, middleware: impl Middleware<S>) -> Self {
        self.register(Method::All, path, middleware)
    }

    pub fn connect(self, path: &str, middleware: impl Middleware<S>) -> Self {
        self.register(Method::Connect, path, middleware)
    }

    pub fn delete(self, path: &str, middleware: impl Middleware<S>) -> Self {
        self.register(Method::Delete, path, middleware)
    }

    pub fn get(self, path: &str, middleware: impl Middleware<S>) -> Self {
        self.register(Method::Get, path, middleware)
    }

    pub fn options(self, path: &str, middleware: impl Middleware<S>) -> Self {
        self.register(Method::Options, path, middleware)
    }

    pub fn patch(self, path: &str, middleware: impl Middleware<S>) -> Self {
        self.register(Method::Patch, path, middleware)
    }

    pub fn post(self, path: &str, middleware: impl Middleware<S>) -> Self {
        self.register(Method::Post, path, middleware)
    }

    pub fn put(self, path: &str, middleware: impl Middleware<S>) -> Self {
        self.register(Method::Put, path, middleware)
    }

    pub fn trace(self, path: &str, middleware: impl Middleware<S>) -> Self {
        self.register(Method::Trace, path, middleware)
    }

    /// Dispatches one request whose path this router's base path prefixes.
    ///
    /// Resolution order, on the base-stripped relative path:
    /// 1. exact route entry — wildcard bucket first, then the bucket for
    ///    the request's method (a missing bucket simply runs nothing);
    /// 2. longest-prefix child router, recursively;
    /// 3. the root `/` bucket for the request's method, if non-empty;
    /// 4. otherwise a 404 through this router's error boundary.
    ///
    /// Chain errors never escape: this router recovers them and responds.
    pub(crate) fn dispatch<'a>(&'a self, ctx: &'a Context<S>, path: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let relative = path.strip_prefix(self.base_path.as_str()).unwrap_or(path);
            let relative = if relative.is_empty() { "/" } else { relative };

            if let Some(entry) = self.routes.get(relative) {
                debug!(base = %self.base_path, route = relative, "route matched");
                if let Some(wildcard) = entry.get(&Method::All) {
                    match resolve(wildcard, ctx).await {
                        Ok(Resolution::Completed) => {}
                        Ok(Resolution::ShortCircuited) => return,
                        Err(e) => return self.handle_error(e, ctx),
                    }
                }
                if let Some(bucket) = entry.get(&ctx.request().method()) {
                    if let Err(e) = resolve(bucket, ctx).await {
                        self.handle_error(e, ctx);
                    }
                }
            } else if let Some(child) = longest_prefix(&self.children, relative) {
                child.dispatch(ctx, relative).await;
            } else {
                // Unknown path — possibly a parameterized request. Fall
                // back to the root bucket for this method.
                let fallback = self
                    .routes
                    .get("/")
                    .and_then(|entry| entry.get(&ctx.request().method()));
                match fallback {
                    Some(bucket) if !bucket.is_empty() => {
                        if let Err(e) = resolve(bucket, ctx).await {
                            self.handle_error(e, ctx);
                        }
                    }
                    _ => self.handle_error(
                        Error::http(404, format!("no route matches {path}")),
                        ctx,
                    ),
                }
            }
        })
    }

    /// This router's error boundary: responds with the declared status,
    /// or `500` for undeclared failures. Never runs after a completed
    /// `send()` — the error is logged and dropped instead.
    fn handle_error(&self, err: Error, ctx: &Context<S>) {
        let status = err.status().unwrap_or(500);
        if ctx.respond_status(status) {
            debug!(base = %self.base_path, status, %err, "request failed");
        } else {
            error!(base = %self.base_path, %err, "error after response was sent");
        }
    }
}

/// Longest-prefix lookup, built segment by segment: for `/a/b/c` tries
/// `/a`, `/a/b`, `/a/b/c` and keeps the deepest hit, so a mount at
/// `/a/b` wins over one at `/a`.
pub(crate) fn longest_prefix<'a, T>(map: &'a HashMap<String, T>, path: &str) -> Option<&'a T> {
    let mut found = None;
    let mut prefix = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        prefix.push('/');
        prefix.push_str(segment);
        if let Some(value) = map.get(&prefix) {
            found = Some(value);
        }
    }
    found
}
