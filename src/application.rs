//! Top-level request dispatcher.
//!
//! An [`Application`] owns the global middleware list, a base-path-keyed
//! registry of routers, and the shared state every request can read.
//! Build it with the chaining registration methods, then hand it to
//! [`listen`](Application::listen) — after that the tables are immutable
//! and shared read-only across every in-flight request.
//!
//! Per request: wrap in a [`Context`] → resolve the global chain (an
//! error stops dispatch at this boundary) → pick the router with the
//! longest matching base-path prefix → delegate. A request that no
//! middleware completes is left pending, exactly as a chain that never
//! calls `next()` leaves it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error};

use crate::context::Context;
use crate::error::Error;
use crate::middleware::{BoxedMiddleware, Middleware, Resolution, resolve};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Mount, Router, longest_prefix};

/// The application: global middleware, mounted routers, shared state.
pub struct Application<S> {
    middlewares: Vec<BoxedMiddleware<S>>,
    routers: HashMap<String, Router<S>>,
    state: Arc<S>,
}

impl<S: Send + Sync + 'static> Application<S> {
    /// An application owning `state`.
    ///
    /// The state lives as long as the application and is shared with
    /// every context; use `()` if you have none.
    pub fn new(state: S) -> Self {
        Self {
            middlewares: Vec::new(),
            routers: HashMap::new(),
            state: Arc::new(state),
        }
    }

    /// Replaces the shared state seen by all subsequently created
    /// contexts. Registration happens before `listen()`, so there are
    /// never in-flight requests observing the swap.
    pub fn set_state(mut self, state: S) -> Self {
        self.state = Arc::new(state);
        self
    }

    /// Registers a global middleware, or a router under its base path.
    pub fn use_(mut self, mount: Mount<S>) -> Self {
        match mount {
            Mount::Middleware(m) => self.middlewares.push(m),
            Mount::Router(router) => {
                self.routers.insert(router.base_path().to_owned(), router);
            }
        }
        self
    }

    /// Sugar for `use_(Mount::middleware(..))`. Returns `self` for chaining.
    pub fn with(self, middleware: impl Middleware<S>) -> Self {
        self.use_(Mount::middleware(middleware))
    }

    /// Sugar for `use_(Mount::router(..))`. Returns `self` for chaining.
    pub fn mount(self, router: Router<S>) -> Self {
        self.use_(Mount::Router(router))
    }

    /// Dispatches one request to a response.
    ///
    /// `None` means nothing completed the response — the transport holds
    /// the request open, matching a chain that never resolves.
    pub(crate) async fn handle(&self, req: Request) -> Option<Response> {
        let ctx = Context::new(req, Arc::clone(&self.state));

        match resolve(&self.middlewares, &ctx).await {
            Err(e) => {
                // An error in a global middleware stops dispatch here;
                // it never reaches a router's boundary.
                self.handle_error(e, &ctx);
                return ctx.take_response();
            }
            Ok(Resolution::ShortCircuited) => return ctx.take_response(),
            Ok(Resolution::Completed) => {}
        }

        if self.routers.is_empty() {
            self.handle_error(Error::http(404, "no routers registered"), &ctx);
        } else {
            let path = ctx.request().path();
            match longest_prefix(&self.routers, path) {
                Some(router) => router.dispatch(&ctx, path).await,
                None => {
                    self.handle_error(Error::http(404, format!("no router matches {path}")), &ctx);
                }
            }
        }

        ctx.take_response()
    }

    /// The application's error boundary for global-chain failures:
    /// declared status, or `500` for undeclared errors. Never responds
    /// after a completed `send()`.
    fn handle_error(&self, err: Error, ctx: &Context<S>) {
        let status = err.status().unwrap_or(500);
        if ctx.respond_status(status) {
            debug!(status, %err, "request failed");
        } else {
            error!(%err, "error after response was sent");
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::method::Method;
    use crate::middleware::Next;

    fn request(method: Method, path: &str) -> Request {
        Request::new(
            method,
            path.to_owned(),
            None,
            http::HeaderMap::new(),
            Bytes::new(),
        )
    }

    #[tokio::test]
    async fn global_middleware_can_answer_without_routers() {
        let app = Application::new(()).with(|ctx: Context<()>, _next: Next<()>| async move {
            ctx.send("Hello World!")
        });

        let res = app.handle(request(Method::Get, "/")).await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), b"Hello World!");
        assert_eq!(res.header("content-type"), None);
    }

    #[tokio::test]
    async fn no_routers_is_404() {
        let app: Application<()> = Application::new(());
        let res = app.handle(request(Method::Get, "/missing")).await.unwrap();
        assert_eq!(res.status(), 404);
    }

    #[tokio::test]
    async fn selects_longest_prefix_router() {
        let api = Router::new("/api").get("/v2/items", |ctx: Context<()>, _next: Next<()>| {
            async move { ctx.send("api") }
        });
        let v2 = Router::new("/api/v2").get("/items", |ctx: Context<()>, _next: Next<()>| {
            async move { ctx.send("v2") }
        });
        let app = Application::new(()).mount(api).mount(v2);

        let res = app.handle(request(Method::Get, "/api/v2/items")).await.unwrap();
        assert_eq!(res.body(), b"v2");
    }

    #[tokio::test]
    async fn global_error_stops_dispatch_before_routing() {
        let hits = Arc::new(std::sync::Mutex::new(0));
        let hits2 = Arc::clone(&hits);
        let router = Router::new("/x").get("/", move |ctx: Context<()>, _next: Next<()>| {
            let hits = Arc::clone(&hits2);
            async move {
                *hits.lock().unwrap() += 1;
                ctx.send("never")
            }
        });
        let app = Application::new(())
            .with(|_ctx: Context<()>, _next: Next<()>| async {
                Err(Error::http(401, "auth required"))
            })
            .mount(router);

        let res = app.handle(request(Method::Get, "/x")).await.unwrap();
        assert_eq!(res.status(), 401);
        assert_eq!(res.body(), b"");
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn state_is_visible_to_middleware() {
        struct AppState {
            greeting: &'static str,
        }
        let app = Application::new(AppState { greeting: "hi" }).with(
            |ctx: Context<AppState>, _next: Next<AppState>| async move {
                let greeting = ctx.state().greeting;
                ctx.send(greeting)
            },
        );

        let res = app.handle(request(Method::Get, "/")).await.unwrap();
        assert_eq!(res.body(), b"hi");
    }
}
