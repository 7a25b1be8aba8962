//! # strata
//!
//! A minimal HTTP middleware/routing framework. Nothing more. Nothing less.
//!
//! ## The model
//!
//! Three pieces, composed per request:
//!
//! - **[`Context`]** — one request, one response-in-progress, one shared
//!   state reference. `send()` completes the response, exactly once.
//! - **Middleware** — `async fn (ctx, next)`. Call `next.run(ctx)` exactly
//!   once to continue the chain, or complete the response and return to
//!   short-circuit it. Calling a continuation twice fails the chain.
//! - **[`Router`]** — exact-path route entries, a method-independent
//!   wildcard bucket that always runs first, and nested child routers
//!   selected by longest base-path prefix.
//!
//! An [`Application`] runs its global chain first, then delegates to the
//! router with the longest matching base path. Errors are recovered at the
//! nearest boundary: a declared [`Error::Http`] responds with its status,
//! anything undeclared responds `500`, and nothing responds twice.
//!
//! What strata intentionally skips — the platform stack already owns it:
//!
//! - **TLS termination** — your proxy or ingress
//! - **Body parsing** — `ctx.request().body()` is bytes; bring serde
//! - **Path parameters** — routes are exact strings; a prefix router plus
//!   [`Request::path`] covers the parameterized cases
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use strata::{Application, Context, Error, Next, Router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let users = Router::new("/users").get("/", list_users);
//!
//!     let app = Application::new(())
//!         .with(log_requests)
//!         .mount(users);
//!
//!     let handle = app.listen("0.0.0.0:3000").await?;
//!     handle.closed().await;
//!     Ok(())
//! }
//!
//! async fn log_requests(ctx: Context<()>, next: Next<()>) -> Result<(), Error> {
//!     tracing::info!(path = ctx.request().path(), "request");
//!     next.run(ctx).await
//! }
//!
//! async fn list_users(ctx: Context<()>, _next: Next<()>) -> Result<(), Error> {
//!     ctx.send_json(&serde_json::json!([{ "id": 1 }]))
//! }
//! ```

mod application;
mod context;
mod error;
mod method;
mod middleware;
mod request;
mod response;
mod router;
mod server;

pub mod health;

pub use application::Application;
pub use context::Context;
pub use error::Error;
pub use method::Method;
pub use middleware::{BoxedMiddleware, ErasedMiddleware, Middleware, Next};
pub use request::Request;
pub use router::{Mount, Router};
pub use server::Handle;
