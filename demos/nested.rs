//! Nested routers, shared state, JSON responses, and health probes.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example nested
//!
//! Try:
//!   curl -i http://localhost:3000/api/items
//!   curl -i http://localhost:3000/api/v2/items
//!   curl -i -X POST http://localhost:3000/api/items
//!   curl -i http://localhost:3000/healthz

use serde::Serialize;
use strata::{Application, Context, Error, Next, Router, health};

#[derive(Serialize)]
struct Item {
    id: u32,
    name: &'static str,
}

struct AppState {
    service: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    // `/api/v2` wins over `/api` for any path under it: longest matching
    // base path, not registration order.
    let v2 = Router::new("/api/v2").get("/items", items_v2);

    let api = Router::new("/api")
        .all("/items", tag_service)
        .get("/items", items_v1)
        .post("/items", create_item);

    let app = Application::new(AppState { service: "nested-demo" })
        .with(log_requests)
        .mount(api)
        .mount(v2)
        .mount(Router::new("/healthz").get("/", health::liveness))
        .mount(Router::new("/readyz").get("/", health::readiness));

    let handle = app.listen("127.0.0.1:3000").await?;
    handle.closed().await;
    Ok(())
}

// Global middleware: runs for every request, before any router.
async fn log_requests(ctx: Context<AppState>, next: Next<AppState>) -> Result<(), Error> {
    tracing::info!(
        method = %ctx.request().method(),
        path = ctx.request().path(),
        "request"
    );
    next.run(ctx).await
}

// Wildcard-bucket middleware: runs for every method on /api/items,
// always before the method-specific middleware.
async fn tag_service(ctx: Context<AppState>, next: Next<AppState>) -> Result<(), Error> {
    ctx.set_header("x-service", ctx.state().service);
    next.run(ctx).await
}

async fn items_v1(ctx: Context<AppState>, _next: Next<AppState>) -> Result<(), Error> {
    ctx.send_json(&[Item { id: 1, name: "anvil" }])
}

async fn items_v2(ctx: Context<AppState>, _next: Next<AppState>) -> Result<(), Error> {
    ctx.send_json(&serde_json::json!({
        "items": [Item { id: 1, name: "anvil" }],
        "version": 2,
    }))
}

async fn create_item(ctx: Context<AppState>, _next: Next<AppState>) -> Result<(), Error> {
    if ctx.request().body().is_empty() {
        return Err(Error::http(422, "empty body"));
    }
    ctx.status(201).send_json(&Item { id: 2, name: "hammer" })
}
