//! The smallest possible strata app — one global middleware, no routers.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example helloworld
//!
//! Try:
//!   curl http://localhost:8000

use strata::{Application, Context, Error, Next};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let app = Application::new(()).with(hello);

    let handle = app.listen("127.0.0.1:8000").await?;
    handle.closed().await;
    Ok(())
}

async fn hello(ctx: Context<()>, _next: Next<()>) -> Result<(), Error> {
    ctx.send("Hello World!")
}
