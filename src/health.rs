//! Built-in health-check middleware.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can it serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them on a router:
//!
//! ```rust,no_run
//! use strata::{Router, health};
//!
//! let probes: Router<()> = Router::new("/")
//!     .get("/healthz", health::liveness)
//!     .get("/readyz", health::readiness);
//! ```
//!
//! Override `readiness` with your own middleware if you need to gate on
//! dependency availability (database connections, downstream services).

use crate::context::Context;
use crate::error::Error;
use crate::middleware::Next;

/// Liveness probe: always `200 OK` with body `"ok"`. If the process can
/// respond to HTTP at all, it is alive — intentionally no dependencies.
pub async fn liveness<S>(ctx: Context<S>, _next: Next<S>) -> Result<(), Error> {
    ctx.send("ok")
}

/// Readiness probe (default implementation): `200 OK` with body
/// `"ready"`. Replace it if your application needs a warm-up period.
pub async fn readiness<S>(ctx: Context<S>, _next: Next<S>) -> Result<(), Error> {
    ctx.send("ready")
}
