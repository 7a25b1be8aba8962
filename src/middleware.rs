//! Middleware and the chain resolver.
//!
//! # How middleware is stored
//!
//! A chain holds middleware of *different* concrete types in one `Vec`, so
//! we use trait objects (`dyn ErasedMiddleware`) to hide the concrete type
//! behind a common interface and store everything uniformly.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn log(ctx: Context<S>, next: Next<S>) -> Result<(), Error> { … }
//!        ↓ app.with(log)
//! log.into_boxed_middleware()                      ← Middleware blanket impl
//!        ↓
//! Arc::new(FnMiddleware(log))                      ← heap-allocated wrapper
//!        ↓  stored as BoxedMiddleware = Arc<dyn ErasedMiddleware>
//! mw.handle(ctx, next)  at request time            ← one vtable dispatch
//! ```
//!
//! # How a chain resolves
//!
//! [`Next`] is the continuation handed to each middleware. Calling
//! `next.run(ctx)` advances the chain to the following step; not calling it
//! short-circuits the rest of the chain. A shared "steps completed" counter
//! makes the advance strictly monotonic: invoking a continuation for a step
//! the chain already passed is a protocol violation and fails the whole
//! resolution with [`Error::NextCalledTwice`].
//!
//! Middleware runs strictly in list order, cooperatively — step `i + 1`
//! never starts before step `i` invoked its continuation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::Context;
use crate::error::Error;

/// A heap-allocated, type-erased future.
pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// public [`BoxedMiddleware`] alias. External crates cannot usefully
/// interact with this trait.
#[doc(hidden)]
pub trait ErasedMiddleware<S> {
    fn handle(&self, ctx: Context<S>, next: Next<S>) -> BoxFuture<'static, Result<(), Error>>;
}

/// A heap-allocated, type-erased middleware shared across concurrent
/// requests. One atomic reference-count bump per invocation.
pub type BoxedMiddleware<S> = Arc<dyn ErasedMiddleware<S> + Send + Sync + 'static>;

/// Implemented for every valid middleware.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` (or closure returning a future) with the signature:
///
/// ```text
/// async fn name(ctx: Context<S>, next: Next<S>) -> Result<(), Error>
/// ```
///
/// A middleware may read and mutate the context, call `next.run(ctx)`
/// exactly once to continue the chain, or short-circuit by completing the
/// response (or simply returning) without invoking its continuation.
pub trait Middleware<S>: private::Sealed<S> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware<S>;
}

/// The sealing module. Because `Sealed` is private, external crates cannot
/// name it and therefore cannot implement `Middleware` on their own types.
mod private {
    pub trait Sealed<S> {}
}

impl<S, F, Fut> private::Sealed<S> for F
where
    F: Fn(Context<S>, Next<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
}

impl<S, F, Fut> Middleware<S> for F
where
    S: Send + Sync + 'static,
    F: Fn(Context<S>, Next<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware<S> {
        Arc::new(FnMiddleware(self))
    }
}

/// Newtype wrapper bridging a concrete `F` into the trait-object world.
struct FnMiddleware<F>(F);

impl<S, F, Fut> ErasedMiddleware<S> for FnMiddleware<F>
where
    F: Fn(Context<S>, Next<S>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn handle(&self, ctx: Context<S>, next: Next<S>) -> BoxFuture<'static, Result<(), Error>> {
        Box::pin((self.0)(ctx, next))
    }
}

// ── Continuation ─────────────────────────────────────────────────────────────

/// The continuation handed to each middleware.
///
/// `run` consumes the value, but `Next` is `Clone` so a middleware can keep
/// a copy and decide later whether to advance. The runtime guard — not the
/// type system — enforces single use: running a continuation for a step the
/// chain already passed fails with [`Error::NextCalledTwice`].
pub struct Next<S> {
    chain: Arc<[BoxedMiddleware<S>]>,
    index: usize,
    // Steps completed so far. Advancing to step `i` is legal iff
    // `i >= reached`; on success `reached` becomes `i + 1`.
    reached: Arc<AtomicUsize>,
}

impl<S> Clone for Next<S> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            index: self.index,
            reached: Arc::clone(&self.reached),
        }
    }
}

impl<S: Send + Sync + 'static> Next<S> {
    /// Advances the chain to this continuation's step.
    ///
    /// Runs the middleware at that step (which receives a continuation
    /// bound to the step after it), or completes the resolution if the
    /// chain is exhausted. Any error from the remaining steps propagates
    /// out of this call.
    pub async fn run(self, ctx: Context<S>) -> Result<(), Error> {
        let i = self.index;
        if i < self.reached.load(Ordering::Acquire) {
            return Err(Error::NextCalledTwice);
        }
        self.reached.store(i + 1, Ordering::Release);

        if i == self.chain.len() {
            return Ok(());
        }
        let mw = Arc::clone(&self.chain[i]);
        let next = Next {
            chain: self.chain,
            index: i + 1,
            reached: self.reached,
        };
        mw.handle(ctx, next).await
    }
}

// ── Resolver ─────────────────────────────────────────────────────────────────

/// How a chain resolution ended, short of an error.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// Every middleware invoked its continuation; the cursor walked past
    /// the end of the chain.
    Completed,
    /// Some middleware returned without advancing. The rest of the chain —
    /// and everything the caller would run afterwards — must not run.
    ShortCircuited,
}

/// Runs `chain` over `ctx` with continuation semantics.
///
/// An empty chain completes immediately. Errors abort the resolution at
/// the step that raised them; no later middleware runs.
pub(crate) async fn resolve<S>(
    chain: &[BoxedMiddleware<S>],
    ctx: &Context<S>,
) -> Result<Resolution, Error>
where
    S: Send + Sync + 'static,
{
    if chain.is_empty() {
        return Ok(Resolution::Completed);
    }
    let len = chain.len();
    let reached = Arc::new(AtomicUsize::new(0));
    let next = Next {
        chain: chain.to_vec().into(),
        index: 0,
        reached: Arc::clone(&reached),
    };
    next.run(ctx.clone()).await?;

    if reached.load(Ordering::Acquire) == len + 1 {
        Ok(Resolution::Completed)
    } else {
        Ok(Resolution::ShortCircuited)
    }
}
