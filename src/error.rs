//! Unified error type.
//!
//! Middleware returns `Result<(), Error>`. Whatever escapes a chain is
//! recovered at the nearest resolution boundary — the [`Application`] for
//! global middleware, the owning [`Router`] for route middleware — and
//! turned into a status-only response there.
//!
//! [`Application`]: crate::Application
//! [`Router`]: crate::Router

use thiserror::Error;

/// The error type flowing through middleware chains and fallible
/// framework operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An error carrying a declared HTTP status. The error handler
    /// responds with exactly this status and an empty body.
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },

    /// A continuation was invoked for a step the chain already passed.
    #[error("next() called multiple times")]
    NextCalledTwice,

    /// `send()` was called after the response had already been sent.
    #[error("response already sent")]
    ResponseAlreadySent,

    /// `send_json` failed to serialize the value.
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Binding the listener or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Any other application failure escaping a middleware.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// An error with a declared HTTP status, e.g. `Error::http(403, "nope")`.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    /// The declared status, if this is an [`Error::Http`].
    ///
    /// Undeclared errors carry no status; the error handler responds
    /// with `500` for them.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
