//! HTTP transport glue: the accept loop, shutdown, and the [`Handle`].
//!
//! Everything in this module is plumbing between the platform HTTP stack
//! (tokio + hyper) and [`Application::handle`]. The server reacts to a
//! shutdown — [`Handle::close`], SIGTERM, or Ctrl-C — by:
//!
//! 1. Immediately stopping `listener.accept()` — no new connections.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Resolving [`Handle::closed`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info};

use crate::application::Application;
use crate::error::Error;
use crate::method::Method;
use crate::request::Request;

/// A handle to a listening application.
///
/// Dropping the handle also closes the server; keep it alive (and await
/// [`closed`](Handle::closed)) for the lifetime of the process.
pub struct Handle {
    shutdown: watch::Sender<bool>,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl Handle {
    /// The address the listener is actually bound to. Useful with port
    /// `0`, where the OS picks the port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections. In-flight requests drain before
    /// [`closed`](Handle::closed) resolves.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Resolves once the accept loop has stopped and every in-flight
    /// connection has finished.
    pub async fn closed(self) {
        let _ = self.task.await;
    }
}

impl<S: Send + Sync + 'static> Application<S> {
    /// Binds `addr` and starts accepting connections, dispatching each
    /// request through the global chain and the mounted routers.
    ///
    /// The accept loop runs on a spawned task; the returned [`Handle`]
    /// stops it. The loop also stops on SIGTERM or Ctrl-C. There is no
    /// concurrency cap — every accepted connection is served.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub async fn listen(self, addr: &str) -> Result<Handle, Error> {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown, rx) = watch::channel(false);
        let app = Arc::new(self);
        let task = tokio::spawn(accept_loop(listener, app, rx));

        info!(addr = %local_addr, "strata listening");
        Ok(Handle { shutdown, local_addr, task })
    }
}

async fn accept_loop<S: Send + Sync + 'static>(
    listener: TcpListener,
    app: Arc<Application<S>>,
    mut close_rx: watch::Receiver<bool>,
) {
    // JoinSet tracks every spawned connection task so we can wait for
    // them all to finish during graceful shutdown.
    let mut tasks = JoinSet::new();

    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            // `biased` checks arms top-to-bottom: a shutdown immediately
            // stops accepting, even with connections queued.
            biased;

            () = &mut signal => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            // `changed` also fires with an error when the Handle is
            // dropped; either way, stop accepting.
            _ = close_rx.changed() => {
                info!(in_flight = tasks.len(), "close requested, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let app = Arc::clone(&app);
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // One closure call per request on the connection.
                    let svc = service_fn(move |req| {
                        let app = Arc::clone(&app);
                        async move { serve_request(app, req).await }
                    });

                    // `auto::Builder` handles both HTTP/1.1 and HTTP/2,
                    // whatever the client negotiates.
                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await
                    {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    // Drain: wait for every in-flight connection before returning.
    while tasks.join_next().await.is_some() {}

    info!("strata stopped");
}

/// Adapts one hyper request to the framework and back.
///
/// The error type is [`Infallible`] — every failure becomes a status
/// response here, hyper never sees an error.
async fn serve_request<S: Send + Sync + 'static>(
    app: Arc<Application<S>>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let method: Method = match req.method().as_str().parse() {
        Ok(m) => m,
        // Methods outside the dispatchable set never reach a chain.
        Err(()) => return Ok(status_response(StatusCode::METHOD_NOT_ALLOWED)),
    };

    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_owned();
    let query = parts.uri.query().map(str::to_owned);

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("failed to read request body: {e}");
            return Ok(status_response(StatusCode::BAD_REQUEST));
        }
    };

    let request = Request::new(method, path, query, parts.headers, body);
    match app.handle(request).await {
        Some(response) => Ok(response.into_hyper()),
        // Nothing completed the response: hold the request open. A chain
        // that neither advances nor sends leaves the request pending.
        None => std::future::pending().await,
    }
}

fn status_response(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut res = http::Response::new(Full::default());
    *res.status_mut() = status;
    res
}

/// Resolves on the first shutdown signal the process receives: SIGTERM
/// (sent by orchestrators) or SIGINT (Ctrl-C) on Unix, Ctrl-C elsewhere.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
