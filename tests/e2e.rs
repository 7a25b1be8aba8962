//! End-to-end tests over real sockets.
//!
//! Each test binds an application to an OS-assigned port, speaks raw
//! HTTP/1.1 over a `TcpStream` with `connection: close`, and asserts on
//! the status line, headers, and body that come back.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use strata::{Application, Context, Error, Next, Router, health};

struct Reply {
    status: u16,
    headers: HashMap<String, String>,
    body: String,
}

async fn fetch(addr: SocketAddr, method: &str, path: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("{method} {path} HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();

    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    let mut lines = head.lines();
    let status = lines
        .next()
        .unwrap()
        .split_whitespace()
        .nth(1)
        .unwrap()
        .parse()
        .unwrap();
    let headers = lines
        .map(|line| {
            let (name, value) = line.split_once(':').unwrap();
            (name.trim().to_ascii_lowercase(), value.trim().to_owned())
        })
        .collect();

    Reply { status, headers, body: body.to_owned() }
}

#[tokio::test]
async fn hello_world_from_global_middleware() {
    let app = Application::new(()).with(|ctx: Context<()>, _next: Next<()>| async move {
        ctx.send("Hello World!")
    });
    let handle = app.listen("127.0.0.1:0").await.unwrap();

    let reply = fetch(handle.local_addr(), "GET", "/").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "Hello World!");
    assert!(!reply.headers.contains_key("content-type"));

    handle.close();
    handle.closed().await;
}

#[tokio::test]
async fn json_body_sets_content_type() {
    let app = Application::new(()).with(|ctx: Context<()>, _next: Next<()>| async move {
        ctx.send_json(&serde_json::json!({ "ok": true }))
    });
    let handle = app.listen("127.0.0.1:0").await.unwrap();

    let reply = fetch(handle.local_addr(), "GET", "/").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, r#"{"ok":true}"#);
    assert_eq!(reply.headers.get("content-type").map(String::as_str), Some("application/json"));

    handle.close();
    handle.closed().await;
}

#[tokio::test]
async fn mounted_router_with_status_chain() {
    let greet = Router::new("/greet").get("/hi", |ctx: Context<()>, _next: Next<()>| {
        async move { ctx.status(201).send("hi") }
    });
    let app = Application::new(()).mount(greet);
    let handle = app.listen("127.0.0.1:0").await.unwrap();

    let reply = fetch(handle.local_addr(), "GET", "/greet/hi").await;
    assert_eq!(reply.status, 201);
    assert_eq!(reply.body, "hi");

    handle.close();
    handle.closed().await;
}

#[tokio::test]
async fn unregistered_path_without_routers_is_404() {
    let app: Application<()> = Application::new(());
    let handle = app.listen("127.0.0.1:0").await.unwrap();

    let reply = fetch(handle.local_addr(), "GET", "/nope").await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.body, "");

    handle.close();
    handle.closed().await;
}

#[tokio::test]
async fn longest_prefix_router_wins() {
    let api = Router::new("/api").get("/v2/items", |ctx: Context<()>, _next: Next<()>| {
        async move { ctx.send("api") }
    });
    let v2 = Router::new("/api/v2").get("/items", |ctx: Context<()>, _next: Next<()>| {
        async move { ctx.send("v2") }
    });
    let app = Application::new(()).mount(api).mount(v2);
    let handle = app.listen("127.0.0.1:0").await.unwrap();

    let reply = fetch(handle.local_addr(), "GET", "/api/v2/items").await;
    assert_eq!(reply.body, "v2");

    handle.close();
    handle.closed().await;
}

#[tokio::test]
async fn unknown_wire_method_is_405() {
    let app = Application::new(()).with(|ctx: Context<()>, _next: Next<()>| async move {
        ctx.send("never")
    });
    let handle = app.listen("127.0.0.1:0").await.unwrap();

    // HEAD is outside the dispatchable method set.
    let reply = fetch(handle.local_addr(), "HEAD", "/").await;
    assert_eq!(reply.status, 405);

    handle.close();
    handle.closed().await;
}

#[tokio::test]
async fn declared_http_error_reaches_the_wire() {
    let admin = Router::new("/admin").get("/", |_ctx: Context<()>, _next: Next<()>| async {
        Err(Error::http(403, "forbidden"))
    });
    let app = Application::new(()).mount(admin);
    let handle = app.listen("127.0.0.1:0").await.unwrap();

    let reply = fetch(handle.local_addr(), "GET", "/admin").await;
    assert_eq!(reply.status, 403);
    assert_eq!(reply.body, "");

    handle.close();
    handle.closed().await;
}

#[tokio::test]
async fn health_probes() {
    let app = Application::new(())
        .mount(Router::new("/healthz").get("/", health::liveness))
        .mount(Router::new("/readyz").get("/", health::readiness));
    let handle = app.listen("127.0.0.1:0").await.unwrap();

    let reply = fetch(handle.local_addr(), "GET", "/healthz").await;
    assert_eq!((reply.status, reply.body.as_str()), (200, "ok"));
    let reply = fetch(handle.local_addr(), "GET", "/readyz").await;
    assert_eq!((reply.status, reply.body.as_str()), (200, "ready"));

    handle.close();
    handle.closed().await;
}

#[tokio::test]
async fn close_drains_and_resolves() {
    let app = Application::new(()).with(|ctx: Context<()>, _next: Next<()>| async move {
        ctx.send("bye")
    });
    let handle = app.listen("127.0.0.1:0").await.unwrap();
    let addr = handle.local_addr();

    let reply = fetch(addr, "GET", "/").await;
    assert_eq!(reply.status, 200);

    handle.close();
    tokio::time::timeout(Duration::from_secs(5), handle.closed())
        .await
        .expect("server did not drain in time");

    // The listener is gone: new connections are refused.
    assert!(TcpStream::connect(addr).await.is_err());
}
