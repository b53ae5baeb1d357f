//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, Request, StatusCode};
use routemux::config::RouterConfig;
use routemux::{handler, Context, ContextExt, Handler, HttpServer, Router, Shutdown};
use tokio::net::TcpListener;

/// Bodiless request for driving `Router::serve` directly.
pub fn request(method: Method, uri: &str) -> Request<Bytes> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

/// Handler answering 200 with a fixed body.
pub fn reply<E: ContextExt>(body: &'static str) -> Handler<E> {
    handler(move |ctx: &mut Context<E>| ctx.text(StatusCode::OK, body))
}

/// Handler echoing the named parameters as `name=value` lines.
pub fn echo_params<E: ContextExt>() -> Handler<E> {
    handler(|ctx: &mut Context<E>| {
        let body = ctx
            .params()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n");
        ctx.text(StatusCode::OK, body);
    })
}

/// Serve `router` on `addr` until the returned coordinator is triggered.
pub async fn start_server<E: ContextExt>(
    addr: SocketAddr,
    config: RouterConfig,
    router: Router<E>,
) -> Shutdown {
    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, router, shutdown.subscribe());
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
