//! HTTP front end tests: in-process through the axum app, and over a socket.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use routemux::config::RouterConfig;
use routemux::{handler, Context, HttpServer, Router, Shutdown};
use tower::ServiceExt;

mod common;
use common::{echo_params, reply};

fn demo_router() -> Router {
    let mut router = Router::new();
    router.get("/users/:id", [echo_params()]).unwrap();
    router.get("/plain", [reply("plain")]).unwrap();
    router
        .post("/echo", [handler(|ctx: &mut Context| {
            let body = ctx.request().body().clone();
            ctx.json_bytes(StatusCode::OK, &body);
        })])
        .unwrap();
    router
}

fn app(config: &RouterConfig) -> (axum::Router, Shutdown) {
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, demo_router(), shutdown.subscribe());
    (server.app(), shutdown)
}

async fn read_body(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_routes_through_axum() {
    let (app, _shutdown) = app(&RouterConfig::default());

    let response = app
        .oneshot(Request::get("/users/42").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(read_body(response).await, "id=42");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let (app, _shutdown) = app(&RouterConfig::default());

    let response = app
        .oneshot(
            Request::get("/plain")
                .header("x-request-id", "trace-me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn test_body_reaches_handler() {
    let (app, _shutdown) = app(&RouterConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/echo")
                .body(Body::from(r#"{"ok":true}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json; charset=utf-8"
    );
    assert_eq!(read_body(response).await, r#"{"ok":true}"#);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let mut config = RouterConfig::default();
    config.listener.max_body_bytes = 8;
    let (app, _shutdown) = app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/echo")
                .body(Body::from("far more than eight bytes"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_unmatched_request_gets_404() {
    let (app, _shutdown) = app(&RouterConfig::default());

    let response = app
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_body(response).await, "404 Not Found");
}

#[tokio::test]
async fn test_shutdown_cancels_handler_chains() {
    let (app, shutdown) = app(&RouterConfig::default());
    shutdown.trigger();

    let response = app
        .oneshot(Request::get("/plain").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(read_body(response).await, "503 Service Unavailable");
}

#[tokio::test]
async fn test_served_over_tcp() {
    let addr: SocketAddr = "127.0.0.1:28281".parse().unwrap();
    let mut config = RouterConfig::default();
    config.listener.bind_address = addr.to_string();
    config.routing.handle_method_not_allowed = true;

    let mut router = demo_router();
    router.configure(&config.routing);
    let shutdown = common::start_server(addr, config, router).await;
    let client = common::client();

    let res = client
        .get(format!("http://{}/users/7", addr))
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "id=7");

    let res = client
        .get(format!("http://{}/plain/", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 301);
    assert_eq!(res.headers()["location"], "/plain");

    let res = client
        .delete(format!("http://{}/plain", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 405);
    assert_eq!(res.headers()["allow"], "GET");

    shutdown.trigger();
}
