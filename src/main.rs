//! routemux demo server.
//!
//! ```text
//!     Client Request
//!     ──────▶ axum (request id, trace, timeout)
//!                 │
//!                 ▼
//!            body buffered ──▶ Router::serve
//!                                  │ pooled Context
//!                                  ▼
//!                             RouteTree lookup
//!                        matched │       │ no match
//!                                ▼       ▼
//!                     middleware + handlers   redirect / 405 / 404
//! ```

use std::path::PathBuf;
use std::time::Instant;

use axum::http::StatusCode;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;

use routemux::config::{load_config, RouterConfig};
use routemux::http::RequestIdExt;
use routemux::observability::{logging, metrics};
use routemux::{handler, AllowedMethods, Context, ContextExt, HttpServer, Router, Shutdown};

#[derive(Parser)]
#[command(name = "routemux")]
#[command(about = "Radix-tree HTTP router demo server", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

/// Per-request timing carried by every pooled context.
#[derive(Default)]
struct Clock {
    started: Option<Instant>,
}

impl ContextExt for Clock {
    fn request_start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn request_end(&mut self) {
        self.started = None;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("routemux v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let router = build_router(&config)?;
    tracing::info!(routes = router.route_count(), "Routes registered");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, router, shutdown.subscribe());
    let serving = tokio::spawn(server.run(listener));

    routemux::lifecycle::wait_for_signal().await;
    shutdown.trigger();
    serving.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// JSON response, or a logged 500 when `value` cannot be encoded.
fn respond_json<E: ContextExt, T: Serialize + ?Sized>(
    ctx: &mut Context<E>,
    status: StatusCode,
    value: &T,
) {
    if let Err(e) = ctx.json(status, value) {
        tracing::warn!(error = %e, path = %ctx.path(), "Failed to encode JSON response");
        ctx.text(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error");
    }
}

fn build_router(config: &RouterConfig) -> Result<Router<Clock>, routemux::RouteError> {
    let mut router = Router::with_context(Clock::default);
    router.configure(&config.routing);

    router.use_middleware(handler(|ctx: &mut Context<Clock>| {
        ctx.next();
        let elapsed = ctx.ext().started.map(|t| t.elapsed());
        tracing::debug!(
            request_id = ctx.request().request_id().unwrap_or("-"),
            route = ctx.route_pattern().unwrap_or("-"),
            status = ctx.response().status().as_u16(),
            elapsed = ?elapsed,
            "Handled"
        );
    }));

    router.register_405([handler(|ctx: &mut Context<Clock>| {
        let allowed = ctx
            .get::<AllowedMethods>()
            .map(AllowedMethods::header_value)
            .unwrap_or_default();
        let body = json!({ "error": "method not allowed", "allowed": allowed });
        if let Ok(value) = allowed.parse() {
            ctx.response_mut().headers_mut().insert("allow", value);
        }
        respond_json(ctx, StatusCode::METHOD_NOT_ALLOWED, &body);
    })]);

    router.get("/", [handler(|ctx: &mut Context<Clock>| {
        ctx.text(StatusCode::OK, "routemux");
    })])?;

    router.get("/users/:id", [handler(|ctx: &mut Context<Clock>| {
        let id = ctx.param("id").unwrap_or_default().to_string();
        respond_json(ctx, StatusCode::OK, &json!({ "id": id }));
    })])?;

    router.get("/files/*path", [handler(|ctx: &mut Context<Clock>| {
        let path = ctx.param("path").unwrap_or_default().to_string();
        ctx.text(StatusCode::OK, format!("file: {path}"));
    })])?;

    let mut api = router.group("/api/v1");
    api.use_middleware(handler(|ctx: &mut Context<Clock>| {
        ctx.response_mut()
            .headers_mut()
            .insert("x-api-version", axum::http::HeaderValue::from_static("1"));
        ctx.next();
    }));
    api.get("/health", [handler(|ctx: &mut Context<Clock>| {
        respond_json(ctx, StatusCode::OK, &json!({ "status": "ok" }));
    })])?;
    api.post("/echo", [handler(|ctx: &mut Context<Clock>| {
        let body = ctx.request().body().clone();
        ctx.json_bytes(StatusCode::OK, &body);
    })])?;

    Ok(router)
}
