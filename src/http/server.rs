//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router that forwards every request to the dispatcher
//! - Wire up middleware (tracing, timeout, request ID)
//! - Buffer bodies, attach cancellation, record metrics
//! - Bind server to listener with graceful shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::RouterConfig;
use crate::context::{Cancellation, ContextExt};
use crate::dispatch::{MatchedRoute, Router};
use crate::http::request::{self, RequestIdExt};
use crate::lifecycle::shutdown;
use crate::observability::metrics;

/// Application state injected into the dispatch handler.
pub struct AppState<E: ContextExt> {
    pub router: Arc<Router<E>>,
    pub shutdown: watch::Receiver<bool>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl<E: ContextExt> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            shutdown: self.shutdown.clone(),
            request_timeout: self.request_timeout,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// HTTP front end for a [`Router`].
pub struct HttpServer {
    app: axum::Router,
    shutdown: watch::Receiver<bool>,
}

impl HttpServer {
    /// Create a new HTTP server serving `router`.
    ///
    /// `shutdown` both stops the listener and cancels in-flight handler
    /// chains once it flips to `true`.
    pub fn new<E: ContextExt>(
        config: &RouterConfig,
        router: Router<E>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let state = AppState {
            router: Arc::new(router),
            shutdown: shutdown.clone(),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            max_body_bytes: config.listener.max_body_bytes,
        };

        Self {
            app: build_app(state),
            shutdown,
        }
    }

    /// The Axum application, for driving requests without a listener.
    pub fn app(&self) -> axum::Router {
        self.app.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown::wait(self.shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_app<E: ContextExt>(state: AppState<E>) -> axum::Router {
    let timeout = state.request_timeout;
    axum::Router::new()
        .route("/{*path}", any(dispatch_handler::<E>))
        .route("/", any(dispatch_handler::<E>))
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(request::propagate_request_id_layer())
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = req.request_id().unwrap_or("-"),
                )
            }),
        )
        .layer(request::set_request_id_layer())
}

async fn dispatch_handler<E: ContextExt>(
    State(state): State<AppState<E>>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();

    let request = match request::buffer_body(request, state.max_body_bytes).await {
        Ok(request) => request,
        Err(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), "none", start_time);
            return response;
        }
    };

    let cancellation = Cancellation::none()
        .with_signal(state.shutdown.clone())
        .with_deadline(start_time + state.request_timeout);

    let response = state.router.serve(request, cancellation);

    let route = response
        .extensions()
        .get::<MatchedRoute>()
        .map(MatchedRoute::as_str)
        .unwrap_or("none");
    metrics::record_request(method.as_str(), response.status().as_u16(), route, start_time);

    response.map(Body::from).into_response()
}
