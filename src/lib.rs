//! HTTP request router: a radix route tree with a pooled, middleware-aware
//! dispatcher, plus an Axum front end for serving it.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::RouterConfig;
pub use context::{handler, Cancellation, CancelHandle, Chain, Context, ContextExt, Handler};
pub use dispatch::{AllowedMethods, MatchedRoute, RouteGroup, Router};
pub use error::{ContextError, RouteError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Params, RouteTree};
