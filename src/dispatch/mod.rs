//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Router::serve(request)
//!     → pool.rs (acquire context, reset)
//!     → routing tree lookup
//!     → matched: run chain
//!       no match: fallback.rs (redirect / 405 / 404)
//!     → take response → pool.rs (release)
//! ```
//!
//! # Design Decisions
//! - Explicit `Router` instance, no process-wide registry
//! - Pool contexts instead of allocating per request
//! - Every unmatched request still gets a complete response

pub mod fallback;
pub mod group;
pub mod pool;
pub mod router;

use axum::http::Method;

pub use fallback::AllowedMethods;
pub use group::RouteGroup;
pub use pool::{ContextFactory, ContextPool, PooledContext};
pub use router::{MatchedRoute, Router};

/// Methods registered by `any`.
pub const STANDARD_METHODS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::CONNECT,
    Method::TRACE,
];
