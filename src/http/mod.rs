//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, catch-all route)
//!     → request.rs (request ID, body buffering)
//!     → dispatch::Router::serve
//!     → response.rs (ResponseWriter → Response<Bytes>)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::ResponseWriter;
pub use server::{build_app, AppState, HttpServer};
