//! Request preparation before dispatch.
//!
//! # Responsibilities
//! - Request ID header name and the layers that set and echo it
//! - Buffer the streaming body into `Bytes` under a size limit
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Declared `Content-Length` is checked before any body is read

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderName, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates an `x-request-id` for requests that arrive without one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Copies the request's `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Read access to the request ID header.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
    }
}

/// Collect the body, rejecting it with 413 once it passes `limit` bytes
/// and with 400 when the body stream itself fails.
pub async fn buffer_body(request: Request<Body>, limit: usize) -> Result<Request<Bytes>, Response> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(payload_too_large());
    }

    let (parts, body) = request.into_parts();
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(Request::from_parts(parts, collected.to_bytes())),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(payload_too_large()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            Err((StatusCode::BAD_REQUEST, "400 Bad Request").into_response())
        }
    }
}

fn payload_too_large() -> Response {
    (StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large").into_response()
}
