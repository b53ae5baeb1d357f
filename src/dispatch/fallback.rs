//! Default fallback handlers and trailing-slash redirect helpers.

use axum::http::{header, HeaderValue, Method, StatusCode, Uri};

use crate::context::{handler, Context, ContextExt, Handler};

/// Methods that do have a route for the requested path. Present in the
/// store while the 405 chain runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedMethods(pub Vec<Method>);

impl AllowedMethods {
    /// `Allow` header value, e.g. `GET, POST`.
    pub fn header_value(&self) -> String {
        self.0
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub(crate) fn default_not_found<E: ContextExt>() -> Handler<E> {
    handler(|ctx: &mut Context<E>| {
        ctx.text(StatusCode::NOT_FOUND, "404 Not Found");
    })
}

pub(crate) fn default_method_not_allowed<E: ContextExt>() -> Handler<E> {
    handler(|ctx: &mut Context<E>| {
        let allow = ctx.get::<AllowedMethods>().map(AllowedMethods::header_value);
        if let Some(value) = allow.and_then(|v| HeaderValue::from_str(&v).ok()) {
            ctx.response_mut().headers_mut().insert(header::ALLOW, value);
        }
        ctx.text(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed");
    })
}

/// 301 for safe methods, 307 otherwise so the method and body are kept.
pub(crate) fn redirect_status(method: &Method) -> StatusCode {
    if *method == Method::GET || *method == Method::HEAD {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::TEMPORARY_REDIRECT
    }
}

/// `Location` for a redirect to `path`, keeping the original query string.
pub(crate) fn redirect_location(path: &str, uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_status_split() {
        assert_eq!(redirect_status(&Method::GET), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(redirect_status(&Method::HEAD), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(redirect_status(&Method::POST), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(redirect_status(&Method::DELETE), StatusCode::TEMPORARY_REDIRECT);
    }

    #[test]
    fn test_redirect_location_keeps_query() {
        let uri: Uri = "/foo/?page=2".parse().unwrap();
        assert_eq!(redirect_location("/foo", &uri), "/foo?page=2");

        let uri: Uri = "/foo/".parse().unwrap();
        assert_eq!(redirect_location("/foo", &uri), "/foo");
    }

    #[test]
    fn test_allow_header_value() {
        let allowed = AllowedMethods(vec![Method::GET, Method::POST]);
        assert_eq!(allowed.header_value(), "GET, POST");
    }
}
