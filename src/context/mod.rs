//! Per-request execution context.
//!
//! # Data Flow
//! ```text
//! pool acquire → request_start (reset params, store, cursor, response)
//!     → dispatcher resolves chain + params
//!     → next() runs handler[0], which may call next() for handler[1] ...
//!     → request_end (take response) → pool release
//! ```
//!
//! # Design Decisions
//! - The chain is driven by a cursor, not by nested closures
//! - Request data (`Store`) and cancellation (`Cancellation`) are separate
//! - Hosts extend the context through the `E` slot instead of wrapping it

pub mod cancel;
pub mod store;

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, HeaderValue, Method, Request, Response, StatusCode};
use serde::Serialize;

use crate::error::ContextError;
use crate::http::response::ResponseWriter;
use crate::routing::{Lookup, Params, RouteTree};

pub use cancel::{CancelHandle, Cancellation};
pub use store::Store;

/// A middleware or route handler.
pub type Handler<E = ()> = Arc<dyn Fn(&mut Context<E>) + Send + Sync>;

/// Handlers for one route, in execution order.
pub type Chain<E = ()> = Arc<[Handler<E>]>;

/// Wrap a closure or function as a [`Handler`].
pub fn handler<E, F>(f: F) -> Handler<E>
where
    F: Fn(&mut Context<E>) + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";
pub(crate) const APPLICATION_JSON_UTF8: &str = "application/json; charset=utf-8";

/// Host-defined state carried by every pooled context.
///
/// The hooks run when a pooled context is handed to a new request and right
/// before it goes back to the pool (close per-request resources there).
pub trait ContextExt: Send + 'static {
    fn request_start(&mut self) {}

    fn request_end(&mut self) {}
}

impl ContextExt for () {}

pub struct Context<E = ()> {
    request: Request<Bytes>,
    response: ResponseWriter,
    params: Params,
    store: Store,
    chain: Option<Chain<E>>,
    cursor: usize,
    route: Option<Arc<str>>,
    cancellation: Cancellation,
    ext: E,
}

impl<E: ContextExt> Context<E> {
    pub(crate) fn new(ext: E, params_capacity: usize) -> Self {
        Self {
            request: Request::default(),
            response: ResponseWriter::new(),
            params: Params::with_capacity(params_capacity),
            store: Store::new(),
            chain: None,
            cursor: 0,
            route: None,
            cancellation: Cancellation::none(),
            ext,
        }
    }

    /// Reset every piece of per-request state and bind the new request.
    pub(crate) fn request_start(&mut self, request: Request<Bytes>, cancellation: Cancellation) {
        self.request = request;
        self.response.reset();
        self.params.clear();
        self.store.clear();
        self.chain = None;
        self.cursor = 0;
        self.route = None;
        self.cancellation = cancellation;
        self.ext.request_start();
    }

    /// Finish the request and hand back the response.
    pub(crate) fn request_end(&mut self) -> Response<Bytes> {
        self.ext.request_end();
        let response = self.response.take();
        self.request = Request::default();
        self.params.clear();
        self.store.clear();
        self.chain = None;
        self.route = None;
        self.cancellation = Cancellation::none();
        response
    }

    pub(crate) fn lookup<'t>(&mut self, tree: &'t RouteTree<Chain<E>>) -> Lookup<'t, Chain<E>> {
        tree.find(self.request.method(), self.request.uri().path(), &mut self.params)
    }

    pub(crate) fn set_chain(&mut self, chain: Chain<E>, route: Option<Arc<str>>) {
        self.chain = Some(chain);
        self.cursor = 0;
        self.route = route;
    }

    pub(crate) fn reserve_params(&mut self, capacity: usize) {
        self.params.reserve_total(capacity);
    }

    /// Run the next handler in the chain.
    ///
    /// Control returns here once every downstream handler has finished, so
    /// middleware can do work both before and after the call. A handler that
    /// does not call `next` ends the chain. Past the end of the chain, or once
    /// the request is cancelled, this does nothing.
    ///
    /// Calling `next` twice from the same handler runs the downstream
    /// handlers twice; avoiding that is up to the caller.
    pub fn next(&mut self) {
        let position = self.cursor;
        let handler = match self.chain.as_ref().and_then(|chain| chain.get(position)) {
            Some(handler) => handler.clone(),
            None => return,
        };

        if self.cancellation.is_cancelled() {
            tracing::debug!(
                route = self.route.as_deref().unwrap_or("-"),
                position,
                "Request cancelled, remaining handlers skipped"
            );
            return;
        }

        self.cursor = position + 1;
        handler(self);
        self.cursor = position;
    }
}

impl<E> Context<E> {
    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request<Bytes> {
        &mut self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Value of the path parameter `name`, if the matched route has one.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Registered pattern of the matched route (`None` for fallbacks).
    pub fn route_pattern(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn set<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.store.set(value)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.store.get::<T>()
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.store.get_mut::<T>()
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.store.remove::<T>()
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn ext(&self) -> &E {
        &self.ext
    }

    pub fn ext_mut(&mut self) -> &mut E {
        &mut self.ext
    }

    /// Plain-text response.
    pub fn text(&mut self, status: StatusCode, body: impl AsRef<str>) {
        self.response.set_content_type(TEXT_PLAIN_UTF8);
        self.response.write_header(status);
        self.response.write_body(body.as_ref().as_bytes());
    }

    /// Serialize `value` as the JSON response body.
    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> Result<(), ContextError> {
        let body = serde_json::to_vec(value)?;
        self.json_bytes(status, &body);
        Ok(())
    }

    /// Pre-encoded JSON response body.
    pub fn json_bytes(&mut self, status: StatusCode, body: &[u8]) {
        self.response.set_content_type(APPLICATION_JSON_UTF8);
        self.response.write_header(status);
        self.response.write_body(body);
    }

    /// Raw body with an explicit content type.
    pub fn bytes(&mut self, status: StatusCode, content_type: &str, body: &[u8]) -> Result<(), ContextError> {
        let value = HeaderValue::from_str(content_type)?;
        self.response.headers_mut().insert(header::CONTENT_TYPE, value);
        self.response.write_header(status);
        self.response.write_body(body);
        Ok(())
    }

    /// Redirect to `location` with the given 3xx status.
    pub fn redirect(&mut self, status: StatusCode, location: &str) -> Result<(), ContextError> {
        let value = HeaderValue::from_str(location)?;
        self.response.headers_mut().insert(header::LOCATION, value);
        self.response.write_header(status);
        Ok(())
    }
}
