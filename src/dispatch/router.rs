//! Route registration and per-request dispatch.
//!
//! # Responsibilities
//! - Own the route tree, the context pool and the fallback chains
//! - Build handler chains (router middleware + group middleware + handlers)
//! - Resolve each request and apply the fallback policy:
//!   trailing-slash redirect → 405 → 404
//!
//! # Design Decisions
//! - Registration takes `&mut self`, serving takes `&self`: once the router
//!   is shared the tree cannot change, so lookups need no locking
//! - Middleware is captured when a route is registered; call
//!   `use_middleware` before registering the routes it should wrap

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{Method, Request, Response, StatusCode};

use crate::config::RoutingConfig;
use crate::context::{Cancellation, Chain, Context, ContextExt, Handler};
use crate::dispatch::fallback::{self, AllowedMethods};
use crate::dispatch::group::RouteGroup;
use crate::dispatch::pool::ContextPool;
use crate::error::RouteError;
use crate::routing::pattern::toggle_trailing_slash;
use crate::routing::{Lookup, RouteTree};

/// Registered pattern of the route that served a response, attached to the
/// response extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(pub Arc<str>);

impl MatchedRoute {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Registration shorthands shared by [`Router`] and [`RouteGroup`].
macro_rules! method_shorthands {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            pub fn $name(
                &mut self,
                pattern: &str,
                handlers: impl IntoIterator<Item = Handler<E>>,
            ) -> Result<(), RouteError> {
                self.handle(Method::$method, pattern, handlers)
            }
        )*

        /// Register the same handlers for every standard method.
        pub fn any(
            &mut self,
            pattern: &str,
            handlers: impl IntoIterator<Item = Handler<E>>,
        ) -> Result<(), RouteError> {
            let handlers: Vec<Handler<E>> = handlers.into_iter().collect();
            for method in crate::dispatch::STANDARD_METHODS {
                self.handle(method, pattern, handlers.iter().cloned())?;
            }
            Ok(())
        }
    };
}

pub(crate) use method_shorthands;

pub struct Router<E: ContextExt = ()> {
    tree: RouteTree<Chain<E>>,
    middleware: Vec<Handler<E>>,
    pool: ContextPool<E>,
    not_found: Chain<E>,
    method_not_allowed: Chain<E>,
    redirect_trailing_slash: bool,
    handle_method_not_allowed: bool,
}

impl Default for Router<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl Router<()> {
    /// Router with the plain context and default options.
    pub fn new() -> Self {
        Self::with_context(|| ())
    }
}

impl<E: ContextExt> Router<E> {
    /// Router whose pooled contexts carry an extension built by `factory`.
    pub fn with_context<F>(factory: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        let defaults = RoutingConfig::default();
        Self {
            tree: RouteTree::new(),
            middleware: Vec::new(),
            pool: ContextPool::new(Arc::new(factory), defaults.pool_max_idle),
            not_found: Chain::from(vec![fallback::default_not_found()]),
            method_not_allowed: Chain::from(vec![fallback::default_method_not_allowed()]),
            redirect_trailing_slash: defaults.redirect_trailing_slash,
            handle_method_not_allowed: defaults.handle_method_not_allowed,
        }
    }

    /// Apply the routing section of the configuration.
    pub fn configure(&mut self, config: &RoutingConfig) {
        self.redirect_trailing_slash = config.redirect_trailing_slash;
        self.handle_method_not_allowed = config.handle_method_not_allowed;
        self.pool.set_max_idle(config.pool_max_idle);
    }

    /// Replace the context extension factory. Idle pooled contexts built by
    /// the previous factory are discarded.
    pub fn register_context<F>(&mut self, factory: F)
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        self.pool.set_factory(Arc::new(factory));
    }

    /// Redirect `/foo/` to `/foo` (and back) when only the other form exists.
    pub fn set_redirect_trailing_slash(&mut self, enabled: bool) {
        self.redirect_trailing_slash = enabled;
    }

    /// Answer 405 instead of 404 when the path exists for other methods.
    pub fn set_handle_method_not_allowed(&mut self, enabled: bool) {
        self.handle_method_not_allowed = enabled;
    }

    /// Override the 404 chain.
    pub fn register_404(&mut self, handlers: impl IntoIterator<Item = Handler<E>>) {
        self.not_found = handlers.into_iter().collect();
    }

    /// Override the 405 chain. [`AllowedMethods`] is in the store while it runs.
    pub fn register_405(&mut self, handlers: impl IntoIterator<Item = Handler<E>>) {
        self.method_not_allowed = handlers.into_iter().collect();
    }

    /// Append router-wide middleware for routes registered after this call.
    pub fn use_middleware(&mut self, middleware: Handler<E>) {
        self.middleware.push(middleware);
    }

    /// Register `handlers` for `method` on `pattern`.
    pub fn handle(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: impl IntoIterator<Item = Handler<E>>,
    ) -> Result<(), RouteError> {
        let chain: Vec<Handler<E>> = self.middleware.iter().cloned().chain(handlers).collect();
        self.insert(method, pattern, chain)
    }

    method_shorthands! {
        get => GET,
        head => HEAD,
        post => POST,
        put => PUT,
        patch => PATCH,
        delete => DELETE,
        options => OPTIONS,
        connect => CONNECT,
        trace => TRACE,
    }

    /// Start a group of routes sharing `prefix` and extra middleware.
    pub fn group(&mut self, prefix: &str) -> RouteGroup<'_, E> {
        RouteGroup::new(self, prefix)
    }

    pub(crate) fn router_middleware(&self) -> &[Handler<E>] {
        &self.middleware
    }

    /// Insert a fully built chain.
    pub(crate) fn insert(&mut self, method: Method, pattern: &str, chain: Vec<Handler<E>>) -> Result<(), RouteError> {
        let handlers = chain.len();
        self.tree.insert(method.clone(), pattern, Chain::from(chain))?;
        self.pool.set_params_capacity(self.tree.max_params());

        tracing::debug!(method = %method, pattern, handlers, "Route registered");
        Ok(())
    }

    /// Number of registered (method, pattern) pairs.
    pub fn route_count(&self) -> usize {
        self.tree.len()
    }

    pub fn pool(&self) -> &ContextPool<E> {
        &self.pool
    }

    /// Handle one request end to end and return its response.
    pub fn serve(&self, request: Request<Bytes>, cancellation: Cancellation) -> Response<Bytes> {
        let mut ctx = self.pool.acquire();
        ctx.request_start(request, cancellation);

        let route = self.dispatch(&mut ctx);
        if ctx.is_cancelled() && !ctx.response().is_committed() {
            ctx.text(StatusCode::SERVICE_UNAVAILABLE, "503 Service Unavailable");
        }

        let mut response = ctx.request_end();
        if let Some(pattern) = route {
            response.extensions_mut().insert(MatchedRoute(pattern));
        }
        response
    }

    fn dispatch(&self, ctx: &mut Context<E>) -> Option<Arc<str>> {
        let no_match = match ctx.lookup(&self.tree) {
            Lookup::Matched(route) => {
                let pattern = route.pattern().clone();
                tracing::trace!(method = %ctx.method(), route = %pattern, "Route matched");
                ctx.set_chain(route.value().clone(), Some(pattern.clone()));
                ctx.next();
                return Some(pattern);
            }
            Lookup::NoMatch(no_match) => no_match,
        };

        // A path that exists for other methods answers 405/404, never a redirect.
        if no_match.tsr
            && no_match.allowed.is_empty()
            && self.redirect_trailing_slash
            && *ctx.method() != Method::CONNECT
        {
            if let Some(path) = toggle_trailing_slash(ctx.path()) {
                let status = fallback::redirect_status(ctx.method());
                let location = fallback::redirect_location(&path, ctx.request().uri());
                tracing::debug!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    location = %location,
                    status = status.as_u16(),
                    "Trailing slash redirect"
                );
                match ctx.redirect(status, &location) {
                    Ok(()) => return None,
                    Err(err) => tracing::warn!(error = %err, "Redirect location rejected"),
                }
            }
        }

        if self.handle_method_not_allowed && !no_match.allowed.is_empty() {
            tracing::debug!(
                method = %ctx.method(),
                path = %ctx.path(),
                allowed = ?no_match.allowed,
                "Method not allowed"
            );
            ctx.set(AllowedMethods(no_match.allowed));
            ctx.set_chain(self.method_not_allowed.clone(), None);
        } else {
            tracing::debug!(method = %ctx.method(), path = %ctx.path(), "No route matched");
            ctx.set_chain(self.not_found.clone(), None);
        }
        ctx.next();
        None
    }
}
