//! Route groups: a shared path prefix plus group-level middleware.

use axum::http::Method;

use crate::context::{ContextExt, Handler};
use crate::dispatch::router::{method_shorthands, Router};
use crate::error::RouteError;

/// Registers routes under a common prefix. The chain of every route is
/// router middleware, then the middleware of each enclosing group, then the
/// route's own handlers.
pub struct RouteGroup<'r, E: ContextExt> {
    router: &'r mut Router<E>,
    prefix: String,
    middleware: Vec<Handler<E>>,
}

impl<'r, E: ContextExt> RouteGroup<'r, E> {
    pub(crate) fn new(router: &'r mut Router<E>, prefix: &str) -> Self {
        Self {
            router,
            prefix: prefix.to_string(),
            middleware: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Append group middleware for routes registered after this call.
    pub fn use_middleware(&mut self, middleware: Handler<E>) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    pub fn handle(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: impl IntoIterator<Item = Handler<E>>,
    ) -> Result<(), RouteError> {
        let path = join_paths(&self.prefix, pattern);
        let chain: Vec<Handler<E>> = self
            .router
            .router_middleware()
            .iter()
            .chain(self.middleware.iter())
            .cloned()
            .chain(handlers)
            .collect();
        self.router.insert(method, &path, chain)
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

    /// Nested group; inherits this group's prefix and middleware.
    pub fn group(&mut self, prefix: &str) -> RouteGroup<'_, E> {
        RouteGroup {
            prefix: join_paths(&self.prefix, prefix),
            middleware: self.middleware.clone(),
            router: &mut *self.router,
        }
    }
}

fn join_paths(prefix: &str, path: &str) -> String {
    match (prefix.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", prefix, &path[1..]),
        (false, false) if !path.is_empty() => format!("{}/{}", prefix, path),
        _ => format!("{}{}", prefix, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{handler, Cancellation, Context};
    use axum::body::Bytes;
    use axum::http::{Request, StatusCode};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/api", "/users"), "/api/users");
        assert_eq!(join_paths("/api/", "/users"), "/api/users");
        assert_eq!(join_paths("/api", "users"), "/api/users");
        assert_eq!(join_paths("/api", ""), "/api");
        assert_eq!(join_paths("/api", "/"), "/api/");
    }

    #[test]
    fn test_group_chain_order() {
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();
        let step = |name: &'static str| {
            let log = log.clone();
            handler(move |ctx: &mut Context| {
                log.lock().unwrap().push(name);
                ctx.next();
            })
        };

        let mut router = Router::new();
        router.use_middleware(step("router"));
        {
            let mut api = router.group("/api");
            api.use_middleware(step("api"));
            let mut v1 = api.group("/v1");
            v1.use_middleware(step("v1"));
            v1.get("/ping", [step("handler")]).unwrap();
        }

        let request = Request::builder().uri("/api/v1/ping").body(Bytes::new()).unwrap();
        let response = router.serve(request, Cancellation::none());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), ["router", "api", "v1", "handler"]);
    }
}
