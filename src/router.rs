//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Middleware registered with
//! [`Router::layer`] wraps every route; there is no per-route middleware.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Routes plus the middleware wrapped around all of them.
///
/// Built once at startup and handed to [`Server::serve`](crate::Server::serve),
/// or wrapped in an `Arc` and driven directly with [`Router::dispatch`].
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), middleware: Vec::new() }
    }

    /// Adds a route. `{name}` segments are path parameters, read back with
    /// [`Request::param`]:
    ///
    /// ```rust,no_run
    /// # use loupe::{Method, Request, Router};
    /// # async fn show(_: Request) -> &'static str { "" }
    /// # async fn create(_: Request) -> &'static str { "" }
    /// Router::new()
    ///     .on(Method::GET,  "/orders/{id}", show)
    ///     .on(Method::POST, "/orders",      create);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is malformed or overlaps a route already registered
    /// for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Wrap every route in `middleware`.
    ///
    /// The first layer registered is the outermost: it sees the request first
    /// and the response last.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Runs `req` through the middleware chain and the matching route.
    ///
    /// Unmatched paths produce `404 Not Found`. Errors come only from
    /// middleware; route handlers always produce a response.
    pub fn dispatch(self: Arc<Self>, req: Request) -> BoxFuture<Result<Response, Error>> {
        Next::new(self).run(req)
    }

    /// Routes `req` to its handler, bypassing middleware.
    pub(crate) fn route(&self, mut req: Request) -> BoxFuture<Response> {
        match self.lookup(req.method(), req.path()) {
            Some((handler, params)) => {
                req.params = params;
                handler(req)
            }
            None => Box::pin(async { Response::status(StatusCode::NOT_FOUND) }),
        }
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched
            .params
            .iter()
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
