//! Middleware: stages wrapped around every route.
//!
//! A middleware gets the request and a [`Next`] handle to the rest of the
//! pipeline. It may change the request, call `next.run(req)` or answer on its
//! own, and change the response on the way out.
//!
//! [`RequestLog`] is the built-in one.

mod capture;
mod record;
mod redact;
mod request_log;

use std::sync::Arc;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

pub use capture::{Capture, CaptureBuffer, CaptureError, CapturedRequest, HeaderList, TeeBody};
pub use record::{LogError, LogRecord, LogSink, LoggedBody, RequestRecord, ResponseRecord, TracingSink};
pub use redact::{MASK, SENSITIVE_FIELDS, TRUNCATION_MARKER, redact, truncate};
pub use request_log::{REQUEST_ID_HEADER, RequestId, RequestLog, SKIPPED_CONTENT_TYPES};

/// A pipeline stage wrapped around every route.
///
/// ```rust
/// use loupe::middleware::{Middleware, Next};
/// use loupe::{BoxFuture, Error, Request, Response};
///
/// struct PoweredBy(&'static str);
///
/// impl Middleware for PoweredBy {
///     fn call(&self, req: Request, next: Next) -> BoxFuture<Result<Response, Error>> {
///         let name = self.0;
///         Box::pin(async move {
///             let mut response = next.run(req).await?;
///             response.headers_mut().insert("x-powered-by", name.parse().unwrap());
///             Ok(response)
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture<Result<Response, Error>>;
}

/// The remainder of the pipeline after the current middleware.
pub struct Next {
    router: Arc<Router>,
    index: usize,
}

impl Next {
    pub(crate) fn new(router: Arc<Router>) -> Self {
        Self { router, index: 0 }
    }

    /// Runs the next middleware, or the route handler when none are left.
    pub fn run(self, req: Request) -> BoxFuture<Result<Response, Error>> {
        match self.router.middleware.get(self.index).cloned() {
            Some(middleware) => {
                let next = Self { router: self.router, index: self.index + 1 };
                middleware.call(req, next)
            }
            None => {
                let fut = self.router.route(req);
                Box::pin(async move { Ok(fut.await) })
            }
        }
    }
}
