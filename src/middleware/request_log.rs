//! Request/response logging middleware.
//!
//! For every request that passes the gate, [`RequestLog`]:
//!
//! 1. assigns a [`RequestId`], stores it in the request extensions, runs the
//!    rest of the pipeline inside a `request` span carrying it, and returns it
//!    to the client as `X-Request-ID`;
//! 2. captures the request body and logs method, path, headers and body;
//! 3. runs the handler, then tees the response body to a capture;
//! 4. logs status, body and elapsed time once the response body is done.
//!
//! Step 4 lives in a drop guard. It runs when the body finishes streaming,
//! when the client goes away mid-body, when downstream returns an error, and
//! when downstream panics. Downstream errors and panics still propagate.
//!
//! Requests whose content type is binary or multipart, and every request when
//! logging is disabled, skip all of the above and go straight to the handler.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use http::header::{HeaderName, HeaderValue};
use http_body_util::BodyExt;
use tracing::{Instrument, Span, error, info_span, trace, warn};

use super::capture::{Capture, CaptureBuffer, CaptureError, CapturedRequest, TeeBody};
use super::record::{LogError, LogRecord, LogSink, LoggedBody, RequestRecord, ResponseRecord, TracingSink};
use super::{Middleware, Next};
use crate::config::LogConfig;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Response header carrying the request id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Request content types that are never captured or logged. Prefix match,
/// ASCII case-insensitive, so parameters such as `; boundary=…` still match.
pub const SKIPPED_CONTENT_TYPES: [&str; 6] = [
    "application/pdf",
    "application/octet-stream",
    "image/png",
    "image/jpeg",
    "image/jpg",
    "multipart/form-data",
];

const REQUEST_ID_LEN: usize = 15;

// ── RequestId ─────────────────────────────────────────────────────────────────

/// Per-request correlation id: 15 lowercase hex characters.
///
/// Available to handlers through [`Request::request_id`] and attached to every
/// event emitted inside the request's span.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// A fresh id from a random (v4) UUID.
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(REQUEST_ID_LEN);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── RequestLog ────────────────────────────────────────────────────────────────

/// Logs every request and response passing through the router.
///
/// ```rust,no_run
/// use loupe::middleware::RequestLog;
/// use loupe::{Method, Request, Router, Server};
///
/// # async fn hello(_req: Request) -> &'static str { "hi" }
/// #[tokio::main]
/// async fn main() -> Result<(), loupe::Error> {
///     let app = Router::new()
///         .on(Method::POST, "/hello", hello)
///         .layer(RequestLog::from_env()?);
///     Server::bind("0.0.0.0:3000").serve(app).await
/// }
/// ```
pub struct RequestLog {
    config: LogConfig,
    sink: Arc<dyn LogSink>,
}

impl RequestLog {
    /// Logs through [`TracingSink`].
    pub fn new(config: LogConfig) -> Self {
        Self::with_sink(config, TracingSink)
    }

    /// Logs through `sink`.
    pub fn with_sink(config: LogConfig, sink: impl LogSink) -> Self {
        Self { config, sink: Arc::new(sink) }
    }

    /// [`LogConfig::from_env`] with [`TracingSink`].
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self::new(LogConfig::from_env()?))
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    fn should_log(&self, req: &Request) -> bool {
        if !self.config.enabled {
            trace!("request logging disabled");
            return false;
        }
        match req.header("content-type") {
            Some(content_type) if is_skipped(content_type) => {
                trace!(content_type, "skipping request logging for content type");
                false
            }
            _ => true,
        }
    }
}

fn is_skipped(content_type: &str) -> bool {
    SKIPPED_CONTENT_TYPES.iter().any(|prefix| {
        content_type
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

impl Middleware for RequestLog {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture<Result<Response, Error>> {
        if !self.should_log(&req) {
            return next.run(req);
        }

        let request_id = RequestId::generate();
        let span = info_span!("request", request_id = %request_id);
        let sink = Arc::clone(&self.sink);
        let max_body_length = self.config.max_body_length;

        let fut = async move {
            let captured = CapturedRequest::wrap(&mut req).await?;
            req.extensions_mut().insert(request_id.clone());
            log_request(sink.as_ref(), &request_id, &captured, max_body_length);

            let mut pending = PendingResponse {
                request_id: request_id.clone(),
                sink,
                max_body_length,
                span: Span::current(),
                started: Instant::now(),
                status: None,
                body: CaptureBuffer::default(),
            };
            let mut response = next.run(req).await?;
            pending.status = Some(response.status_code());

            if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Ok(response.map_body(|body| TeeBody::new(body, pending).boxed_unsync()))
        };
        Box::pin(fut.instrument(span))
    }
}

fn log_request(sink: &dyn LogSink, request_id: &RequestId, captured: &CapturedRequest, max_body_length: usize) {
    guarded(|| {
        let body = LoggedBody::from_bytes(captured.body(), max_body_length).unwrap_or_else(|e| {
            warn!("request body is not loggable JSON: {e}");
            None
        });
        let record = LogRecord::Request(RequestRecord {
            method: captured.method().to_string(),
            uri: captured.uri().path().to_owned(),
            headers: captured.headers().clone(),
            body,
        });
        sink.emit(request_id, &record)
    }, "request");
}

/// Runs `emit`, reporting any error or panic instead of propagating it.
fn guarded(emit: impl FnOnce() -> Result<(), LogError>, direction: &str) {
    let result = panic::catch_unwind(AssertUnwindSafe(emit)).unwrap_or(Err(LogError::Panicked));
    if let Err(e) = result {
        error!("failed to log {direction}: {e}");
    }
}

// ── Response side ─────────────────────────────────────────────────────────────

/// Response-in-progress for one request. Logs the response when dropped.
struct PendingResponse {
    request_id: RequestId,
    sink: Arc<dyn LogSink>,
    max_body_length: usize,
    span: Span,
    started: Instant,
    status: Option<StatusCode>,
    body: CaptureBuffer,
}

impl Capture for PendingResponse {
    fn append(&mut self, chunk: &[u8]) -> Result<(), CaptureError> {
        self.body.append(chunk)
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let _entered = self.span.enter();
        guarded(|| {
            let body = LoggedBody::from_bytes(self.body.as_bytes(), self.max_body_length)
                .unwrap_or_else(|e| {
                    warn!("response body is not loggable JSON: {e}");
                    None
                });
            let record = LogRecord::Response(ResponseRecord {
                status: self.status.map(|s| s.as_u16()),
                body,
                elapsed,
            });
            self.sink.emit(&self.request_id, &record)
        }, "response");
    }
}
