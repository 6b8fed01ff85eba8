//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri};
use http_body::Body;
use http_body_util::BodyExt;

use crate::body::{self, RequestBody};
use crate::error::{BoxError, Error};
use crate::middleware::RequestId;

/// An incoming HTTP request.
///
/// The body is read lazily with [`bytes`](Request::bytes). Like the socket it
/// comes from, it can be drained once.
pub struct Request {
    pub(crate) parts: http::request::Parts,
    pub(crate) body: RequestBody,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    /// Wraps an [`http::Request`] with any `Bytes` body.
    pub fn from_http<B>(req: http::Request<B>) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        Self {
            parts,
            body: body.map_err(Into::into).boxed_unsync(),
            params: HashMap::new(),
        }
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn extensions(&self) -> &Extensions { &self.parts.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.parts.extensions }

    /// Case-insensitive header lookup. Non-UTF-8 values read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Correlation id assigned by the request logger, when it is active.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.parts.extensions.get::<RequestId>()
    }

    /// Reads the whole body.
    ///
    /// The body is drained by this call: a second call returns empty bytes.
    /// Fails with [`Error::Body`] when the transport read fails.
    pub async fn bytes(&mut self) -> Result<Bytes, Error> {
        let body = std::mem::replace(&mut self.body, body::empty());
        let collected = body.collect().await.map_err(Error::Body)?;
        Ok(collected.to_bytes())
    }

    /// Puts `bytes` back as the body, to be read again downstream.
    pub(crate) fn replace_body(&mut self, bytes: Bytes) {
        self.body = body::full(bytes);
    }
}
