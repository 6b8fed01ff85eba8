//! Outgoing responses and the [`IntoResponse`] conversion trait.

use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use tracing::warn;

use crate::body::{self, BodyWriter, ResponseBody};

/// A `content-type` value for [`ResponseBuilder::bytes`] and
/// [`ResponseBuilder::stream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentType(&'static str);

impl ContentType {
    pub const JSON: Self = Self("application/json");
    pub const TEXT: Self = Self("text/plain; charset=utf-8");
    pub const HTML: Self = Self("text/html; charset=utf-8");
    pub const EVENT_STREAM: Self = Self("text/event-stream");
    pub const OCTET_STREAM: Self = Self("application/octet-stream");
    pub const PDF: Self = Self("application/pdf");
    pub const PNG: Self = Self("image/png");

    /// Any other media type. `value` must be a valid header value.
    pub const fn custom(value: &'static str) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// An outgoing HTTP response.
///
/// ```rust
/// use loupe::{ContentType, Response, StatusCode};
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder().bytes(ContentType::custom("application/xml"), b"<ok/>".to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    inner: http::Response<ResponseBody>,
}

impl Response {
    /// `200 OK` with an `application/json` body.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK` with a plain-text body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Empty response with status `code`.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { head: http::Response::new(()) }
    }

    pub fn status_code(&self) -> StatusCode { self.inner.status() }
    pub fn headers(&self) -> &HeaderMap { self.inner.headers() }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { self.inner.headers_mut() }

    /// Replaces the body with `f(body)`, keeping status and headers.
    pub fn map_body(self, f: impl FnOnce(ResponseBody) -> ResponseBody) -> Self {
        Self { inner: self.inner.map(f) }
    }

    /// The underlying [`http::Response`], as handed to the connection.
    pub fn into_inner(self) -> http::Response<ResponseBody> {
        self.inner
    }
}

/// Builder for [`Response`], finished by one of the body methods.
///
/// Starts as `200 OK` with no headers.
pub struct ResponseBuilder {
    head: http::Response<()>,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        *self.head.status_mut() = code;
        self
    }

    /// Appends a header. Names or values that are not valid HTTP are dropped
    /// with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.head.headers_mut().append(name, value);
            }
            _ => warn!(header = name, "dropping invalid response header"),
        }
        self
    }

    pub fn json(self, body: Vec<u8>) -> Response {
        self.bytes(ContentType::JSON, body)
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        let body: String = body.into();
        self.typed(ContentType::TEXT, body::full(body))
    }

    pub fn bytes(self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.typed(content_type, body::full(body))
    }

    /// Finishes with a body the handler writes incrementally.
    ///
    /// The response goes out as soon as it is returned. The body follows as
    /// the [`BodyWriter`] produces it and ends when the writer is dropped.
    ///
    /// ```rust
    /// use loupe::{ContentType, Request, Response};
    ///
    /// async fn numbers(_req: Request) -> Response {
    ///     let (response, mut writer) = Response::builder().stream(ContentType::TEXT);
    ///     tokio::spawn(async move {
    ///         for n in 0..3 {
    ///             if writer.write_line(&n.to_string()).await.is_err() {
    ///                 break;
    ///             }
    ///         }
    ///     });
    ///     response
    /// }
    /// ```
    pub fn stream(self, content_type: ContentType) -> (Response, BodyWriter) {
        let (writer, body) = body::channel();
        (self.typed(content_type, body.boxed_unsync()), writer)
    }

    /// Finishes with an empty body and no `content-type`.
    pub fn no_body(self) -> Response {
        Response { inner: self.head.map(|()| body::empty()) }
    }

    fn typed(mut self, content_type: ContentType, body: ResponseBody) -> Response {
        self.head
            .headers_mut()
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(content_type.as_str()));
        Response { inner: self.head.map(|()| body) }
    }
}

/// Conversion into an HTTP [`Response`], for handler return values.
///
/// ```rust,ignore
/// use loupe::{IntoResponse, Response, StatusCode};
/// use serde::Serialize;
///
/// struct Json<T: Serialize>(T);
///
/// impl<T: Serialize> IntoResponse for Json<T> {
///     fn into_response(self) -> Response {
///         match serde_json::to_vec(&self.0) {
///             Ok(bytes) => Response::json(bytes),
///             Err(_)    => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
///         }
///     }
/// }
/// ```
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

impl<R: IntoResponse> IntoResponse for (StatusCode, R) {
    fn into_response(self) -> Response {
        let (status, inner) = self;
        let mut response = inner.into_response();
        *response.inner.status_mut() = status;
        response
    }
}
