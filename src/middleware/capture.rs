//! Body capture for request/response logging.
//!
//! # Request side
//!
//! A request body arrives as a stream that can be drained once. To log it and
//! still hand it to the handler, [`CapturedRequest::wrap`] reads it fully into
//! memory, keeps the bytes, and puts an identical replay back on the request.
//! The handler reads the same bytes it would have read from the socket.
//!
//! # Response side
//!
//! A response body must not be held back while it is inspected. [`TeeBody`]
//! forwards every frame to the connection as it is produced and appends a copy
//! of its data to a [`Capture`]:
//!
//! ```text
//! handler ── frame ──▶ TeeBody ── frame ──▶ client
//!                         │
//!                         └── copy ──▶ Capture (append-only)
//! ```
//!
//! Failing to grow the capture never affects the frame sent to the client.

use std::collections::TryReserveError;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use bytes::buf::{Buf, Reader};
use http::{HeaderMap, Method, Uri};
use http_body::{Body, Frame, SizeHint};
use serde::ser::{Serialize, Serializer};
use tracing::warn;

use super::redact;
use crate::error::Error;
use crate::request::Request;

// ── Request side ──────────────────────────────────────────────────────────────

/// Snapshot of a request taken before it reaches the handler.
pub struct CapturedRequest {
    method: Method,
    uri: Uri,
    headers: HeaderList,
    body: Bytes,
}

impl CapturedRequest {
    /// Reads the body of `req` once and leaves an identical replay in its place.
    ///
    /// Fails with [`Error::Body`] when the transport read fails; that is the
    /// same error the handler would have seen reading the body itself.
    pub async fn wrap(req: &mut Request) -> Result<Self, Error> {
        let body = req.bytes().await?;
        req.replace_body(body.clone());
        Ok(Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: HeaderList::from_headers(req.headers()),
            body,
        })
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn headers(&self) -> &HeaderList { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// A fresh reader over the captured body, independent of every other reader.
    pub fn reader(&self) -> Reader<Bytes> {
        self.body.clone().reader()
    }
}

/// Request headers as they appear in a log line.
///
/// One entry per distinct header name, in arrival order, holding the first
/// value. Names are lowercase; credential-bearing values are masked.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let entries = headers
            .keys()
            .filter_map(|name| {
                let value = headers.get(name)?;
                let value = String::from_utf8_lossy(value.as_bytes());
                let value = redact::header_value(name.as_str(), &value).to_owned();
                Some((name.as_str().to_owned(), value))
            })
            .collect();
        Self(entries)
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl Serialize for HeaderList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

// ── Response side ─────────────────────────────────────────────────────────────

/// Append-only destination for a copy of the response body.
pub trait Capture {
    fn append(&mut self, chunk: &[u8]) -> Result<(), CaptureError>;
}

/// Growing the capture buffer failed.
#[derive(Debug)]
pub struct CaptureError(TryReserveError);

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture buffer: {}", self.0)
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// In-memory [`Capture`].
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    bytes: Vec<u8>,
}

impl CaptureBuffer {
    /// Everything appended so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Capture for CaptureBuffer {
    fn append(&mut self, chunk: &[u8]) -> Result<(), CaptureError> {
        self.bytes.try_reserve(chunk.len()).map_err(CaptureError)?;
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }
}

/// A body that copies its data frames into a [`Capture`] as they pass.
///
/// Frames, trailers, errors, end-of-stream and size hints are forwarded
/// untouched, so the connection cannot tell a `TeeBody` from its inner body.
/// Dropping the `TeeBody` drops the capture, whether or not the body finished.
pub struct TeeBody<B, C> {
    inner: B,
    capture: C,
    capture_failed: bool,
}

impl<B, C> TeeBody<B, C> {
    pub fn new(inner: B, capture: C) -> Self {
        Self { inner, capture, capture_failed: false }
    }

    /// The capture, holding every data byte forwarded so far.
    pub fn capture(&self) -> &C {
        &self.capture
    }
}

impl<B, C> Body for TeeBody<B, C>
where
    B: Body<Data = Bytes> + Unpin,
    C: Capture + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, B::Error>>> {
        let this = self.get_mut();
        let frame = ready!(Pin::new(&mut this.inner).poll_frame(cx));
        if let Some(Ok(frame)) = &frame {
            if let Some(data) = frame.data_ref() {
                this.copy(data);
            }
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B, C: Capture> TeeBody<B, C> {
    fn copy(&mut self, data: &Bytes) {
        // The capture stays a prefix of the body: nothing is appended after a failure.
        if self.capture_failed {
            return;
        }
        if let Err(e) = self.capture.append(data.chunk()) {
            self.capture_failed = true;
            warn!("response body capture stopped: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Read;

    use http_body_util::{BodyExt, Full};

    use crate::error::BoxError;

    fn request(body: &'static [u8]) -> Request {
        let req = http::Request::post("/login")
            .header("content-type", "application/json")
            .header("x-trace", "one")
            .header("x-trace", "two")
            .header("authorization", "Bearer abc")
            .body(Full::new(Bytes::from_static(body)))
            .unwrap();
        Request::from_http(req)
    }

    /// Yields the given chunks one frame at a time.
    struct Chunks(VecDeque<Bytes>);

    impl Body for Chunks {
        type Data = Bytes;
        type Error = BoxError;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
            Poll::Ready(self.0.pop_front().map(|chunk| Ok(Frame::data(chunk))))
        }
    }

    /// Refuses every append.
    struct Refusing;

    impl Capture for Refusing {
        fn append(&mut self, _chunk: &[u8]) -> Result<(), CaptureError> {
            let err = Vec::<u8>::new().try_reserve(usize::MAX).unwrap_err();
            Err(CaptureError(err))
        }
    }

    #[tokio::test]
    async fn request_body_replays_identically() {
        let body = b"{\"user\":\"alice\",\"bin\":\"\x00\xff\"}";
        let mut req = request(body);
        let captured = CapturedRequest::wrap(&mut req).await.unwrap();

        assert_eq!(&captured.body()[..], body);
        for _ in 0..2 {
            let mut read = Vec::new();
            captured.reader().read_to_end(&mut read).unwrap();
            assert_eq!(read, body);
        }
        assert_eq!(&req.bytes().await.unwrap()[..], body);
    }

    #[tokio::test]
    async fn request_head_is_captured() {
        let mut req = request(b"");
        let captured = CapturedRequest::wrap(&mut req).await.unwrap();

        assert_eq!(*captured.method(), Method::POST);
        assert_eq!(captured.uri().path(), "/login");
        assert!(captured.body().is_empty());

        let headers = captured.headers();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("X-Trace"), Some("one"));
        assert_eq!(headers.get("authorization"), Some(redact::MASK));
        let names: Vec<_> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["content-type", "x-trace", "authorization"]);
    }

    #[test]
    fn header_list_serializes_as_ordered_map() {
        let mut headers = HeaderMap::new();
        headers.insert("zeta", "1".parse().unwrap());
        headers.insert("alpha", "2".parse().unwrap());
        let json = serde_json::to_string(&HeaderList::from_headers(&headers)).unwrap();
        assert_eq!(json, r#"{"zeta":"1","alpha":"2"}"#);
    }

    #[tokio::test]
    async fn tee_forwards_and_captures_every_byte_in_order() {
        let chunks = [&b"first,"[..], b"", b"\x00\x01binary,", b"last"];
        let inner = Chunks(chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect());
        let mut tee = TeeBody::new(inner, CaptureBuffer::default());

        let mut received = Vec::new();
        while let Some(frame) = tee.frame().await {
            received.extend_from_slice(&frame.unwrap().into_data().unwrap());
        }

        let expected: Vec<u8> = chunks.concat();
        assert_eq!(received, expected);
        assert_eq!(tee.capture().as_bytes(), expected);
    }

    #[tokio::test]
    async fn tee_preserves_size_hint() {
        let tee = TeeBody::new(Full::new(Bytes::from_static(b"12345")), CaptureBuffer::default());
        assert_eq!(tee.size_hint().exact(), Some(5));
        assert!(!tee.is_end_stream());
    }

    #[tokio::test]
    async fn failed_capture_does_not_block_the_client() {
        let inner = Chunks(VecDeque::from([Bytes::from("a"), Bytes::from("b")]));
        let tee = TeeBody::new(inner, Refusing);
        let received = tee.collect().await.unwrap().to_bytes();
        assert_eq!(received, "ab");
    }
}
