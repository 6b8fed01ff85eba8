//! Body types shared by requests and responses.
//!
//! Both directions use a boxed [`http_body::Body`] with [`Bytes`] frames so that
//! a middleware can swap a body for a wrapped one without changing the type a
//! handler sees. Bodies are `Send` but not `Sync`; a request is owned by one
//! task at a time.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use http_body::{Body, Frame};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use tokio::sync::mpsc;

use crate::error::BoxError;

/// Body of an incoming [`Request`](crate::Request).
pub type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// Body of an outgoing [`Response`](crate::Response).
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Frames buffered between a [`BodyWriter`] and the connection.
const CHANNEL_CAPACITY: usize = 16;

pub(crate) fn empty() -> UnsyncBoxBody<Bytes, BoxError> {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync()
}

pub(crate) fn full(bytes: impl Into<Bytes>) -> UnsyncBoxBody<Bytes, BoxError> {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed_unsync()
}

/// Creates a streaming body and the writer that feeds it.
pub(crate) fn channel() -> (BodyWriter, ChannelBody) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (BodyWriter { tx }, ChannelBody { rx })
}

// ── ChannelBody ───────────────────────────────────────────────────────────────

/// Response body fed chunk by chunk from a [`BodyWriter`].
///
/// Ends when every writer is dropped.
pub struct ChannelBody {
    rx: mpsc::Receiver<Result<Bytes, BoxError>>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        match ready!(self.rx.poll_recv(cx)) {
            Some(Ok(chunk)) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
            Some(Err(e)) => Poll::Ready(Some(Err(e))),
            None => Poll::Ready(None),
        }
    }
}

// ── BodyWriter ────────────────────────────────────────────────────────────────

/// Writes a response body incrementally.
///
/// Obtained from [`ResponseBuilder::stream`](crate::ResponseBuilder::stream).
/// Every chunk goes straight to the connection; nothing is held back until the
/// handler finishes. [`write_line`](BodyWriter::write_line) is a convenience on
/// top of [`write`](BodyWriter::write), so both paths produce the same frames.
pub struct BodyWriter {
    tx: mpsc::Sender<Result<Bytes, BoxError>>,
}

impl BodyWriter {
    /// Sends `chunk` to the client.
    ///
    /// Fails with [`io::ErrorKind::BrokenPipe`] once the client is gone.
    pub async fn write(&mut self, chunk: impl Into<Bytes>) -> io::Result<()> {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response body closed"))
    }

    /// Sends `line` followed by `\n`.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        self.write(buf).await
    }

    /// Aborts the body with `err`. The connection sees a body error, exactly as
    /// if the handler had failed mid-write.
    pub async fn fail(self, err: impl Into<BoxError>) {
        // The client may already be gone; nothing left to report to.
        let _ = self.tx.send(Err(err.into())).await;
    }
}
