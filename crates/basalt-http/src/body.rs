//! The response body type: buffered, streaming, or empty.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use http_body_util::Full;

use basalt_store::ByteStream;

/// Response body used throughout the service.
///
/// Buffered bodies carry XML/JSON payloads and error envelopes; streaming
/// bodies carry object data pulled chunk by chunk from the data path, so a
/// slow client throttles disk reads instead of buffering the object.
#[derive(Default)]
pub enum S3ResponseBody {
    /// Buffered body for small responses.
    Buffered(Full<Bytes>),
    /// Streaming body for object data.
    Streaming(ByteStream),
    /// Empty body (204s, HEAD responses).
    #[default]
    Empty,
}

impl std::fmt::Debug for S3ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered(_) => f.write_str("S3ResponseBody::Buffered"),
            Self::Streaming(_) => f.write_str("S3ResponseBody::Streaming"),
            Self::Empty => f.write_str("S3ResponseBody::Empty"),
        }
    }
}

impl S3ResponseBody {
    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create a streaming body from a chunk stream.
    #[must_use]
    pub fn streaming(stream: ByteStream) -> Self {
        Self::Streaming(stream)
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }
}

impl http_body::Body for S3ResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Streaming(stream) => match stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    Poll::Ready(Some(Ok(http_body::Frame::data(chunk))))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Streaming(_) => false,
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Streaming(_) => http_body::SizeHint::default(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}
