//! The transport-free request and response shapes the handlers work with.
//!
//! The HTTP layer lowers a hyper request into a [`RequestContext`] plus a
//! [`RequestBody`] and raises the returned [`S3Response`] back into a wire
//! response. Handlers never see hyper types; errors travel as
//! [`S3Error`](basalt_model::S3Error) and middleware (authenticator, audit
//! logger, error envelope) transforms this sum type, not exceptions.

use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, StatusCode};

use basalt_model::types::Principal;
use basalt_model::{S3Error, s3_error};
use basalt_store::{ByteStream, bytes_stream};

/// Upper bound for buffered request bodies (XML documents, policies).
/// Object data never goes through this path.
const MAX_BUFFERED_BODY: usize = 8 * 1024 * 1024;

/// Everything known about a request before its handler runs.
#[derive(Debug)]
pub struct RequestContext {
    /// The request id echoed in responses and audit events.
    pub request_id: String,
    /// The authenticated principal.
    pub principal: Principal,
    /// The target bucket, if the path names one.
    pub bucket: Option<String>,
    /// The target key, if the path names one.
    pub key: Option<String>,
    /// Decoded query parameters in order of appearance.
    pub query: Vec<(String, String)>,
    /// The request headers.
    pub headers: HeaderMap,
    /// The peer address, when known.
    pub source_ip: Option<String>,
}

impl RequestContext {
    /// The bucket name; `InvalidRequest` if the operation reached a handler
    /// without one (a routing bug).
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when no bucket is present.
    pub fn bucket(&self) -> Result<&str, S3Error> {
        self.bucket
            .as_deref()
            .ok_or_else(|| s3_error!(InvalidRequest, "missing bucket in request path"))
    }

    /// The object key; `InvalidRequest` if absent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when no key is present.
    pub fn key(&self) -> Result<&str, S3Error> {
        self.key
            .as_deref()
            .ok_or_else(|| s3_error!(InvalidRequest, "missing object key in request path"))
    }

    /// First value of a query parameter.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a query parameter is present (with or without a value).
    #[must_use]
    pub fn has_query(&self, name: &str) -> bool {
        self.query.iter().any(|(k, _)| k == name)
    }

    /// A header value as UTF-8, if present and decodable.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The declared `Content-Length`, if parseable.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }
}

/// The request body as the handlers see it.
pub enum RequestBody {
    /// A pull-based chunk stream; the data path consumes it directly.
    Stream(ByteStream),
    /// No body.
    Empty,
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("RequestBody::Stream(..)"),
            Self::Empty => f.write_str("RequestBody::Empty"),
        }
    }
}

impl RequestBody {
    /// Turn the body into a chunk stream (empty bodies yield an empty
    /// stream).
    #[must_use]
    pub fn into_stream(self) -> ByteStream {
        match self {
            Self::Stream(stream) => stream,
            Self::Empty => bytes_stream(Bytes::new()),
        }
    }

    /// Buffer the whole body, for XML and JSON request documents.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when the body exceeds the buffering cap;
    /// `InternalError` when the underlying stream fails.
    pub async fn collect(self) -> Result<Bytes, S3Error> {
        let mut stream = self.into_stream();
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| S3Error::internal("failed to read request body").with_source(e))?;
            if buf.len() + chunk.len() > MAX_BUFFERED_BODY {
                return Err(s3_error!(InvalidRequest, "request body too large"));
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buf))
    }
}

/// The response body of a handler.
pub enum ResponseBody {
    /// No body.
    Empty,
    /// A buffered body (XML, JSON, small payloads).
    Bytes(Bytes),
    /// A streamed body of known length (object data).
    Stream {
        /// Exact number of bytes the stream yields.
        len: u64,
        /// The chunk stream.
        stream: ByteStream,
    },
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("ResponseBody::Empty"),
            Self::Bytes(data) => write!(f, "ResponseBody::Bytes({} bytes)", data.len()),
            Self::Stream { len, .. } => write!(f, "ResponseBody::Stream({len} bytes)"),
        }
    }
}

/// The service-level response: status, headers, body. The HTTP layer turns
/// this into the wire response verbatim.
#[derive(Debug)]
pub struct S3Response {
    /// The HTTP status.
    pub status: StatusCode,
    /// Response headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// The response body.
    pub body: ResponseBody,
}

impl S3Response {
    /// A `200 OK` with no body.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: ResponseBody::Empty,
        }
    }

    /// A `204 No Content`.
    #[must_use]
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            headers: Vec::new(),
            body: ResponseBody::Empty,
        }
    }

    /// A `200 OK` carrying an XML document.
    #[must_use]
    pub fn xml(document: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![("Content-Type".to_owned(), "application/xml".to_owned())],
            body: ResponseBody::Bytes(Bytes::from(document)),
        }
    }

    /// A `200 OK` carrying a JSON document.
    #[must_use]
    pub fn json(document: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![("Content-Type".to_owned(), "application/json".to_owned())],
            body: ResponseBody::Bytes(document.into()),
        }
    }

    /// Replace the status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Append a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append a header only when a value is present.
    #[must_use]
    pub fn optional_header(
        mut self,
        name: impl Into<String>,
        value: Option<impl Into<String>>,
    ) -> Self {
        if let Some(value) = value {
            self.headers.push((name.into(), value.into()));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RequestContext {
        RequestContext {
            request_id: "r1".to_owned(),
            principal: Principal::Anonymous,
            bucket: Some("b1".to_owned()),
            key: None,
            query: vec![
                ("prefix".to_owned(), "logs/".to_owned()),
                ("versioning".to_owned(), String::new()),
            ],
            headers: HeaderMap::new(),
            source_ip: None,
        }
    }

    #[test]
    fn test_should_expose_query_parameters() {
        let ctx = context();
        assert_eq!(ctx.query_value("prefix"), Some("logs/"));
        assert!(ctx.has_query("versioning"));
        assert!(!ctx.has_query("acl"));
        assert_eq!(ctx.query_value("missing"), None);
    }

    #[test]
    fn test_should_require_bucket_and_key() {
        let ctx = context();
        assert_eq!(ctx.bucket().expect("bucket"), "b1");
        assert!(ctx.key().is_err());
    }

    #[tokio::test]
    async fn test_should_collect_streamed_body() {
        let body = RequestBody::Stream(bytes_stream(&b"hello"[..]));
        let data = body.collect().await.expect("collect");
        assert_eq!(data.as_ref(), b"hello");

        let empty = RequestBody::Empty.collect().await.expect("collect");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_should_build_responses() {
        let response = S3Response::ok()
            .header("ETag", "\"abc\"")
            .optional_header("x-amz-version-id", None::<String>)
            .optional_header("x-amz-delete-marker", Some("true"));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers.len(), 2);

        let xml = S3Response::xml(b"<R/>".to_vec());
        assert!(
            xml.headers
                .iter()
                .any(|(k, v)| k == "Content-Type" && v == "application/xml")
        );
    }
}
