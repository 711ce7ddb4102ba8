//! Response lowering: the error envelope and the core-to-wire conversion.

use http::header::HeaderValue;
use tracing::error;

use basalt_core::{ResponseBody, S3Response};
use basalt_model::S3Error;
use basalt_xml::error_to_xml;

use crate::body::S3ResponseBody;

/// Render an [`S3Error`] as the XML error envelope, including any extra
/// headers the error carries (e.g. `Content-Range` on a 416).
#[must_use]
pub fn error_to_response(err: &S3Error, request_id: &str) -> http::Response<S3ResponseBody> {
    let body = error_to_xml(
        err.code.as_str(),
        &err.message,
        err.resource.as_deref(),
        request_id,
    );

    let mut builder = http::Response::builder()
        .status(err.status_code)
        .header("Content-Type", "application/xml");
    for (name, value) in &err.headers {
        if let Ok(value) = HeaderValue::from_str(value) {
            builder = builder.header(name.as_str(), value);
        }
    }

    builder
        .body(S3ResponseBody::from_bytes(body))
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to build error response");
            let mut fallback = http::Response::new(S3ResponseBody::empty());
            *fallback.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

/// Lower a core [`S3Response`] into the wire response.
#[must_use]
pub fn lower_response(response: S3Response) -> http::Response<S3ResponseBody> {
    let mut builder = http::Response::builder().status(response.status);
    for (name, value) in &response.headers {
        if let Ok(value) = HeaderValue::from_str(value) {
            builder = builder.header(name.as_str(), value);
        }
    }

    let body = match response.body {
        ResponseBody::Empty => S3ResponseBody::empty(),
        ResponseBody::Bytes(data) => S3ResponseBody::from_bytes(data),
        ResponseBody::Stream { stream, .. } => S3ResponseBody::streaming(stream),
    };

    builder.body(body).unwrap_or_else(|e| {
        error!(error = %e, "failed to build response");
        let mut fallback = http::Response::new(S3ResponseBody::empty());
        *fallback.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}
