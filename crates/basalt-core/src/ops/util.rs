//! Helpers shared by the operation handlers.

use std::collections::HashMap;

use basalt_model::S3Error;
use basalt_model::types::{
    AccessControlPolicy, CannedAcl, NULL_VERSION_ID, ObjectMetadata, ObjectVersion, Owner,
};
use basalt_xml::serialize::format_timestamp;

use crate::request::{RequestContext, S3Response};

/// Extract object metadata from request headers: standard content headers
/// plus `x-amz-meta-*` entries (names lowercased, prefix stripped).
pub(crate) fn extract_metadata(headers: &http::HeaderMap) -> ObjectMetadata {
    let mut user_metadata = HashMap::new();
    for (name, value) in headers {
        let name = name.as_str();
        if let Some(meta_key) = name.strip_prefix("x-amz-meta-") {
            if let Ok(value) = value.to_str() {
                user_metadata.insert(meta_key.to_ascii_lowercase(), value.to_owned());
            }
        }
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };

    ObjectMetadata {
        content_type: header("content-type"),
        content_encoding: header("content-encoding"),
        cache_control: header("cache-control"),
        content_disposition: header("content-disposition"),
        user_metadata,
    }
}

/// Parse the `x-amz-acl` header into an explicit ACL for the given owner.
///
/// # Errors
///
/// `InvalidArgument` for unknown canned ACL names.
pub(crate) fn acl_from_headers(
    ctx: &RequestContext,
    owner: Owner,
) -> Result<Option<AccessControlPolicy>, S3Error> {
    match ctx.header("x-amz-acl") {
        None => Ok(None),
        Some(value) => {
            let canned: CannedAcl = value
                .parse()
                .map_err(|_| S3Error::invalid_argument(format!("unknown canned ACL: {value}")))?;
            Ok(Some(AccessControlPolicy::canned(owner, canned)))
        }
    }
}

/// The `x-amz-version-id` header value for a version: absent for the
/// reserved `"null"` id.
pub(crate) fn version_id_header(version_id: &str) -> Option<String> {
    if version_id == NULL_VERSION_ID {
        None
    } else {
        Some(version_id.to_owned())
    }
}

/// Apply the standard object headers (`ETag`, `Last-Modified`,
/// `Content-Type`, user metadata, version id) shared by GET and HEAD.
pub(crate) fn apply_object_headers(
    mut response: S3Response,
    version: &ObjectVersion,
) -> S3Response {
    response = response
        .header("ETag", version.etag.clone())
        .header("Last-Modified", format_timestamp(&version.last_modified))
        .header(
            "Content-Type",
            version
                .metadata
                .content_type
                .clone()
                .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string()),
        )
        .header("Accept-Ranges", "bytes")
        .optional_header("x-amz-version-id", version_id_header(&version.version_id))
        .optional_header("Content-Encoding", version.metadata.content_encoding.clone())
        .optional_header("Cache-Control", version.metadata.cache_control.clone())
        .optional_header(
            "Content-Disposition",
            version.metadata.content_disposition.clone(),
        )
        .optional_header(
            "x-amz-mp-parts-count",
            version.parts_count.map(|n| n.to_string()),
        );
    for (key, value) in &version.metadata.user_metadata {
        response = response.header(format!("x-amz-meta-{key}"), value.clone());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_extract_user_metadata_lowercased() {
        let mut headers = http::HeaderMap::new();
        headers.insert("content-type", "text/plain".parse().expect("value"));
        headers.insert("x-amz-meta-Author", "alice".parse().expect("value"));
        headers.insert("x-amz-meta-rev", "42".parse().expect("value"));

        let metadata = extract_metadata(&headers);
        assert_eq!(metadata.content_type.as_deref(), Some("text/plain"));
        // Header names arrive lowercased from the HTTP layer.
        assert_eq!(metadata.user_metadata.get("author").map(String::as_str), Some("alice"));
        assert_eq!(metadata.user_metadata.get("rev").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_should_omit_version_header_for_null_version() {
        assert_eq!(version_id_header("null"), None);
        assert_eq!(version_id_header("v1"), Some("v1".to_owned()));
    }
}
