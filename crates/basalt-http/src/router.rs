//! Request routing: path parsing and the operation dispatch table.
//!
//! Requests are path-style (`/<bucket>[/<key>]`, keys may contain `/`).
//! The operation is selected from a precomputed table keyed by
//! `(method, has_key, first-present sub-resource)`, where the sub-resource
//! priority order is fixed and explicit — the first name from the priority
//! list that appears in the query string determines the row, regardless of
//! parameter order on the wire. Combinations without a table entry fall
//! back to the method's default operation, so an irrelevant sub-resource
//! on the wrong resource level degrades gracefully instead of surprising
//! the client.

use std::collections::HashMap;
use std::sync::LazyLock;

use http::Method;
use percent_encoding::percent_decode_str;

use basalt_model::error::{S3Error, S3ErrorCode};
use basalt_model::operations::S3Operation;

/// The result of routing an HTTP request.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    /// The resolved bucket name, if any.
    pub bucket: Option<String>,
    /// The resolved object key, if any.
    pub key: Option<String>,
    /// The identified operation.
    pub operation: S3Operation,
    /// Decoded query parameters in order of appearance.
    pub query_params: Vec<(String, String)>,
}

/// Sub-resources that participate in dispatch, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SubResource {
    Policy,
    Acl,
    Versioning,
    Tagging,
    Lifecycle,
    Notification,
    Vpc,
    ObjectLock,
    Replication,
    Encryption,
    Versions,
    Uploads,
    UploadId,
    Delete,
    Select,
    PartNumber,
}

/// The declared priority order: the first present name wins.
const SUB_RESOURCE_PRIORITY: &[(&str, SubResource)] = &[
    ("policy", SubResource::Policy),
    ("acl", SubResource::Acl),
    ("versioning", SubResource::Versioning),
    ("tagging", SubResource::Tagging),
    ("lifecycle", SubResource::Lifecycle),
    ("notification", SubResource::Notification),
    ("vpc", SubResource::Vpc),
    ("object-lock", SubResource::ObjectLock),
    ("replication", SubResource::Replication),
    ("encryption", SubResource::Encryption),
    ("versions", SubResource::Versions),
    ("uploads", SubResource::Uploads),
    ("uploadId", SubResource::UploadId),
    ("delete", SubResource::Delete),
    ("select", SubResource::Select),
    ("partNumber", SubResource::PartNumber),
];

type DispatchKey = (Method, bool, Option<SubResource>);

/// The precomputed dispatch table.
static DISPATCH_TABLE: LazyLock<HashMap<DispatchKey, S3Operation>> = LazyLock::new(|| {
    use S3Operation as Op;
    use SubResource as Sub;

    let mut table = HashMap::new();
    let mut entry = |method: Method, has_key: bool, sub: Option<Sub>, op: Op| {
        table.insert((method, has_key, sub), op);
    };

    // Bucket level.
    entry(Method::GET, false, None, Op::ListObjects);
    entry(Method::PUT, false, None, Op::CreateBucket);
    entry(Method::DELETE, false, None, Op::DeleteBucket);
    entry(Method::HEAD, false, None, Op::HeadBucket);
    entry(Method::GET, false, Some(Sub::Policy), Op::GetBucketPolicy);
    entry(Method::PUT, false, Some(Sub::Policy), Op::PutBucketPolicy);
    entry(Method::DELETE, false, Some(Sub::Policy), Op::DeleteBucketPolicy);
    entry(Method::GET, false, Some(Sub::Acl), Op::GetBucketAcl);
    entry(Method::PUT, false, Some(Sub::Acl), Op::PutBucketAcl);
    entry(Method::GET, false, Some(Sub::Versioning), Op::GetBucketVersioning);
    entry(Method::PUT, false, Some(Sub::Versioning), Op::PutBucketVersioning);
    entry(Method::GET, false, Some(Sub::Tagging), Op::GetBucketTagging);
    entry(Method::PUT, false, Some(Sub::Tagging), Op::PutBucketTagging);
    entry(Method::DELETE, false, Some(Sub::Tagging), Op::DeleteBucketTagging);
    entry(Method::GET, false, Some(Sub::Lifecycle), Op::GetBucketLifecycle);
    entry(Method::PUT, false, Some(Sub::Lifecycle), Op::PutBucketLifecycle);
    entry(Method::DELETE, false, Some(Sub::Lifecycle), Op::DeleteBucketLifecycle);
    entry(Method::GET, false, Some(Sub::Notification), Op::GetBucketNotification);
    entry(Method::PUT, false, Some(Sub::Notification), Op::PutBucketNotification);
    entry(Method::GET, false, Some(Sub::Vpc), Op::GetBucketVpcConfig);
    entry(Method::PUT, false, Some(Sub::Vpc), Op::PutBucketVpcConfig);
    entry(Method::GET, false, Some(Sub::ObjectLock), Op::GetObjectLockConfiguration);
    entry(Method::PUT, false, Some(Sub::ObjectLock), Op::PutObjectLockConfiguration);
    entry(Method::GET, false, Some(Sub::Replication), Op::GetBucketReplication);
    entry(Method::PUT, false, Some(Sub::Replication), Op::PutBucketReplication);
    entry(Method::GET, false, Some(Sub::Encryption), Op::GetBucketEncryption);
    entry(Method::PUT, false, Some(Sub::Encryption), Op::PutBucketEncryption);
    entry(Method::GET, false, Some(Sub::Versions), Op::ListObjectVersions);
    entry(Method::GET, false, Some(Sub::Uploads), Op::ListMultipartUploads);
    entry(Method::POST, false, Some(Sub::Delete), Op::DeleteObjects);

    // Object level.
    entry(Method::GET, true, None, Op::GetObject);
    entry(Method::HEAD, true, None, Op::HeadObject);
    entry(Method::PUT, true, None, Op::PutObject);
    entry(Method::DELETE, true, None, Op::DeleteObject);
    entry(Method::GET, true, Some(Sub::Acl), Op::GetObjectAcl);
    entry(Method::PUT, true, Some(Sub::Acl), Op::PutObjectAcl);
    entry(Method::GET, true, Some(Sub::Tagging), Op::GetObjectTagging);
    entry(Method::PUT, true, Some(Sub::Tagging), Op::PutObjectTagging);
    entry(Method::DELETE, true, Some(Sub::Tagging), Op::DeleteObjectTagging);
    entry(Method::GET, true, Some(Sub::UploadId), Op::ListParts);
    entry(Method::PUT, true, Some(Sub::UploadId), Op::UploadPart);
    entry(Method::POST, true, Some(Sub::UploadId), Op::CompleteMultipartUpload);
    entry(Method::DELETE, true, Some(Sub::UploadId), Op::AbortMultipartUpload);
    entry(Method::POST, true, Some(Sub::Uploads), Op::CreateMultipartUpload);
    entry(Method::POST, true, Some(Sub::Select), Op::SelectObjectContent);
    entry(Method::GET, true, Some(Sub::PartNumber), Op::GetObject);

    table
});

/// Path-style request router.
#[derive(Debug, Clone, Default)]
pub struct Router;

impl Router {
    /// Create a router.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolve a request to a routing context.
    ///
    /// # Errors
    ///
    /// `MethodNotAllowed` for method/resource combinations with no
    /// operation (including non-GET requests at the service level).
    pub fn resolve<B>(&self, req: &http::Request<B>) -> Result<RoutingContext, S3Error> {
        let method = req.method();
        let uri = req.uri();

        let query_params = parse_query_params(uri.query().unwrap_or(""));
        let (bucket, key) = parse_path(uri.path());

        let operation = identify_operation(
            method,
            bucket.is_some(),
            key.is_some(),
            &query_params,
            req.headers(),
        )?;

        Ok(RoutingContext {
            bucket,
            key,
            operation,
            query_params,
        })
    }
}

/// Parse the URI path into `(bucket, key)`; keys keep their embedded `/`.
fn parse_path(path: &str) -> (Option<String>, Option<String>) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return (None, None);
    }
    match trimmed.find('/') {
        Some(pos) => {
            let bucket = decode_component(&trimmed[..pos]);
            let key_raw = &trimmed[pos + 1..];
            let key = if key_raw.is_empty() {
                None
            } else {
                Some(decode_component(key_raw))
            };
            (Some(bucket), key)
        }
        None => (Some(decode_component(trimmed)), None),
    }
}

fn decode_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Parse a query string into decoded key/value pairs.
fn parse_query_params(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.find('=') {
            Some(pos) => (
                decode_component(&pair[..pos]),
                decode_component(&pair[pos + 1..]),
            ),
            None => (decode_component(pair), String::new()),
        })
        .collect()
}

/// The first sub-resource from the priority list present in the query.
fn dominant_sub_resource(params: &[(String, String)]) -> Option<SubResource> {
    SUB_RESOURCE_PRIORITY
        .iter()
        .find(|(name, _)| params.iter().any(|(k, _)| k == name))
        .map(|(_, sub)| *sub)
}

fn identify_operation(
    method: &Method,
    has_bucket: bool,
    has_key: bool,
    params: &[(String, String)],
    headers: &http::HeaderMap,
) -> Result<S3Operation, S3Error> {
    if !has_bucket {
        if *method == Method::GET {
            return Ok(S3Operation::ListBuckets);
        }
        return Err(S3Error::with_message(
            S3ErrorCode::MethodNotAllowed,
            "only GET is allowed at the service level",
        ));
    }

    let sub = dominant_sub_resource(params);
    let lookup = |sub: Option<SubResource>| {
        DISPATCH_TABLE
            .get(&(method.clone(), has_key, sub))
            .copied()
    };

    // Exact row first, then the method default for the resource level.
    let operation = lookup(sub)
        .or_else(|| lookup(None))
        .ok_or_else(|| S3Error::method_not_allowed(method.as_str()))?;

    // Header and parameter refinements the table cannot express.
    let operation = match operation {
        S3Operation::ListObjects
            if params
                .iter()
                .any(|(k, v)| k == "list-type" && v == "2") =>
        {
            S3Operation::ListObjectsV2
        }
        S3Operation::PutObject if headers.contains_key("x-amz-copy-source") => {
            S3Operation::CopyObject
        }
        S3Operation::UploadPart if headers.contains_key("x-amz-copy-source") => {
            S3Operation::UploadPartCopy
        }
        other => other,
    };

    Ok(operation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, uri: &str) -> http::Request<()> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .expect("valid request")
    }

    fn resolve(method: Method, uri: &str) -> RoutingContext {
        Router::new()
            .resolve(&request(method, uri))
            .expect("should resolve")
    }

    #[test]
    fn test_should_route_service_level() {
        let ctx = resolve(Method::GET, "/");
        assert!(ctx.bucket.is_none());
        assert_eq!(ctx.operation, S3Operation::ListBuckets);

        let err = Router::new()
            .resolve(&request(Method::PUT, "/"))
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MethodNotAllowed);
    }

    #[test]
    fn test_should_route_bucket_defaults() {
        assert_eq!(resolve(Method::GET, "/b1").operation, S3Operation::ListObjects);
        assert_eq!(
            resolve(Method::GET, "/b1?list-type=2").operation,
            S3Operation::ListObjectsV2
        );
        assert_eq!(resolve(Method::PUT, "/b1").operation, S3Operation::CreateBucket);
        assert_eq!(resolve(Method::DELETE, "/b1").operation, S3Operation::DeleteBucket);
        assert_eq!(resolve(Method::HEAD, "/b1").operation, S3Operation::HeadBucket);
    }

    #[test]
    fn test_should_route_object_defaults() {
        let ctx = resolve(Method::GET, "/b1/path/to/key");
        assert_eq!(ctx.bucket.as_deref(), Some("b1"));
        assert_eq!(ctx.key.as_deref(), Some("path/to/key"));
        assert_eq!(ctx.operation, S3Operation::GetObject);

        assert_eq!(resolve(Method::PUT, "/b1/k").operation, S3Operation::PutObject);
        assert_eq!(resolve(Method::HEAD, "/b1/k").operation, S3Operation::HeadObject);
        assert_eq!(resolve(Method::DELETE, "/b1/k").operation, S3Operation::DeleteObject);
        assert_eq!(
            resolve(Method::DELETE, "/b1/k?versionId=v1").operation,
            S3Operation::DeleteObject
        );
    }

    #[test]
    fn test_should_decode_percent_encoded_keys() {
        let ctx = resolve(Method::GET, "/b1/my%20key%2Fwith%2Fslashes");
        assert_eq!(ctx.key.as_deref(), Some("my key/with/slashes"));
    }

    #[test]
    fn test_should_route_bucket_sub_resources() {
        assert_eq!(
            resolve(Method::GET, "/b1?policy").operation,
            S3Operation::GetBucketPolicy
        );
        assert_eq!(
            resolve(Method::PUT, "/b1?policy").operation,
            S3Operation::PutBucketPolicy
        );
        assert_eq!(
            resolve(Method::DELETE, "/b1?policy").operation,
            S3Operation::DeleteBucketPolicy
        );
        assert_eq!(
            resolve(Method::GET, "/b1?acl").operation,
            S3Operation::GetBucketAcl
        );
        assert_eq!(
            resolve(Method::PUT, "/b1?versioning").operation,
            S3Operation::PutBucketVersioning
        );
        assert_eq!(
            resolve(Method::GET, "/b1?tagging").operation,
            S3Operation::GetBucketTagging
        );
        assert_eq!(
            resolve(Method::PUT, "/b1?lifecycle").operation,
            S3Operation::PutBucketLifecycle
        );
        assert_eq!(
            resolve(Method::GET, "/b1?notification").operation,
            S3Operation::GetBucketNotification
        );
        assert_eq!(
            resolve(Method::GET, "/b1?vpc").operation,
            S3Operation::GetBucketVpcConfig
        );
        assert_eq!(
            resolve(Method::GET, "/b1?object-lock").operation,
            S3Operation::GetObjectLockConfiguration
        );
        assert_eq!(
            resolve(Method::GET, "/b1?replication").operation,
            S3Operation::GetBucketReplication
        );
        assert_eq!(
            resolve(Method::GET, "/b1?encryption").operation,
            S3Operation::GetBucketEncryption
        );
        assert_eq!(
            resolve(Method::GET, "/b1?versions").operation,
            S3Operation::ListObjectVersions
        );
        assert_eq!(
            resolve(Method::GET, "/b1?uploads").operation,
            S3Operation::ListMultipartUploads
        );
        assert_eq!(
            resolve(Method::POST, "/b1?delete").operation,
            S3Operation::DeleteObjects
        );
    }

    #[test]
    fn test_should_honor_sub_resource_priority_order() {
        // policy precedes acl in the priority list, whatever the wire
        // order of the parameters.
        assert_eq!(
            resolve(Method::GET, "/b1?acl&policy").operation,
            S3Operation::GetBucketPolicy
        );
        assert_eq!(
            resolve(Method::GET, "/b1?policy&acl").operation,
            S3Operation::GetBucketPolicy
        );
        // uploadId precedes partNumber: a part upload routes as UploadPart
        // regardless of parameter order.
        assert_eq!(
            resolve(Method::PUT, "/b1/k?partNumber=1&uploadId=u").operation,
            S3Operation::UploadPart
        );
        assert_eq!(
            resolve(Method::GET, "/b1?versioning&tagging").operation,
            S3Operation::GetBucketVersioning
        );
    }

    #[test]
    fn test_should_route_multipart_operations() {
        assert_eq!(
            resolve(Method::POST, "/b1/k?uploads").operation,
            S3Operation::CreateMultipartUpload
        );
        assert_eq!(
            resolve(Method::GET, "/b1/k?uploadId=u").operation,
            S3Operation::ListParts
        );
        assert_eq!(
            resolve(Method::POST, "/b1/k?uploadId=u").operation,
            S3Operation::CompleteMultipartUpload
        );
        assert_eq!(
            resolve(Method::DELETE, "/b1/k?uploadId=u").operation,
            S3Operation::AbortMultipartUpload
        );
    }

    #[test]
    fn test_should_route_copy_variants_by_header() {
        let req = http::Request::builder()
            .method(Method::PUT)
            .uri("/b1/k")
            .header("x-amz-copy-source", "/src/key")
            .body(())
            .expect("valid request");
        assert_eq!(
            Router::new().resolve(&req).expect("resolve").operation,
            S3Operation::CopyObject
        );

        let req = http::Request::builder()
            .method(Method::PUT)
            .uri("/b1/k?partNumber=1&uploadId=u")
            .header("x-amz-copy-source", "/src/key")
            .body(())
            .expect("valid request");
        assert_eq!(
            Router::new().resolve(&req).expect("resolve").operation,
            S3Operation::UploadPartCopy
        );
    }

    #[test]
    fn test_should_route_object_config_operations() {
        assert_eq!(
            resolve(Method::GET, "/b1/k?tagging").operation,
            S3Operation::GetObjectTagging
        );
        assert_eq!(
            resolve(Method::DELETE, "/b1/k?tagging").operation,
            S3Operation::DeleteObjectTagging
        );
        assert_eq!(
            resolve(Method::PUT, "/b1/k?acl").operation,
            S3Operation::PutObjectAcl
        );
        assert_eq!(
            resolve(Method::POST, "/b1/k?select&select-type=2").operation,
            S3Operation::SelectObjectContent
        );
        assert_eq!(
            resolve(Method::GET, "/b1/k?partNumber=2").operation,
            S3Operation::GetObject
        );
    }

    #[test]
    fn test_should_fall_back_to_defaults_for_unmatched_sub_resources() {
        // `?versioning` on an object path has no table row; the request
        // degrades to the object default.
        assert_eq!(
            resolve(Method::GET, "/b1/k?versioning").operation,
            S3Operation::GetObject
        );
    }

    #[test]
    fn test_should_reject_unroutable_methods() {
        let err = Router::new()
            .resolve(&request(Method::PATCH, "/b1/k"))
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MethodNotAllowed);

        // POST on a plain object path has no operation.
        let err = Router::new()
            .resolve(&request(Method::POST, "/b1/k"))
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MethodNotAllowed);
    }

    #[test]
    fn test_should_parse_query_values() {
        let ctx = resolve(Method::GET, "/b1?prefix=logs%2F&max-keys=50&delimiter=%2F");
        assert_eq!(
            ctx.query_params,
            vec![
                ("prefix".to_owned(), "logs/".to_owned()),
                ("max-keys".to_owned(), "50".to_owned()),
                ("delimiter".to_owned(), "/".to_owned()),
            ]
        );
    }
}
