//! End-to-end scenarios exercised against the dispatch pipeline with a
//! temporary storage root: the round-trip, range, versioning, multipart,
//! policy, checksum-rollback, and janitor flows.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, Utc};
use futures::StreamExt;
use http::HeaderMap;

use basalt_core::janitor;
use basalt_core::{
    RequestBody, RequestContext, ResponseBody, S3Response, ServerConfig, ServiceState, handle,
};
use basalt_model::types::Principal;
use basalt_model::{S3ErrorCode, S3Operation};
use basalt_store::bytes_stream;
use basalt_store::etag::{composite_etag, md5_hex};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

async fn test_state(min_part_size: u64) -> (tempfile::TempDir, Arc<ServiceState>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ServerConfig::builder()
        .storage_root(dir.path().to_path_buf())
        .min_part_size(min_part_size)
        .build();
    let state = ServiceState::open(config).await.expect("open state");
    (dir, state)
}

fn admin(state: &ServiceState) -> Principal {
    Principal::user(state.admin.canonical_id.clone(), "admin")
}

struct Request {
    principal: Principal,
    bucket: Option<String>,
    key: Option<String>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Request {
    fn new(principal: Principal) -> Self {
        Self {
            principal,
            bucket: None,
            key: None,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    fn bucket(mut self, bucket: &str) -> Self {
        self.bucket = Some(bucket.to_owned());
        self
    }

    fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_owned());
        self
    }

    fn query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_owned(), value.to_owned()));
        self
    }

    fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers
            .insert(name, value.parse().expect("header value"));
        self
    }

    fn body(mut self, data: impl Into<Bytes>) -> Self {
        self.body = Some(data.into());
        self
    }

    async fn send(
        self,
        state: &ServiceState,
        op: S3Operation,
    ) -> Result<S3Response, basalt_model::S3Error> {
        let ctx = RequestContext {
            request_id: "test-request".to_owned(),
            principal: self.principal,
            bucket: self.bucket,
            key: self.key,
            query: self.query,
            headers: self.headers,
            source_ip: Some("127.0.0.1".to_owned()),
        };
        let body = match self.body {
            Some(data) => RequestBody::Stream(bytes_stream(data)),
            None => RequestBody::Empty,
        };
        handle(state, op, &ctx, body).await
    }
}

async fn body_bytes(response: S3Response) -> Bytes {
    match response.body {
        ResponseBody::Empty => Bytes::new(),
        ResponseBody::Bytes(data) => data,
        ResponseBody::Stream { mut stream, .. } => {
            let mut buf = Vec::new();
            while let Some(chunk) = stream.next().await {
                buf.extend_from_slice(&chunk.expect("body chunk"));
            }
            Bytes::from(buf)
        }
    }
}

fn header<'a>(response: &'a S3Response, name: &str) -> Option<&'a str> {
    response
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

async fn create_bucket(state: &ServiceState, name: &str) {
    Request::new(admin(state))
        .bucket(name)
        .send(state, S3Operation::CreateBucket)
        .await
        .expect("create bucket");
}

async fn enable_versioning(state: &ServiceState, bucket: &str) {
    Request::new(admin(state))
        .bucket(bucket)
        .body(&b"<VersioningConfiguration><Status>Enabled</Status></VersioningConfiguration>"[..])
        .send(state, S3Operation::PutBucketVersioning)
        .await
        .expect("enable versioning");
}

async fn put(state: &ServiceState, bucket: &str, key: &str, data: &'static [u8]) -> S3Response {
    Request::new(admin(state))
        .bucket(bucket)
        .key(key)
        .body(data)
        .send(state, S3Operation::PutObject)
        .await
        .expect("put object")
}

// ---------------------------------------------------------------------------
// S1 — simple put/get
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_should_roundtrip_simple_put_get() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;

    let put_response = put(&state, "b1", "k", b"hello").await;
    assert_eq!(
        header(&put_response, "ETag"),
        Some("\"5d41402abc4b2a76b9719d911017c592\"")
    );

    let get_response = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .send(&state, S3Operation::GetObject)
        .await
        .expect("get object");
    assert_eq!(get_response.status, http::StatusCode::OK);
    assert_eq!(
        header(&get_response, "ETag"),
        Some("\"5d41402abc4b2a76b9719d911017c592\"")
    );
    assert_eq!(header(&get_response, "Content-Length"), Some("5"));
    assert_eq!(body_bytes(get_response).await.as_ref(), b"hello");
}

// ---------------------------------------------------------------------------
// S2 — suffix range
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_should_serve_suffix_range() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;

    let pattern: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
    let pattern: &'static [u8] = Box::leak(pattern.into_boxed_slice());
    put(&state, "b1", "doc", pattern).await;

    let response = Request::new(admin(&state))
        .bucket("b1")
        .key("doc")
        .header("range", "bytes=-5")
        .send(&state, S3Operation::GetObject)
        .await
        .expect("range get");
    assert_eq!(response.status, http::StatusCode::PARTIAL_CONTENT);
    assert_eq!(header(&response, "Content-Range"), Some("bytes 995-999/1000"));

    let expected: Vec<u8> = (995..1000u32).map(|i| (i % 256) as u8).collect();
    assert_eq!(body_bytes(response).await.as_ref(), expected.as_slice());
}

#[tokio::test]
async fn test_should_answer_416_with_content_range_for_unsatisfiable_range() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;
    put(&state, "b1", "doc", b"0123456789").await;

    let err = Request::new(admin(&state))
        .bucket("b1")
        .key("doc")
        .header("range", "bytes=100-200")
        .send(&state, S3Operation::GetObject)
        .await
        .unwrap_err();
    assert_eq!(err.code, S3ErrorCode::InvalidRange);
    assert!(
        err.headers
            .iter()
            .any(|(k, v)| k == "Content-Range" && v == "bytes */10")
    );
}

// ---------------------------------------------------------------------------
// S3 — versioning lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_should_walk_versioning_lifecycle() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;
    enable_versioning(&state, "b1").await;

    let v1 = put(&state, "b1", "k", b"A").await;
    let v1_id = header(&v1, "x-amz-version-id").expect("v1 id").to_owned();
    let v2 = put(&state, "b1", "k", b"B").await;
    let v2_id = header(&v2, "x-amz-version-id").expect("v2 id").to_owned();
    assert_ne!(v1_id, v2_id);

    // Latest is B.
    let got = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .send(&state, S3Operation::GetObject)
        .await
        .expect("get latest");
    assert_eq!(body_bytes(got).await.as_ref(), b"B");

    // DELETE without a version creates a marker.
    let deleted = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .send(&state, S3Operation::DeleteObject)
        .await
        .expect("delete");
    assert_eq!(header(&deleted, "x-amz-delete-marker"), Some("true"));
    let marker_id = header(&deleted, "x-amz-version-id")
        .expect("marker id")
        .to_owned();

    // GET now answers 404.
    let err = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .send(&state, S3Operation::GetObject)
        .await
        .unwrap_err();
    assert_eq!(err.code, S3ErrorCode::NoSuchKey);

    // ListVersions shows all three rows, the marker as latest.
    let listing = Request::new(admin(&state))
        .bucket("b1")
        .send(&state, S3Operation::ListObjectVersions)
        .await
        .expect("list versions");
    let xml = String::from_utf8(body_bytes(listing).await.to_vec()).expect("utf8");
    assert!(xml.contains(&format!("<VersionId>{v1_id}</VersionId>")));
    assert!(xml.contains(&format!("<VersionId>{v2_id}</VersionId>")));
    assert!(xml.contains(&format!(
        "<DeleteMarker><Key>k</Key><VersionId>{marker_id}</VersionId><IsLatest>true</IsLatest>"
    )));

    // Removing the marker resurfaces B.
    Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .query("versionId", &marker_id)
        .send(&state, S3Operation::DeleteObject)
        .await
        .expect("remove marker");
    let got = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .send(&state, S3Operation::GetObject)
        .await
        .expect("get after marker removal");
    assert_eq!(body_bytes(got).await.as_ref(), b"B");

    // Old versions remain addressable.
    let got = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .query("versionId", &v1_id)
        .send(&state, S3Operation::GetObject)
        .await
        .expect("get v1");
    assert_eq!(body_bytes(got).await.as_ref(), b"A");
}

#[tokio::test]
async fn test_should_delete_specific_version_idempotently() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;
    enable_versioning(&state, "b1").await;
    let response = put(&state, "b1", "k", b"data").await;
    let version_id = header(&response, "x-amz-version-id")
        .expect("version id")
        .to_owned();

    for _ in 0..2 {
        let response = Request::new(admin(&state))
            .bucket("b1")
            .key("k")
            .query("versionId", &version_id)
            .send(&state, S3Operation::DeleteObject)
            .await
            .expect("versioned delete");
        assert_eq!(response.status, http::StatusCode::NO_CONTENT);
    }
}

// ---------------------------------------------------------------------------
// S4 — multipart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_should_complete_multipart_upload_with_composite_etag() {
    let (_dir, state) = test_state(5 * 1024 * 1024).await;
    create_bucket(&state, "b1").await;

    let initiate = Request::new(admin(&state))
        .bucket("b1")
        .key("big")
        .send(&state, S3Operation::CreateMultipartUpload)
        .await
        .expect("initiate");
    let xml = String::from_utf8(body_bytes(initiate).await.to_vec()).expect("utf8");
    let upload_id = xml
        .split("<UploadId>")
        .nth(1)
        .and_then(|s| s.split("</UploadId>").next())
        .expect("upload id")
        .to_owned();

    let part1: Vec<u8> = vec![0x61; 10 * 1024 * 1024];
    let part1: &'static [u8] = Box::leak(part1.into_boxed_slice());
    let part2: &'static [u8] = b"b";

    let response = Request::new(admin(&state))
        .bucket("b1")
        .key("big")
        .query("uploadId", &upload_id)
        .query("partNumber", "1")
        .body(part1)
        .send(&state, S3Operation::UploadPart)
        .await
        .expect("part 1");
    let etag1 = header(&response, "ETag").expect("etag 1").to_owned();

    let response = Request::new(admin(&state))
        .bucket("b1")
        .key("big")
        .query("uploadId", &upload_id)
        .query("partNumber", "2")
        .body(part2)
        .send(&state, S3Operation::UploadPart)
        .await
        .expect("part 2");
    let etag2 = header(&response, "ETag").expect("etag 2").to_owned();

    let complete_body = format!(
        "<CompleteMultipartUpload>\
             <Part><PartNumber>1</PartNumber><ETag>{etag1}</ETag></Part>\
             <Part><PartNumber>2</PartNumber><ETag>{etag2}</ETag></Part>\
         </CompleteMultipartUpload>"
    );
    let response = Request::new(admin(&state))
        .bucket("b1")
        .key("big")
        .query("uploadId", &upload_id)
        .body(complete_body.into_bytes())
        .send(&state, S3Operation::CompleteMultipartUpload)
        .await
        .expect("complete");
    let xml = String::from_utf8(body_bytes(response).await.to_vec()).expect("utf8");

    let expected = composite_etag(&[md5_hex(part1), md5_hex(part2)]);
    assert!(
        xml.contains(expected.trim_matches('"')),
        "composite etag missing: {xml}"
    );
    assert!(expected.ends_with("-2\""));

    // The assembled object reads back with the right size and ETag.
    let response = Request::new(admin(&state))
        .bucket("b1")
        .key("big")
        .send(&state, S3Operation::GetObject)
        .await
        .expect("get assembled");
    assert_eq!(header(&response, "ETag"), Some(expected.as_str()));
    let data = body_bytes(response).await;
    assert_eq!(data.len(), 10 * 1024 * 1024 + 1);
    assert_eq!(data[0], 0x61);
    assert_eq!(data[data.len() - 1], 0x62);

    // A duplicate complete answers NoSuchUpload.
    let complete_body = format!(
        "<CompleteMultipartUpload>\
             <Part><PartNumber>1</PartNumber><ETag>{etag1}</ETag></Part>\
         </CompleteMultipartUpload>"
    );
    let err = Request::new(admin(&state))
        .bucket("b1")
        .key("big")
        .query("uploadId", &upload_id)
        .body(complete_body.into_bytes())
        .send(&state, S3Operation::CompleteMultipartUpload)
        .await
        .unwrap_err();
    assert_eq!(err.code, S3ErrorCode::NoSuchUpload);
}

#[tokio::test]
async fn test_should_reject_bad_parts_and_keep_upload_alive() {
    let (_dir, state) = test_state(64).await;
    create_bucket(&state, "b1").await;

    let initiate = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .send(&state, S3Operation::CreateMultipartUpload)
        .await
        .expect("initiate");
    let xml = String::from_utf8(body_bytes(initiate).await.to_vec()).expect("utf8");
    let upload_id = xml
        .split("<UploadId>")
        .nth(1)
        .and_then(|s| s.split("</UploadId>").next())
        .expect("upload id")
        .to_owned();

    Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .query("uploadId", &upload_id)
        .query("partNumber", "1")
        .body(&b"0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"[..])
        .send(&state, S3Operation::UploadPart)
        .await
        .expect("part 1");

    // Unknown part number.
    let err = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .query("uploadId", &upload_id)
        .body(
            &b"<CompleteMultipartUpload>\
               <Part><PartNumber>2</PartNumber><ETag>\"missing\"</ETag></Part>\
               </CompleteMultipartUpload>"[..],
        )
        .send(&state, S3Operation::CompleteMultipartUpload)
        .await
        .unwrap_err();
    assert_eq!(err.code, S3ErrorCode::InvalidPart);

    // Descending order.
    let err = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .query("uploadId", &upload_id)
        .body(
            &b"<CompleteMultipartUpload>\
               <Part><PartNumber>2</PartNumber><ETag>\"x\"</ETag></Part>\
               <Part><PartNumber>1</PartNumber><ETag>\"y\"</ETag></Part>\
               </CompleteMultipartUpload>"[..],
        )
        .send(&state, S3Operation::CompleteMultipartUpload)
        .await
        .unwrap_err();
    assert_eq!(err.code, S3ErrorCode::InvalidPartOrder);

    // The failed completes left the upload alive: abort still works.
    let response = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .query("uploadId", &upload_id)
        .send(&state, S3Operation::AbortMultipartUpload)
        .await
        .expect("abort");
    assert_eq!(response.status, http::StatusCode::NO_CONTENT);
}

// ---------------------------------------------------------------------------
// S5 — policy deny beats allow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_should_let_explicit_deny_win_over_allow() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b2").await;
    put(&state, "b2", "anything", b"content").await;

    let policy = r#"{"Statement": [
        {"Effect": "Allow", "Principal": "*", "Action": "s3:*",
         "Resource": ["arn:aws:s3:::b2", "arn:aws:s3:::b2/*"]},
        {"Effect": "Deny", "Principal": "*", "Action": "s3:DeleteObject",
         "Resource": "arn:aws:s3:::b2/*"}
    ]}"#;
    Request::new(admin(&state))
        .bucket("b2")
        .body(policy.as_bytes())
        .send(&state, S3Operation::PutBucketPolicy)
        .await
        .expect("put policy");

    // DELETE is denied for every principal, including the owner.
    for principal in [admin(&state), Principal::Anonymous] {
        let err = Request::new(principal)
            .bucket("b2")
            .key("anything")
            .send(&state, S3Operation::DeleteObject)
            .await
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::AccessDenied);
    }

    // GET still succeeds, even anonymously, thanks to the Allow statement.
    let response = Request::new(Principal::Anonymous)
        .bucket("b2")
        .key("anything")
        .send(&state, S3Operation::GetObject)
        .await
        .expect("anonymous get");
    assert_eq!(body_bytes(response).await.as_ref(), b"content");
}

#[tokio::test]
async fn test_should_answer_404_for_missing_bucket_before_authorization() {
    let (_dir, state) = test_state(1024).await;
    for principal in [admin(&state), Principal::Anonymous] {
        let err = Request::new(principal)
            .bucket("no-such-bucket")
            .key("k")
            .send(&state, S3Operation::GetObject)
            .await
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchBucket);
    }
}

// ---------------------------------------------------------------------------
// S6 — checksum mismatch rollback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_should_roll_back_version_on_sha256_mismatch() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;

    let err = Request::new(admin(&state))
        .bucket("b1")
        .key("x")
        .header(
            "x-amz-content-sha256",
            "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef",
        )
        .body(&b"hello"[..])
        .send(&state, S3Operation::PutObject)
        .await
        .unwrap_err();
    assert_eq!(err.code, S3ErrorCode::XAmzContentSHA256Mismatch);

    // The version was rolled back.
    let err = Request::new(admin(&state))
        .bucket("b1")
        .key("x")
        .send(&state, S3Operation::HeadObject)
        .await
        .unwrap_err();
    assert_eq!(err.code, S3ErrorCode::NoSuchKey);
}

#[tokio::test]
async fn test_should_accept_matching_and_sentinel_sha256() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;

    // Sentinel value passes untouched.
    Request::new(admin(&state))
        .bucket("b1")
        .key("a")
        .header("x-amz-content-sha256", "UNSIGNED-PAYLOAD")
        .body(&b"hello"[..])
        .send(&state, S3Operation::PutObject)
        .await
        .expect("sentinel put");

    // A correct digest passes.
    Request::new(admin(&state))
        .bucket("b1")
        .key("b")
        .header(
            "x-amz-content-sha256",
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
        )
        .body(&b"hello"[..])
        .send(&state, S3Operation::PutObject)
        .await
        .expect("digest put");
}

// ---------------------------------------------------------------------------
// S7 — lifecycle expiration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_should_expire_current_versions_via_janitor() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b3").await;
    put(&state, "b3", "logs/a", b"old log line").await;
    put(&state, "b3", "data/keep", b"not under the prefix").await;

    let lifecycle = b"<LifecycleConfiguration><Rule>\
        <ID>expire-logs</ID><Status>Enabled</Status>\
        <Filter><Prefix>logs/</Prefix></Filter>\
        <Expiration><Days>1</Days></Expiration>\
        </Rule></LifecycleConfiguration>";
    Request::new(admin(&state))
        .bucket("b3")
        .body(&lifecycle[..])
        .send(&state, S3Operation::PutBucketLifecycle)
        .await
        .expect("put lifecycle");

    // Run the pass as if 48 hours have elapsed.
    let summary = janitor::run_pass(&state, Utc::now() + Duration::hours(48)).await;
    assert_eq!(summary.expired_objects, 1);
    assert_eq!(summary.errors, 0);

    let err = Request::new(admin(&state))
        .bucket("b3")
        .key("logs/a")
        .send(&state, S3Operation::GetObject)
        .await
        .unwrap_err();
    assert_eq!(err.code, S3ErrorCode::NoSuchKey);

    // The object outside the prefix survived. (The rule's one-day age has
    // also passed for it, but the prefix filter protects it.)
    Request::new(admin(&state))
        .bucket("b3")
        .key("data/keep")
        .send(&state, S3Operation::GetObject)
        .await
        .expect("unexpired object");
}

#[tokio::test]
async fn test_should_trim_noncurrent_versions_and_stale_uploads() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;
    enable_versioning(&state, "b1").await;
    for data in [&b"v1"[..], &b"v2"[..], &b"v3"[..]] {
        put(&state, "b1", "k", data).await;
    }

    // Keep at most one newer non-current version.
    let lifecycle = b"<LifecycleConfiguration><Rule>\
        <Status>Enabled</Status><Filter><Prefix></Prefix></Filter>\
        <NoncurrentVersionExpiration>\
        <NewerNoncurrentVersions>1</NewerNoncurrentVersions>\
        </NoncurrentVersionExpiration>\
        </Rule></LifecycleConfiguration>";
    Request::new(admin(&state))
        .bucket("b1")
        .body(&lifecycle[..])
        .send(&state, S3Operation::PutBucketLifecycle)
        .await
        .expect("put lifecycle");

    // An idle multipart upload to garbage-collect.
    Request::new(admin(&state))
        .bucket("b1")
        .key("stale")
        .send(&state, S3Operation::CreateMultipartUpload)
        .await
        .expect("initiate stale upload");

    let summary = janitor::run_pass(&state, Utc::now() + Duration::hours(2)).await;
    assert_eq!(summary.expired_versions, 1, "oldest non-current removed");
    assert_eq!(summary.aborted_uploads, 1);

    // Latest still reads v3.
    let response = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .send(&state, S3Operation::GetObject)
        .await
        .expect("get latest");
    assert_eq!(body_bytes(response).await.as_ref(), b"v3");
}

// ---------------------------------------------------------------------------
// MFA gate and bulk delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_should_gate_versioned_deletes_on_mfa_header() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;
    let body =
        b"<VersioningConfiguration><Status>Enabled</Status><MfaDelete>Enabled</MfaDelete>\
          </VersioningConfiguration>";
    Request::new(admin(&state))
        .bucket("b1")
        .body(&body[..])
        .send(&state, S3Operation::PutBucketVersioning)
        .await
        .expect("enable versioning with mfa");
    let response = put(&state, "b1", "k", b"data").await;
    let version_id = header(&response, "x-amz-version-id")
        .expect("version id")
        .to_owned();

    // Versioned delete without the header is refused.
    let err = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .query("versionId", &version_id)
        .send(&state, S3Operation::DeleteObject)
        .await
        .unwrap_err();
    assert_eq!(err.code, S3ErrorCode::AccessDenied);

    // With the header it goes through. (Code validation is out of scope.)
    Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .query("versionId", &version_id)
        .header("x-amz-mfa", "arn:aws:iam::0:mfa/root 123456")
        .send(&state, S3Operation::DeleteObject)
        .await
        .expect("mfa delete");

    // The current-version delete path stays un-gated.
    Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .send(&state, S3Operation::DeleteObject)
        .await
        .expect("plain delete");
}

#[tokio::test]
async fn test_should_bulk_delete_with_marker_details() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;
    enable_versioning(&state, "b1").await;
    put(&state, "b1", "a", b"1").await;
    put(&state, "b1", "b", b"2").await;

    let body = b"<Delete>\
        <Object><Key>a</Key></Object>\
        <Object><Key>b</Key></Object>\
        </Delete>";
    let response = Request::new(admin(&state))
        .bucket("b1")
        .query("delete", "")
        .body(&body[..])
        .send(&state, S3Operation::DeleteObjects)
        .await
        .expect("bulk delete");
    let xml = String::from_utf8(body_bytes(response).await.to_vec()).expect("utf8");

    assert_eq!(xml.matches("<Deleted>").count(), 2);
    assert_eq!(xml.matches("<DeleteMarker>true</DeleteMarker>").count(), 2);
    assert_eq!(xml.matches("<DeleteMarkerVersionId>").count(), 2);

    let err = Request::new(admin(&state))
        .bucket("b1")
        .key("a")
        .send(&state, S3Operation::GetObject)
        .await
        .unwrap_err();
    assert_eq!(err.code, S3ErrorCode::NoSuchKey);
}

// ---------------------------------------------------------------------------
// Listing and metadata round-trips
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_should_list_objects_with_common_prefixes() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;
    for key in ["photos/jan.jpg", "photos/feb.jpg", "top.txt"] {
        put(&state, "b1", key, b"x").await;
    }

    let response = Request::new(admin(&state))
        .bucket("b1")
        .query("delimiter", "/")
        .send(&state, S3Operation::ListObjects)
        .await
        .expect("list");
    let xml = String::from_utf8(body_bytes(response).await.to_vec()).expect("utf8");
    assert!(xml.contains("<CommonPrefixes><Prefix>photos/</Prefix></CommonPrefixes>"));
    assert!(xml.contains("<Key>top.txt</Key>"));
    assert!(!xml.contains("<Key>photos/jan.jpg</Key>"));
}

#[tokio::test]
async fn test_should_echo_user_metadata_on_get() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;

    Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .header("content-type", "text/plain")
        .header("x-amz-meta-author", "alice")
        .body(&b"hello"[..])
        .send(&state, S3Operation::PutObject)
        .await
        .expect("put with metadata");

    let response = Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .send(&state, S3Operation::HeadObject)
        .await
        .expect("head");
    assert_eq!(header(&response, "Content-Type"), Some("text/plain"));
    assert_eq!(header(&response, "x-amz-meta-author"), Some("alice"));
}

#[tokio::test]
async fn test_should_reject_unversioned_bucket_delete_only_when_occupied() {
    let (_dir, state) = test_state(1024).await;
    create_bucket(&state, "b1").await;
    put(&state, "b1", "k", b"x").await;

    let err = Request::new(admin(&state))
        .bucket("b1")
        .send(&state, S3Operation::DeleteBucket)
        .await
        .unwrap_err();
    assert_eq!(err.code, S3ErrorCode::BucketNotEmpty);

    Request::new(admin(&state))
        .bucket("b1")
        .key("k")
        .send(&state, S3Operation::DeleteObject)
        .await
        .expect("delete object");
    Request::new(admin(&state))
        .bucket("b1")
        .send(&state, S3Operation::DeleteBucket)
        .await
        .expect("delete bucket");
}
