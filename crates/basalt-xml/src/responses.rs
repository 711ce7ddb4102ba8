//! Response payload shapes for the XML bodies this server produces.
//!
//! The handlers assemble these from index results and request parameters;
//! `serialize.rs` turns them into the wire XML.

use chrono::{DateTime, Utc};

use basalt_model::types::{ObjectVersion, Owner};

/// `ListAllMyBucketsResult`.
#[derive(Debug, Clone)]
pub struct ListBucketsPage {
    /// The calling owner.
    pub owner: Owner,
    /// `(name, creation date)` per bucket, sorted by name.
    pub buckets: Vec<(String, DateTime<Utc>)>,
}

/// `ListBucketResult` for both V1 and V2 listings.
#[derive(Debug, Clone)]
pub struct ListObjectsPage {
    /// The bucket name.
    pub bucket: String,
    /// The prefix filter that was applied.
    pub prefix: String,
    /// The delimiter that was applied, if any.
    pub delimiter: Option<String>,
    /// The requested page size.
    pub max_keys: usize,
    /// V1 marker (echoed).
    pub marker: Option<String>,
    /// V2 continuation token (echoed).
    pub continuation_token: Option<String>,
    /// V2 start-after (echoed).
    pub start_after: Option<String>,
    /// Whether more keys remain.
    pub is_truncated: bool,
    /// The next marker / continuation token.
    pub next_marker: Option<String>,
    /// The matched objects.
    pub contents: Vec<ObjectVersion>,
    /// Delimiter-grouped common prefixes.
    pub common_prefixes: Vec<String>,
    /// Whether to render in V2 shape.
    pub v2: bool,
}

/// `ListVersionsResult`.
#[derive(Debug, Clone)]
pub struct ListVersionsPage {
    /// The bucket name.
    pub bucket: String,
    /// The prefix filter that was applied.
    pub prefix: String,
    /// The delimiter that was applied, if any.
    pub delimiter: Option<String>,
    /// The requested page size.
    pub max_keys: usize,
    /// The key marker (echoed).
    pub key_marker: Option<String>,
    /// The version-id marker (echoed).
    pub version_id_marker: Option<String>,
    /// Whether more rows remain.
    pub is_truncated: bool,
    /// Next page key marker.
    pub next_key_marker: Option<String>,
    /// Next page version-id marker.
    pub next_version_id_marker: Option<String>,
    /// Versions and delete markers, ascending by (key, version id).
    pub versions: Vec<ObjectVersion>,
    /// Delimiter-grouped common prefixes.
    pub common_prefixes: Vec<String>,
}

/// One entry in `ListMultipartUploadsResult`.
#[derive(Debug, Clone)]
pub struct UploadSummary {
    /// The destination key.
    pub key: String,
    /// The upload id.
    pub upload_id: String,
    /// The initiating owner.
    pub owner: Owner,
    /// When the upload was initiated.
    pub initiated: DateTime<Utc>,
}

/// `ListMultipartUploadsResult`.
#[derive(Debug, Clone)]
pub struct ListUploadsPage {
    /// The bucket name.
    pub bucket: String,
    /// The requested page size.
    pub max_uploads: usize,
    /// Whether more uploads remain.
    pub is_truncated: bool,
    /// The uploads on this page.
    pub uploads: Vec<UploadSummary>,
}

/// One entry in `ListPartsResult`.
#[derive(Debug, Clone)]
pub struct PartSummary {
    /// The part number.
    pub part_number: u32,
    /// When the part was uploaded.
    pub last_modified: DateTime<Utc>,
    /// The part ETag.
    pub etag: String,
    /// The part size in bytes.
    pub size: u64,
}

/// `ListPartsResult`.
#[derive(Debug, Clone)]
pub struct ListPartsPage {
    /// The bucket name.
    pub bucket: String,
    /// The destination key.
    pub key: String,
    /// The upload id.
    pub upload_id: String,
    /// The initiating owner.
    pub owner: Owner,
    /// The requested page size.
    pub max_parts: usize,
    /// Whether more parts remain.
    pub is_truncated: bool,
    /// The staged parts, ascending by part number.
    pub parts: Vec<PartSummary>,
}

/// `InitiateMultipartUploadResult`.
#[derive(Debug, Clone)]
pub struct InitiateUploadResult {
    /// The bucket name.
    pub bucket: String,
    /// The destination key.
    pub key: String,
    /// The new upload id.
    pub upload_id: String,
}

/// `CompleteMultipartUploadResult`.
#[derive(Debug, Clone)]
pub struct CompleteUploadResult {
    /// The object URL.
    pub location: String,
    /// The bucket name.
    pub bucket: String,
    /// The object key.
    pub key: String,
    /// The composite ETag.
    pub etag: String,
}

/// `CopyObjectResult` / `CopyPartResult`.
#[derive(Debug, Clone)]
pub struct CopyResult {
    /// The destination ETag.
    pub etag: String,
    /// The destination last-modified time.
    pub last_modified: DateTime<Utc>,
}

/// One `<Deleted>` entry in a `DeleteResult`.
#[derive(Debug, Clone)]
pub struct DeletedEntry {
    /// The deleted key.
    pub key: String,
    /// The version id, when a specific version was addressed.
    pub version_id: Option<String>,
    /// Whether the operation created or removed a delete marker.
    pub delete_marker: bool,
    /// The delete marker's version id.
    pub delete_marker_version_id: Option<String>,
}

/// One `<Error>` entry in a `DeleteResult`.
#[derive(Debug, Clone)]
pub struct DeleteErrorEntry {
    /// The key that failed.
    pub key: String,
    /// The version id, if one was addressed.
    pub version_id: Option<String>,
    /// The error code.
    pub code: String,
    /// The error message.
    pub message: String,
}

/// `DeleteResult` for bulk delete.
#[derive(Debug, Clone, Default)]
pub struct DeleteResultPage {
    /// Successful deletions.
    pub deleted: Vec<DeletedEntry>,
    /// Failed deletions.
    pub errors: Vec<DeleteErrorEntry>,
    /// Whether the request was quiet (successes suppressed).
    pub quiet: bool,
}

/// `VersioningConfiguration` response.
#[derive(Debug, Clone)]
pub struct VersioningView {
    /// `Enabled` / `Suspended`, or `None` when never enabled.
    pub status: Option<&'static str>,
    /// `Enabled` / `Disabled` when versioning has been configured.
    pub mfa_delete: Option<&'static str>,
}
