//! The set of S3 operations this server resolves requests to.

use std::fmt;

/// Every operation the router can dispatch.
///
/// One variant per (method, resource level, sub-resource) combination the
/// server understands; the HTTP layer resolves a request to exactly one of
/// these before any handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum S3Operation {
    // Service level
    /// List all buckets owned by the caller.
    ListBuckets,

    // Bucket level
    /// Create a bucket.
    CreateBucket,
    /// Check bucket existence.
    HeadBucket,
    /// Delete an empty bucket.
    DeleteBucket,
    /// List objects (V1).
    ListObjects,
    /// List objects (V2).
    ListObjectsV2,
    /// List object versions and delete markers.
    ListObjectVersions,
    /// List in-progress multipart uploads.
    ListMultipartUploads,
    /// Bulk delete (`POST ?delete`).
    DeleteObjects,
    /// Get the bucket ACL.
    GetBucketAcl,
    /// Replace the bucket ACL.
    PutBucketAcl,
    /// Get the bucket policy (JSON).
    GetBucketPolicy,
    /// Replace the bucket policy.
    PutBucketPolicy,
    /// Delete the bucket policy.
    DeleteBucketPolicy,
    /// Get the versioning configuration.
    GetBucketVersioning,
    /// Set the versioning configuration.
    PutBucketVersioning,
    /// Get bucket tags.
    GetBucketTagging,
    /// Replace bucket tags.
    PutBucketTagging,
    /// Delete bucket tags.
    DeleteBucketTagging,
    /// Get the lifecycle configuration.
    GetBucketLifecycle,
    /// Replace the lifecycle configuration.
    PutBucketLifecycle,
    /// Delete the lifecycle configuration.
    DeleteBucketLifecycle,
    /// Get the notification configuration.
    GetBucketNotification,
    /// Replace the notification configuration.
    PutBucketNotification,
    /// Get the VPC configuration blob.
    GetBucketVpcConfig,
    /// Store the VPC configuration blob.
    PutBucketVpcConfig,
    /// Get the replication configuration blob.
    GetBucketReplication,
    /// Store the replication configuration blob.
    PutBucketReplication,
    /// Get the encryption configuration blob.
    GetBucketEncryption,
    /// Store the encryption configuration blob.
    PutBucketEncryption,
    /// Get the object-lock configuration blob.
    GetObjectLockConfiguration,
    /// Store the object-lock configuration blob.
    PutObjectLockConfiguration,

    // Object level
    /// Upload an object.
    PutObject,
    /// Server-side copy (`x-amz-copy-source`).
    CopyObject,
    /// Download an object.
    GetObject,
    /// Fetch object metadata.
    HeadObject,
    /// Delete an object or a specific version.
    DeleteObject,
    /// Get the object ACL.
    GetObjectAcl,
    /// Replace the object ACL.
    PutObjectAcl,
    /// Get object tags.
    GetObjectTagging,
    /// Replace object tags.
    PutObjectTagging,
    /// Delete object tags.
    DeleteObjectTagging,
    /// SQL select over object content (not implemented).
    SelectObjectContent,

    // Multipart
    /// Initiate a multipart upload.
    CreateMultipartUpload,
    /// Upload one part.
    UploadPart,
    /// Copy a source range into a part.
    UploadPartCopy,
    /// Atomically materialize the upload.
    CompleteMultipartUpload,
    /// Abort the upload and discard staged parts.
    AbortMultipartUpload,
    /// List staged parts.
    ListParts,
}

impl S3Operation {
    /// Returns the operation name as used in audit events and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListBuckets => "ListBuckets",
            Self::CreateBucket => "CreateBucket",
            Self::HeadBucket => "HeadBucket",
            Self::DeleteBucket => "DeleteBucket",
            Self::ListObjects => "ListObjects",
            Self::ListObjectsV2 => "ListObjectsV2",
            Self::ListObjectVersions => "ListObjectVersions",
            Self::ListMultipartUploads => "ListMultipartUploads",
            Self::DeleteObjects => "DeleteObjects",
            Self::GetBucketAcl => "GetBucketAcl",
            Self::PutBucketAcl => "PutBucketAcl",
            Self::GetBucketPolicy => "GetBucketPolicy",
            Self::PutBucketPolicy => "PutBucketPolicy",
            Self::DeleteBucketPolicy => "DeleteBucketPolicy",
            Self::GetBucketVersioning => "GetBucketVersioning",
            Self::PutBucketVersioning => "PutBucketVersioning",
            Self::GetBucketTagging => "GetBucketTagging",
            Self::PutBucketTagging => "PutBucketTagging",
            Self::DeleteBucketTagging => "DeleteBucketTagging",
            Self::GetBucketLifecycle => "GetBucketLifecycle",
            Self::PutBucketLifecycle => "PutBucketLifecycle",
            Self::DeleteBucketLifecycle => "DeleteBucketLifecycle",
            Self::GetBucketNotification => "GetBucketNotification",
            Self::PutBucketNotification => "PutBucketNotification",
            Self::GetBucketVpcConfig => "GetBucketVpcConfig",
            Self::PutBucketVpcConfig => "PutBucketVpcConfig",
            Self::GetBucketReplication => "GetBucketReplication",
            Self::PutBucketReplication => "PutBucketReplication",
            Self::GetBucketEncryption => "GetBucketEncryption",
            Self::PutBucketEncryption => "PutBucketEncryption",
            Self::GetObjectLockConfiguration => "GetObjectLockConfiguration",
            Self::PutObjectLockConfiguration => "PutObjectLockConfiguration",
            Self::PutObject => "PutObject",
            Self::CopyObject => "CopyObject",
            Self::GetObject => "GetObject",
            Self::HeadObject => "HeadObject",
            Self::DeleteObject => "DeleteObject",
            Self::GetObjectAcl => "GetObjectAcl",
            Self::PutObjectAcl => "PutObjectAcl",
            Self::GetObjectTagging => "GetObjectTagging",
            Self::PutObjectTagging => "PutObjectTagging",
            Self::DeleteObjectTagging => "DeleteObjectTagging",
            Self::SelectObjectContent => "SelectObjectContent",
            Self::CreateMultipartUpload => "CreateMultipartUpload",
            Self::UploadPart => "UploadPart",
            Self::UploadPartCopy => "UploadPartCopy",
            Self::CompleteMultipartUpload => "CompleteMultipartUpload",
            Self::AbortMultipartUpload => "AbortMultipartUpload",
            Self::ListParts => "ListParts",
        }
    }

    /// Whether the operation may be transparently retried after an internal
    /// error. Only body-less reads and targeted deletes qualify; writes are
    /// never silently retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GetObject
                | Self::HeadObject
                | Self::HeadBucket
                | Self::DeleteObject
                | Self::AbortMultipartUpload
        )
    }
}

impl fmt::Display for S3Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
