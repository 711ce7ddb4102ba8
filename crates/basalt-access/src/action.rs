//! The action vocabulary used in policies and the ACL permission table.

use std::fmt;

use basalt_model::types::Permission;

/// Actions the evaluator understands, one per authorizable operation
/// class. [`S3Action::as_str`] yields the `s3:` form used in policy
/// documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum S3Action {
    /// Read object data.
    GetObject,
    /// Read object metadata.
    HeadObject,
    /// List objects in a bucket.
    ListBucket,
    /// List object versions.
    ListBucketVersions,
    /// Write object data (covers multipart initiation and parts).
    PutObject,
    /// Delete objects or versions.
    DeleteObject,
    /// Create a bucket.
    CreateBucket,
    /// Delete a bucket.
    DeleteBucket,
    /// Read the bucket ACL.
    GetBucketAcl,
    /// Read an object ACL.
    GetObjectAcl,
    /// Replace the bucket ACL.
    PutBucketAcl,
    /// Replace an object ACL.
    PutObjectAcl,
    /// Read the bucket policy.
    GetBucketPolicy,
    /// Replace the bucket policy.
    PutBucketPolicy,
    /// Delete the bucket policy.
    DeleteBucketPolicy,
    /// Read the versioning configuration.
    GetBucketVersioning,
    /// Change the versioning configuration.
    PutBucketVersioning,
    /// Read bucket tags.
    GetBucketTagging,
    /// Write bucket tags.
    PutBucketTagging,
    /// Read object tags.
    GetObjectTagging,
    /// Write (or delete) object tags.
    PutObjectTagging,
    /// Read the lifecycle configuration.
    GetLifecycleConfiguration,
    /// Write or delete the lifecycle configuration.
    PutLifecycleConfiguration,
    /// Read the notification configuration.
    GetBucketNotification,
    /// Write the notification configuration.
    PutBucketNotification,
    /// List in-progress multipart uploads.
    ListBucketMultipartUploads,
    /// List the parts of one upload.
    ListMultipartUploadParts,
    /// Abort a multipart upload.
    AbortMultipartUpload,
    /// Read a stored configuration blob (replication, encryption, VPC,
    /// object lock).
    GetBucketConfiguration,
    /// Write a stored configuration blob.
    PutBucketConfiguration,
}

impl S3Action {
    /// Returns the `s3:` action string used in policy documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetObject => "s3:GetObject",
            Self::HeadObject => "s3:HeadObject",
            Self::ListBucket => "s3:ListBucket",
            Self::ListBucketVersions => "s3:ListBucketVersions",
            Self::PutObject => "s3:PutObject",
            Self::DeleteObject => "s3:DeleteObject",
            Self::CreateBucket => "s3:CreateBucket",
            Self::DeleteBucket => "s3:DeleteBucket",
            Self::GetBucketAcl => "s3:GetBucketAcl",
            Self::GetObjectAcl => "s3:GetObjectAcl",
            Self::PutBucketAcl => "s3:PutBucketAcl",
            Self::PutObjectAcl => "s3:PutObjectAcl",
            Self::GetBucketPolicy => "s3:GetBucketPolicy",
            Self::PutBucketPolicy => "s3:PutBucketPolicy",
            Self::DeleteBucketPolicy => "s3:DeleteBucketPolicy",
            Self::GetBucketVersioning => "s3:GetBucketVersioning",
            Self::PutBucketVersioning => "s3:PutBucketVersioning",
            Self::GetBucketTagging => "s3:GetBucketTagging",
            Self::PutBucketTagging => "s3:PutBucketTagging",
            Self::GetObjectTagging => "s3:GetObjectTagging",
            Self::PutObjectTagging => "s3:PutObjectTagging",
            Self::GetLifecycleConfiguration => "s3:GetLifecycleConfiguration",
            Self::PutLifecycleConfiguration => "s3:PutLifecycleConfiguration",
            Self::GetBucketNotification => "s3:GetBucketNotification",
            Self::PutBucketNotification => "s3:PutBucketNotification",
            Self::ListBucketMultipartUploads => "s3:ListBucketMultipartUploads",
            Self::ListMultipartUploadParts => "s3:ListMultipartUploadParts",
            Self::AbortMultipartUpload => "s3:AbortMultipartUpload",
            Self::GetBucketConfiguration => "s3:GetBucketConfiguration",
            Self::PutBucketConfiguration => "s3:PutBucketConfiguration",
        }
    }

    /// Whether the action targets an object (as opposed to the bucket).
    #[must_use]
    pub fn is_object_action(&self) -> bool {
        matches!(
            self,
            Self::GetObject
                | Self::HeadObject
                | Self::PutObject
                | Self::DeleteObject
                | Self::GetObjectAcl
                | Self::PutObjectAcl
                | Self::GetObjectTagging
                | Self::PutObjectTagging
                | Self::ListMultipartUploadParts
                | Self::AbortMultipartUpload
        )
    }
}

impl fmt::Display for S3Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an ACL permission covers an action.
///
/// `FULL_CONTROL` covers everything; the other permissions cover the
/// classic table (READ for reads and listings, WRITE for object writes and
/// bucket create/delete, `READ_ACP`/`WRITE_ACP` for ACL access).
/// Configuration actions are not in the table: only the owner, a
/// `FULL_CONTROL` grantee, or an explicit policy statement reaches them.
#[must_use]
pub fn permission_covers(permission: Permission, action: S3Action) -> bool {
    match permission {
        Permission::FullControl => true,
        Permission::Read => matches!(
            action,
            S3Action::GetObject
                | S3Action::HeadObject
                | S3Action::ListBucket
                | S3Action::ListBucketVersions
                | S3Action::ListBucketMultipartUploads
                | S3Action::ListMultipartUploadParts
        ),
        Permission::Write => matches!(
            action,
            S3Action::PutObject
                | S3Action::DeleteObject
                | S3Action::CreateBucket
                | S3Action::DeleteBucket
                | S3Action::AbortMultipartUpload
        ),
        Permission::ReadAcp => {
            matches!(action, S3Action::GetBucketAcl | S3Action::GetObjectAcl)
        }
        Permission::WriteAcp => {
            matches!(action, S3Action::PutBucketAcl | S3Action::PutObjectAcl)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_render_policy_action_strings() {
        assert_eq!(S3Action::GetObject.as_str(), "s3:GetObject");
        assert_eq!(S3Action::PutObjectTagging.to_string(), "s3:PutObjectTagging");
    }

    #[test]
    fn test_should_cover_actions_per_permission_table() {
        use Permission::{FullControl, Read, ReadAcp, Write, WriteAcp};

        assert!(permission_covers(Read, S3Action::GetObject));
        assert!(permission_covers(Read, S3Action::ListBucket));
        assert!(permission_covers(Read, S3Action::ListBucketVersions));
        assert!(!permission_covers(Read, S3Action::PutObject));

        assert!(permission_covers(Write, S3Action::PutObject));
        assert!(permission_covers(Write, S3Action::DeleteObject));
        assert!(permission_covers(Write, S3Action::CreateBucket));
        assert!(permission_covers(Write, S3Action::DeleteBucket));
        assert!(!permission_covers(Write, S3Action::GetObject));

        assert!(permission_covers(ReadAcp, S3Action::GetBucketAcl));
        assert!(!permission_covers(ReadAcp, S3Action::PutBucketAcl));
        assert!(permission_covers(WriteAcp, S3Action::PutObjectAcl));
        assert!(!permission_covers(WriteAcp, S3Action::GetObjectAcl));

        assert!(permission_covers(FullControl, S3Action::GetObject));
        assert!(permission_covers(FullControl, S3Action::PutBucketPolicy));
    }

    #[test]
    fn test_should_keep_config_actions_out_of_basic_permissions() {
        for permission in [
            Permission::Read,
            Permission::Write,
            Permission::ReadAcp,
            Permission::WriteAcp,
        ] {
            assert!(!permission_covers(permission, S3Action::PutBucketPolicy));
            assert!(!permission_covers(permission, S3Action::GetLifecycleConfiguration));
        }
    }

    #[test]
    fn test_should_classify_object_actions() {
        assert!(S3Action::GetObject.is_object_action());
        assert!(S3Action::PutObjectTagging.is_object_action());
        assert!(!S3Action::ListBucket.is_object_action());
        assert!(!S3Action::PutBucketPolicy.is_object_action());
    }
}
