//! Core record shapes: principals, owners, ACLs, buckets, object versions,
//! multipart uploads, audit events, and batch jobs.
//!
//! These are the types the metadata index persists (as columns or JSON
//! blobs) and the handlers pass around. Field shapes mirror the S3 wire
//! protocol closely enough that the XML layer can serialize them directly.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Group URI matching every principal, including anonymous ones.
pub const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";
/// Group URI matching every non-anonymous principal.
pub const AUTHENTICATED_USERS_URI: &str =
    "http://acs.amazonaws.com/groups/global/AuthenticatedUsers";

// ---------------------------------------------------------------------------
// Principal / Owner
// ---------------------------------------------------------------------------

/// The caller identity resolved by the authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// An unauthenticated request.
    Anonymous,
    /// An authenticated account.
    User {
        /// The canonical user id.
        canonical_id: String,
        /// The display name shown in listings and ACLs.
        display_name: String,
    },
}

impl Principal {
    /// Build a user principal.
    #[must_use]
    pub fn user(canonical_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::User {
            canonical_id: canonical_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Returns the canonical id, if authenticated.
    #[must_use]
    pub fn canonical_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User { canonical_id, .. } => Some(canonical_id),
        }
    }

    /// Whether this principal is anonymous.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Convert to an [`Owner`], substituting the anonymous placeholder for
    /// unauthenticated callers.
    #[must_use]
    pub fn to_owner(&self) -> Owner {
        match self {
            Self::Anonymous => Owner {
                id: "anonymous".to_owned(),
                display_name: "anonymous".to_owned(),
            },
            Self::User {
                canonical_id,
                display_name,
            } => Owner {
                id: canonical_id.clone(),
                display_name: display_name.clone(),
            },
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::User { display_name, .. } => f.write_str(display_name),
        }
    }
}

/// The owner of a bucket or object version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    /// The canonical user id.
    pub id: String,
    /// The display name.
    pub display_name: String,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.display_name, self.id)
    }
}

// ---------------------------------------------------------------------------
// ACL: grants, grantees, permissions
// ---------------------------------------------------------------------------

/// A permission granted to a grantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    /// READ, WRITE, READ_ACP and WRITE_ACP combined.
    FullControl,
    /// List the bucket or read object data.
    Read,
    /// Create and delete objects.
    Write,
    /// Read the ACL itself.
    ReadAcp,
    /// Replace the ACL itself.
    WriteAcp,
}

impl Permission {
    /// Returns the wire representation (e.g. `FULL_CONTROL`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullControl => "FULL_CONTROL",
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::ReadAcp => "READ_ACP",
            Self::WriteAcp => "WRITE_ACP",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`Permission`] fails.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown permission: {0}")]
pub struct ParsePermissionError(String);

impl FromStr for Permission {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FULL_CONTROL" => Ok(Self::FullControl),
            "READ" => Ok(Self::Read),
            "WRITE" => Ok(Self::Write),
            "READ_ACP" => Ok(Self::ReadAcp),
            "WRITE_ACP" => Ok(Self::WriteAcp),
            _ => Err(ParsePermissionError(s.to_owned())),
        }
    }
}

/// The subject of an ACL grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Grantee {
    /// A canonical user identified by account id.
    CanonicalUser {
        /// The canonical user id.
        id: String,
        /// The display name.
        display_name: String,
    },
    /// A predefined group identified by URI.
    Group {
        /// The group URI (`AllUsers` or `AuthenticatedUsers`).
        uri: String,
    },
}

/// A grantee/permission pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// The entity receiving the permission.
    pub grantee: Grantee,
    /// The permission granted.
    pub permission: Permission,
}

/// An access control policy: the owner plus an ordered list of grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlPolicy {
    /// The resource owner.
    pub owner: Owner,
    /// The grants, evaluated in order.
    pub grants: Vec<Grant>,
}

impl AccessControlPolicy {
    /// The `private` ACL: owner-only full control.
    #[must_use]
    pub fn private(owner: Owner) -> Self {
        let grantee = Grantee::CanonicalUser {
            id: owner.id.clone(),
            display_name: owner.display_name.clone(),
        };
        Self {
            owner,
            grants: vec![Grant {
                grantee,
                permission: Permission::FullControl,
            }],
        }
    }

    /// Expand a canned ACL into an explicit grant list.
    #[must_use]
    pub fn canned(owner: Owner, acl: CannedAcl) -> Self {
        let mut policy = Self::private(owner);
        match acl {
            CannedAcl::Private => {}
            CannedAcl::PublicRead => policy.grants.push(Grant {
                grantee: Grantee::Group {
                    uri: ALL_USERS_URI.to_owned(),
                },
                permission: Permission::Read,
            }),
            CannedAcl::PublicReadWrite => {
                for permission in [Permission::Read, Permission::Write] {
                    policy.grants.push(Grant {
                        grantee: Grantee::Group {
                            uri: ALL_USERS_URI.to_owned(),
                        },
                        permission,
                    });
                }
            }
            CannedAcl::AuthenticatedRead => policy.grants.push(Grant {
                grantee: Grantee::Group {
                    uri: AUTHENTICATED_USERS_URI.to_owned(),
                },
                permission: Permission::Read,
            }),
        }
        policy
    }
}

/// Predefined ACLs accepted in the `x-amz-acl` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CannedAcl {
    /// Owner-only full control.
    #[default]
    Private,
    /// Owner full control plus `AllUsers` read.
    PublicRead,
    /// Owner full control plus `AllUsers` read and write.
    PublicReadWrite,
    /// Owner full control plus `AuthenticatedUsers` read.
    AuthenticatedRead,
}

/// Error returned when parsing a [`CannedAcl`] fails.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown canned ACL: {0}")]
pub struct ParseCannedAclError(String);

impl FromStr for CannedAcl {
    type Err = ParseCannedAclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "public-read" => Ok(Self::PublicRead),
            "public-read-write" => Ok(Self::PublicReadWrite),
            "authenticated-read" => Ok(Self::AuthenticatedRead),
            _ => Err(ParseCannedAclError(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// Per-bucket versioning state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersioningState {
    /// Versioning has never been enabled.
    #[default]
    Unversioned,
    /// Versioning is enabled; writes append new versions.
    Enabled,
    /// Versioning was enabled and is now suspended.
    Suspended,
}

impl VersioningState {
    /// Returns the wire value, or `None` when never enabled (the
    /// `GetBucketVersioning` response omits the status element then).
    #[must_use]
    pub fn wire_status(&self) -> Option<&'static str> {
        match self {
            Self::Unversioned => None,
            Self::Enabled => Some("Enabled"),
            Self::Suspended => Some("Suspended"),
        }
    }

    /// Parse the wire value.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "Enabled" => Some(Self::Enabled),
            "Suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

/// A bucket row.
#[derive(Debug, Clone)]
pub struct BucketRecord {
    /// The bucket name (primary key).
    pub name: String,
    /// The region the bucket reports.
    pub region: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// The owning principal.
    pub owner: Owner,
    /// Versioning state.
    pub versioning: VersioningState,
    /// Whether MFA delete is required for versioned deletes.
    pub mfa_delete: bool,
    /// The bucket ACL.
    pub acl: AccessControlPolicy,
    /// Bucket tags.
    pub tags: Vec<Tag>,
}

/// The configuration kinds stored per bucket as opaque documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketConfigKind {
    /// Bucket policy (JSON).
    Policy,
    /// Lifecycle configuration (JSON mirror of the XML).
    Lifecycle,
    /// Notification configuration.
    Notification,
    /// VPC configuration blob.
    Vpc,
    /// Replication configuration blob.
    Replication,
    /// Server-side encryption configuration blob.
    Encryption,
    /// Object-lock configuration blob.
    ObjectLock,
}

impl BucketConfigKind {
    /// Returns the column value used in the config table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::Lifecycle => "lifecycle",
            Self::Notification => "notification",
            Self::Vpc => "vpc",
            Self::Replication => "replication",
            Self::Encryption => "encryption",
            Self::ObjectLock => "object-lock",
        }
    }
}

// ---------------------------------------------------------------------------
// Object versions
// ---------------------------------------------------------------------------

/// A tag on a bucket or object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// The tag key.
    pub key: String,
    /// The tag value.
    pub value: String,
}

/// Checksum data attached to an object version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumData {
    /// The checksum algorithm (e.g. `SHA256`).
    pub algorithm: String,
    /// The checksum value.
    pub value: String,
}

/// Metadata captured with an object at write time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    /// The MIME type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Content encoding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// Cache-control directives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// Content disposition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    /// User metadata from `x-amz-meta-*` headers, lowercased names without
    /// the prefix.
    #[serde(default)]
    pub user_metadata: HashMap<String, String>,
}

/// One object version row: a stored snapshot or a delete marker.
///
/// Identified by (bucket, key, version_id); the bucket is carried by
/// context, not by the record. The reserved version id `"null"` names the
/// sole version of an unversioned bucket.
#[derive(Debug, Clone)]
pub struct ObjectVersion {
    /// The object key.
    pub key: String,
    /// The version id (`"null"` in unversioned buckets).
    pub version_id: String,
    /// Object size in bytes (0 for delete markers).
    pub size: u64,
    /// The entity tag (quoted hex MD5, composite for multipart).
    pub etag: String,
    /// Last-modified timestamp.
    pub last_modified: DateTime<Utc>,
    /// Whether this row is the current version for its key.
    pub is_latest: bool,
    /// Whether this row is a delete marker (no body on disk).
    pub is_delete_marker: bool,
    /// The storage class (`STANDARD` unless the client sent another).
    pub storage_class: String,
    /// The owning principal.
    pub owner: Owner,
    /// Metadata captured at write time.
    pub metadata: ObjectMetadata,
    /// Optional checksum data.
    pub checksum: Option<ChecksumData>,
    /// Part count for multipart objects.
    pub parts_count: Option<u32>,
    /// Version ACL, when one was set explicitly.
    pub acl: Option<AccessControlPolicy>,
    /// Version tags.
    pub tags: Vec<Tag>,
}

/// The reserved version id of unversioned objects.
pub const NULL_VERSION_ID: &str = "null";

// ---------------------------------------------------------------------------
// Multipart uploads
// ---------------------------------------------------------------------------

/// An in-progress multipart upload record.
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    /// The upload id.
    pub upload_id: String,
    /// The destination bucket.
    pub bucket: String,
    /// The destination key.
    pub key: String,
    /// When the upload was initiated.
    pub initiated: DateTime<Utc>,
    /// The initiating principal.
    pub owner: Owner,
    /// Metadata captured at initiation and applied on completion.
    pub metadata: ObjectMetadata,
}

/// A staged part within a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadPart {
    /// The 1-based part number.
    pub part_number: u32,
    /// Part size in bytes.
    pub size: u64,
    /// The part ETag (quoted hex MD5).
    pub etag: String,
    /// When the part was uploaded (last replacement wins).
    pub last_modified: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Audit events
// ---------------------------------------------------------------------------

/// An immutable audit record, appended for every dispatched operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Unique event id.
    pub id: String,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// The event type (operation name).
    pub event_type: String,
    /// The acting principal's display form.
    pub principal: String,
    /// Source IP address, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    /// The client user agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// The request id the response carried.
    pub request_id: String,
    /// The target bucket, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// The target key, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// The operation name.
    pub operation: String,
    /// The terminal HTTP status.
    pub status: u16,
    /// The error message for failed requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Free-form additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Batch jobs
// ---------------------------------------------------------------------------

/// Batch job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchJobStatus {
    /// Created, manifest not yet validated.
    Pending,
    /// Manifest validated, awaiting activation.
    Ready,
    /// Currently processed by workers.
    Active,
    /// Temporarily paused.
    Paused,
    /// Finished successfully.
    Complete,
    /// Finished with a terminal failure.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl BatchJobStatus {
    /// Returns the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Ready => "Ready",
            Self::Active => "Active",
            Self::Paused => "Paused",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// `Pending → Ready → Active → {Complete, Failed, Cancelled}` with
    /// `Paused ⇄ Active`; any non-terminal state may be cancelled or failed.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        if *self == next {
            return false;
        }
        match self {
            Self::Pending => matches!(next, Self::Ready | Self::Failed | Self::Cancelled),
            Self::Ready => matches!(next, Self::Active | Self::Failed | Self::Cancelled),
            Self::Active => matches!(
                next,
                Self::Paused | Self::Complete | Self::Failed | Self::Cancelled
            ),
            Self::Paused => matches!(next, Self::Active | Self::Failed | Self::Cancelled),
            Self::Complete | Self::Failed | Self::Cancelled => false,
        }
    }

    /// Whether this state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }
}

/// Error returned when parsing a [`BatchJobStatus`] fails.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown batch job status: {0}")]
pub struct ParseBatchJobStatusError(String);

impl FromStr for BatchJobStatus {
    type Err = ParseBatchJobStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Ready" => Ok(Self::Ready),
            "Active" => Ok(Self::Active),
            "Paused" => Ok(Self::Paused),
            "Complete" => Ok(Self::Complete),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseBatchJobStatusError(s.to_owned())),
        }
    }
}

/// Progress counters for a batch job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    /// Total tasks in the manifest.
    pub total: u64,
    /// Tasks processed so far.
    pub processed: u64,
    /// Tasks that failed.
    pub failed: u64,
}

/// A batch job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    /// Unique job id.
    pub id: String,
    /// The operation workers would apply (e.g. `S3PutObjectCopy`).
    pub operation_type: String,
    /// Operation parameters.
    pub parameters: serde_json::Value,
    /// Where the manifest CSV lives.
    pub manifest_location: String,
    /// Current status.
    pub status: BatchJobStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Completion time, for terminal jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Accumulated failure reasons.
    #[serde(default)]
    pub failure_reasons: Vec<String>,
    /// Progress counters.
    pub progress: JobProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_expand_canned_acls() {
        let owner = Owner {
            id: "abc".to_owned(),
            display_name: "alice".to_owned(),
        };

        let private = AccessControlPolicy::canned(owner.clone(), CannedAcl::Private);
        assert_eq!(private.grants.len(), 1);
        assert_eq!(private.grants[0].permission, Permission::FullControl);

        let public = AccessControlPolicy::canned(owner.clone(), CannedAcl::PublicRead);
        assert_eq!(public.grants.len(), 2);
        assert!(matches!(
            &public.grants[1].grantee,
            Grantee::Group { uri } if uri == ALL_USERS_URI
        ));

        let rw = AccessControlPolicy::canned(owner, CannedAcl::PublicReadWrite);
        assert_eq!(rw.grants.len(), 3);
    }

    #[test]
    fn test_should_parse_canned_acl_strings() {
        assert_eq!(
            "public-read".parse::<CannedAcl>().ok(),
            Some(CannedAcl::PublicRead)
        );
        assert!("no-such-acl".parse::<CannedAcl>().is_err());
    }

    #[test]
    fn test_should_parse_permission_strings() {
        assert_eq!(
            "FULL_CONTROL".parse::<Permission>().ok(),
            Some(Permission::FullControl)
        );
        assert_eq!(Permission::ReadAcp.as_str(), "READ_ACP");
        assert!("READ_EVERYTHING".parse::<Permission>().is_err());
    }

    #[test]
    fn test_should_map_versioning_wire_values() {
        assert_eq!(VersioningState::Unversioned.wire_status(), None);
        assert_eq!(VersioningState::Enabled.wire_status(), Some("Enabled"));
        assert_eq!(
            VersioningState::from_wire("Suspended"),
            Some(VersioningState::Suspended)
        );
        assert_eq!(VersioningState::from_wire("bogus"), None);
    }

    #[test]
    fn test_should_convert_principal_to_owner() {
        let p = Principal::user("id-1", "alice");
        let owner = p.to_owner();
        assert_eq!(owner.id, "id-1");
        assert!(!p.is_anonymous());

        let anon = Principal::Anonymous.to_owner();
        assert_eq!(anon.id, "anonymous");
        assert!(Principal::Anonymous.is_anonymous());
    }

    #[test]
    fn test_should_enforce_batch_job_transitions() {
        use BatchJobStatus::{Active, Cancelled, Complete, Failed, Paused, Pending, Ready};

        assert!(Pending.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Active));
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Active.can_transition_to(Complete));
        assert!(Active.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Active));
        assert!(!Complete.can_transition_to(Active));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Active.can_transition_to(Active));
        assert!(Complete.is_terminal());
        assert!(!Paused.is_terminal());
    }

    #[test]
    fn test_should_serialize_audit_event_without_empty_fields() {
        let event = AuditEvent {
            id: "e1".to_owned(),
            timestamp: Utc::now(),
            event_type: "PutObject".to_owned(),
            principal: "alice".to_owned(),
            source_ip: None,
            user_agent: None,
            request_id: "r1".to_owned(),
            bucket: Some("b1".to_owned()),
            key: None,
            operation: "PutObject".to_owned(),
            status: 200,
            error_message: None,
            additional_data: None,
        };
        let json = serde_json::to_string(&event).expect("serialize audit event");
        assert!(json.contains("\"eventType\":\"PutObject\""));
        assert!(!json.contains("sourceIp"));
        assert!(!json.contains("errorMessage"));
    }
}
