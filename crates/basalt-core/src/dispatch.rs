//! The per-operation dispatch pipeline: authorize, MFA gate, handle.

use tracing::debug;

use basalt_access::{AccessRequest, S3Action, evaluate};
use basalt_model::types::BucketConfigKind;
use basalt_model::{S3Error, S3Operation, s3_error};

use crate::ops;
use crate::request::{RequestBody, RequestContext, S3Response};
use crate::state::ServiceState;

/// The action an operation is authorized as.
///
/// `DELETE ?tagging` deliberately authorizes as `s3:PutObjectTagging`,
/// matching upstream behavior (flagged there for confirmation).
#[must_use]
pub fn action_for(op: S3Operation) -> S3Action {
    match op {
        S3Operation::ListBuckets => S3Action::ListBucket,
        S3Operation::CreateBucket => S3Action::CreateBucket,
        S3Operation::HeadBucket | S3Operation::ListObjects | S3Operation::ListObjectsV2 => {
            S3Action::ListBucket
        }
        S3Operation::DeleteBucket => S3Action::DeleteBucket,
        S3Operation::ListObjectVersions => S3Action::ListBucketVersions,
        S3Operation::ListMultipartUploads => S3Action::ListBucketMultipartUploads,
        S3Operation::DeleteObjects | S3Operation::DeleteObject => S3Action::DeleteObject,
        S3Operation::GetBucketAcl => S3Action::GetBucketAcl,
        S3Operation::PutBucketAcl => S3Action::PutBucketAcl,
        S3Operation::GetBucketPolicy => S3Action::GetBucketPolicy,
        S3Operation::PutBucketPolicy => S3Action::PutBucketPolicy,
        S3Operation::DeleteBucketPolicy => S3Action::DeleteBucketPolicy,
        S3Operation::GetBucketVersioning => S3Action::GetBucketVersioning,
        S3Operation::PutBucketVersioning => S3Action::PutBucketVersioning,
        S3Operation::GetBucketTagging => S3Action::GetBucketTagging,
        S3Operation::PutBucketTagging | S3Operation::DeleteBucketTagging => {
            S3Action::PutBucketTagging
        }
        S3Operation::GetBucketLifecycle => S3Action::GetLifecycleConfiguration,
        S3Operation::PutBucketLifecycle | S3Operation::DeleteBucketLifecycle => {
            S3Action::PutLifecycleConfiguration
        }
        S3Operation::GetBucketNotification => S3Action::GetBucketNotification,
        S3Operation::PutBucketNotification => S3Action::PutBucketNotification,
        S3Operation::GetBucketVpcConfig
        | S3Operation::GetBucketReplication
        | S3Operation::GetBucketEncryption
        | S3Operation::GetObjectLockConfiguration => S3Action::GetBucketConfiguration,
        S3Operation::PutBucketVpcConfig
        | S3Operation::PutBucketReplication
        | S3Operation::PutBucketEncryption
        | S3Operation::PutObjectLockConfiguration => S3Action::PutBucketConfiguration,
        S3Operation::PutObject
        | S3Operation::CopyObject
        | S3Operation::CreateMultipartUpload
        | S3Operation::UploadPart
        | S3Operation::UploadPartCopy
        | S3Operation::CompleteMultipartUpload => S3Action::PutObject,
        S3Operation::GetObject | S3Operation::SelectObjectContent => S3Action::GetObject,
        S3Operation::HeadObject => S3Action::HeadObject,
        S3Operation::GetObjectAcl => S3Action::GetObjectAcl,
        S3Operation::PutObjectAcl => S3Action::PutObjectAcl,
        S3Operation::GetObjectTagging => S3Action::GetObjectTagging,
        // The delete-tagging permission follows the source behavior.
        S3Operation::PutObjectTagging | S3Operation::DeleteObjectTagging => {
            S3Action::PutObjectTagging
        }
        S3Operation::AbortMultipartUpload => S3Action::AbortMultipartUpload,
        S3Operation::ListParts => S3Action::ListMultipartUploadParts,
        _ => unreachable!("S3Operation is exhaustively matched above"),
    }
}

/// Whether the MFA-delete gate applies to this operation.
fn requires_mfa(op: S3Operation, ctx: &RequestContext) -> bool {
    match op {
        S3Operation::DeleteObjects => true,
        S3Operation::DeleteObject => ctx.has_query("versionId"),
        _ => false,
    }
}

/// Dispatch one routed, authenticated request to its handler.
///
/// # Errors
///
/// Whatever the evaluator or handler raises; the HTTP layer translates the
/// error into the XML envelope.
#[allow(clippy::too_many_lines)]
pub async fn handle(
    state: &ServiceState,
    op: S3Operation,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    debug!(operation = %op, bucket = ?ctx.bucket, key = ?ctx.key, "dispatching");

    // Authorization. Bulk delete authorizes per key inside its handler,
    // but the bucket-existence guard still runs first.
    if op == S3Operation::ListBuckets {
        // No bucket entity; the handler rejects anonymous callers.
    } else if op == S3Operation::DeleteObjects {
        state.index.get_bucket(ctx.bucket()?)?;
    } else {
        evaluate(
            &state.index,
            state.evaluator_config(),
            &AccessRequest {
                principal: &ctx.principal,
                action: action_for(op),
                bucket: ctx.bucket()?,
                key: ctx.key.as_deref(),
                admin_id: Some(state.admin_id()),
            },
        )?;
    }

    // MFA-delete gate: versioned deletes and bulk deletes on a bucket with
    // MFA delete enabled must present a (non-empty) x-amz-mfa header.
    // Validating the code itself is out of scope.
    if requires_mfa(op, ctx) {
        let record = state.index.get_bucket(ctx.bucket()?)?;
        if record.mfa_delete && ctx.header("x-amz-mfa").is_none_or(str::is_empty) {
            return Err(s3_error!(
                AccessDenied,
                "MFA delete is enabled for this bucket; x-amz-mfa is required"
            ));
        }
    }

    match op {
        S3Operation::ListBuckets => ops::service::list_buckets(state, ctx).await,

        S3Operation::CreateBucket => ops::bucket::create_bucket(state, ctx).await,
        S3Operation::HeadBucket => ops::bucket::head_bucket(state, ctx).await,
        S3Operation::DeleteBucket => ops::bucket::delete_bucket(state, ctx).await,

        S3Operation::ListObjects => ops::list::list_objects(state, ctx, false).await,
        S3Operation::ListObjectsV2 => ops::list::list_objects(state, ctx, true).await,
        S3Operation::ListObjectVersions => ops::list::list_versions(state, ctx).await,
        S3Operation::ListMultipartUploads => {
            ops::list::list_multipart_uploads(state, ctx).await
        }

        S3Operation::DeleteObjects => ops::object::delete_objects(state, ctx, body).await,
        S3Operation::PutObject => ops::object::put_object(state, ctx, body).await,
        S3Operation::CopyObject => ops::object::copy_object(state, ctx).await,
        S3Operation::GetObject => ops::object::get_object(state, ctx).await,
        S3Operation::HeadObject => ops::object::head_object(state, ctx).await,
        S3Operation::DeleteObject => ops::object::delete_object(state, ctx).await,

        S3Operation::GetBucketAcl => ops::bucket_config::get_bucket_acl(state, ctx).await,
        S3Operation::PutBucketAcl => {
            ops::bucket_config::put_bucket_acl(state, ctx, body).await
        }
        S3Operation::GetBucketPolicy => ops::bucket_config::get_bucket_policy(state, ctx).await,
        S3Operation::PutBucketPolicy => {
            ops::bucket_config::put_bucket_policy(state, ctx, body).await
        }
        S3Operation::DeleteBucketPolicy => {
            ops::bucket_config::delete_bucket_policy(state, ctx).await
        }
        S3Operation::GetBucketVersioning => {
            ops::bucket_config::get_bucket_versioning(state, ctx).await
        }
        S3Operation::PutBucketVersioning => {
            ops::bucket_config::put_bucket_versioning(state, ctx, body).await
        }
        S3Operation::GetBucketTagging => {
            ops::bucket_config::get_bucket_tagging(state, ctx).await
        }
        S3Operation::PutBucketTagging => {
            ops::bucket_config::put_bucket_tagging(state, ctx, body).await
        }
        S3Operation::DeleteBucketTagging => {
            ops::bucket_config::delete_bucket_tagging(state, ctx).await
        }
        S3Operation::GetBucketLifecycle => {
            ops::bucket_config::get_bucket_lifecycle(state, ctx).await
        }
        S3Operation::PutBucketLifecycle => {
            ops::bucket_config::put_bucket_lifecycle(state, ctx, body).await
        }
        S3Operation::DeleteBucketLifecycle => {
            ops::bucket_config::delete_bucket_lifecycle(state, ctx).await
        }
        S3Operation::GetBucketNotification => {
            ops::bucket_config::get_bucket_notification(state, ctx).await
        }
        S3Operation::PutBucketNotification => {
            ops::bucket_config::put_bucket_notification(state, ctx, body).await
        }
        S3Operation::GetBucketVpcConfig => {
            ops::bucket_config::get_config_blob(state, ctx, BucketConfigKind::Vpc).await
        }
        S3Operation::PutBucketVpcConfig => {
            ops::bucket_config::put_config_blob(state, ctx, body, BucketConfigKind::Vpc).await
        }
        S3Operation::GetBucketReplication => {
            ops::bucket_config::get_config_blob(state, ctx, BucketConfigKind::Replication).await
        }
        S3Operation::PutBucketReplication => {
            ops::bucket_config::put_config_blob(state, ctx, body, BucketConfigKind::Replication)
                .await
        }
        S3Operation::GetBucketEncryption => {
            ops::bucket_config::get_config_blob(state, ctx, BucketConfigKind::Encryption).await
        }
        S3Operation::PutBucketEncryption => {
            ops::bucket_config::put_config_blob(state, ctx, body, BucketConfigKind::Encryption)
                .await
        }
        S3Operation::GetObjectLockConfiguration => {
            ops::bucket_config::get_config_blob(state, ctx, BucketConfigKind::ObjectLock).await
        }
        S3Operation::PutObjectLockConfiguration => {
            ops::bucket_config::put_config_blob(state, ctx, body, BucketConfigKind::ObjectLock)
                .await
        }

        S3Operation::GetObjectAcl => ops::object_config::get_object_acl(state, ctx).await,
        S3Operation::PutObjectAcl => {
            ops::object_config::put_object_acl(state, ctx, body).await
        }
        S3Operation::GetObjectTagging => {
            ops::object_config::get_object_tagging(state, ctx).await
        }
        S3Operation::PutObjectTagging => {
            ops::object_config::put_object_tagging(state, ctx, body).await
        }
        S3Operation::DeleteObjectTagging => {
            ops::object_config::delete_object_tagging(state, ctx).await
        }
        S3Operation::SelectObjectContent => {
            ops::object_config::select_object_content(state, ctx).await
        }

        S3Operation::CreateMultipartUpload => {
            ops::multipart::create_multipart_upload(state, ctx).await
        }
        S3Operation::UploadPart => ops::multipart::upload_part(state, ctx, body).await,
        S3Operation::UploadPartCopy => ops::multipart::upload_part_copy(state, ctx).await,
        S3Operation::CompleteMultipartUpload => {
            ops::multipart::complete_multipart_upload(state, ctx, body).await
        }
        S3Operation::AbortMultipartUpload => {
            ops::multipart::abort_multipart_upload(state, ctx).await
        }
        S3Operation::ListParts => ops::multipart::list_parts(state, ctx).await,
        _ => unreachable!("S3Operation is exhaustively matched above"),
    }
}
