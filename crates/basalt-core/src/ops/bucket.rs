//! Bucket CRUD handlers.

use chrono::Utc;

use basalt_model::S3Error;
use basalt_model::types::{AccessControlPolicy, BucketRecord, VersioningState};

use crate::request::{RequestContext, S3Response};
use crate::state::ServiceState;
use crate::validation::validate_bucket_name;

use super::util::acl_from_headers;

/// `PUT /bucket` — create a bucket.
pub(crate) async fn create_bucket(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let name = ctx.bucket()?;
    validate_bucket_name(name)?;

    let owner = ctx.principal.to_owner();
    let acl = acl_from_headers(ctx, owner.clone())?
        .unwrap_or_else(|| AccessControlPolicy::private(owner.clone()));

    let record = BucketRecord {
        name: name.to_owned(),
        region: state.config.region.clone(),
        created_at: Utc::now(),
        owner,
        versioning: VersioningState::Unversioned,
        mfa_delete: false,
        acl,
        tags: Vec::new(),
    };
    state.index.create_bucket(&record)?;

    Ok(S3Response::ok().header("Location", format!("/{name}")))
}

/// `HEAD /bucket` — existence check. The evaluator has already answered
/// `NoSuchBucket` for missing buckets.
pub(crate) async fn head_bucket(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let record = state.index.get_bucket(ctx.bucket()?)?;
    Ok(S3Response::ok().header("x-amz-bucket-region", record.region))
}

/// `DELETE /bucket` — delete an empty bucket and its blob directory.
pub(crate) async fn delete_bucket(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let name = ctx.bucket()?;
    state.index.delete_bucket(name)?;
    state.store.delete_bucket(name).await?;
    Ok(S3Response::no_content())
}
