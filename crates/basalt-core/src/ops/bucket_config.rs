//! Bucket configuration handlers: ACL, policy, versioning, tagging,
//! lifecycle, notification, and the opaque configuration blobs (VPC,
//! replication, encryption, object lock).

use basalt_model::lifecycle::LifecycleConfiguration;
use basalt_model::notification::NotificationConfiguration;
use basalt_model::policy::PolicyDocument;
use basalt_model::types::{AccessControlPolicy, BucketConfigKind, VersioningState};
use basalt_model::{S3Error, S3ErrorCode, s3_error};
use basalt_xml::deserialize::{TaggingRequest, VersioningRequest};
use basalt_xml::responses::VersioningView;
use basalt_xml::serialize::TagSetView;
use basalt_xml::{from_xml, to_xml};
use bytes::Bytes;

use crate::request::{RequestBody, RequestContext, S3Response};
use crate::state::ServiceState;

use super::util::acl_from_headers;

fn xml_response<T: basalt_xml::S3Serialize>(root: &str, value: &T) -> Result<S3Response, S3Error> {
    let document = to_xml(root, value)
        .map_err(|e| S3Error::internal("failed to serialize configuration").with_source(e))?;
    Ok(S3Response::xml(document))
}

// ---------------------------------------------------------------------------
// ACL
// ---------------------------------------------------------------------------

/// `GET /bucket?acl`.
pub(crate) async fn get_bucket_acl(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let record = state.index.get_bucket(ctx.bucket()?)?;
    xml_response("AccessControlPolicy", &record.acl)
}

/// `PUT /bucket?acl` — explicit XML document or `x-amz-acl` canned value.
pub(crate) async fn put_bucket_acl(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let record = state.index.get_bucket(bucket)?;

    let payload = body.collect().await?;
    let acl = parse_acl_request(ctx, &payload, &record.acl)?;
    state.index.set_bucket_acl(bucket, &acl)?;
    Ok(S3Response::ok())
}

/// Shared ACL-request parsing: an XML body wins, otherwise the canned
/// header expanded against the current owner.
pub(crate) fn parse_acl_request(
    ctx: &RequestContext,
    payload: &Bytes,
    current: &AccessControlPolicy,
) -> Result<AccessControlPolicy, S3Error> {
    if !payload.is_empty() {
        return from_xml::<AccessControlPolicy>(payload)
            .map_err(|e| S3Error::with_message(S3ErrorCode::MalformedXML, e.to_string()));
    }
    match acl_from_headers(ctx, current.owner.clone())? {
        Some(acl) => Ok(acl),
        None => Err(s3_error!(
            InvalidRequest,
            "either an ACL document or x-amz-acl is required"
        )),
    }
}

// ---------------------------------------------------------------------------
// Policy (JSON)
// ---------------------------------------------------------------------------

/// `GET /bucket?policy`.
pub(crate) async fn get_bucket_policy(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let document = state
        .index
        .get_bucket_config(ctx.bucket()?, BucketConfigKind::Policy)?;
    Ok(S3Response::json(document))
}

/// `PUT /bucket?policy`.
pub(crate) async fn put_bucket_policy(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let payload = body.collect().await?;
    // Reject documents the evaluator could not honor later.
    PolicyDocument::parse(&payload)
        .map_err(|e| S3Error::with_message(S3ErrorCode::MalformedPolicy, e.to_string()))?;
    let document = std::str::from_utf8(&payload)
        .map_err(|_| S3Error::new(S3ErrorCode::MalformedPolicy))?;
    state
        .index
        .set_bucket_config(bucket, BucketConfigKind::Policy, document)?;
    Ok(S3Response::no_content())
}

/// `DELETE /bucket?policy`.
pub(crate) async fn delete_bucket_policy(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    state
        .index
        .delete_bucket_config(ctx.bucket()?, BucketConfigKind::Policy)?;
    Ok(S3Response::no_content())
}

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// `GET /bucket?versioning`.
pub(crate) async fn get_bucket_versioning(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let record = state.index.get_bucket(ctx.bucket()?)?;
    let view = VersioningView {
        status: record.versioning.wire_status(),
        mfa_delete: match record.versioning {
            VersioningState::Unversioned => None,
            _ => Some(if record.mfa_delete { "Enabled" } else { "Disabled" }),
        },
    };
    xml_response("VersioningConfiguration", &view)
}

/// `PUT /bucket?versioning`.
pub(crate) async fn put_bucket_versioning(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let payload = body.collect().await?;
    let request: VersioningRequest = from_xml(&payload)
        .map_err(|e| S3Error::with_message(S3ErrorCode::MalformedXML, e.to_string()))?;

    let state_value = match request.status.as_deref() {
        Some("Enabled") => VersioningState::Enabled,
        Some("Suspended") => VersioningState::Suspended,
        Some(other) => {
            return Err(S3Error::invalid_argument(format!(
                "invalid versioning status: {other}"
            )));
        }
        None => state.index.get_bucket(bucket)?.versioning,
    };
    let mfa_delete = match request.mfa_delete.as_deref() {
        Some("Enabled") => Some(true),
        Some("Disabled") => Some(false),
        Some(other) => {
            return Err(S3Error::invalid_argument(format!(
                "invalid MfaDelete value: {other}"
            )));
        }
        None => None,
    };

    state.index.set_versioning(bucket, state_value, mfa_delete)?;
    Ok(S3Response::ok())
}

// ---------------------------------------------------------------------------
// Tagging
// ---------------------------------------------------------------------------

/// `GET /bucket?tagging` — an empty tag set answers an empty `TagSet`.
pub(crate) async fn get_bucket_tagging(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let record = state.index.get_bucket(ctx.bucket()?)?;
    xml_response("Tagging", &TagSetView(&record.tags))
}

/// `PUT /bucket?tagging`.
pub(crate) async fn put_bucket_tagging(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let payload = body.collect().await?;
    let request: TaggingRequest = from_xml(&payload)
        .map_err(|e| S3Error::with_message(S3ErrorCode::MalformedXML, e.to_string()))?;
    state.index.set_bucket_tags(bucket, &request.tags)?;
    Ok(S3Response::no_content())
}

/// `DELETE /bucket?tagging`.
pub(crate) async fn delete_bucket_tagging(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    state.index.set_bucket_tags(ctx.bucket()?, &[])?;
    Ok(S3Response::no_content())
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// `GET /bucket?lifecycle`.
pub(crate) async fn get_bucket_lifecycle(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let document = state
        .index
        .get_bucket_config(ctx.bucket()?, BucketConfigKind::Lifecycle)?;
    let config: LifecycleConfiguration = serde_json::from_str(&document)
        .map_err(|e| S3Error::internal("stored lifecycle unreadable").with_source(e))?;
    xml_response("LifecycleConfiguration", &config)
}

/// `PUT /bucket?lifecycle` — the XML is parsed into the typed model and
/// persisted as JSON for the janitor.
pub(crate) async fn put_bucket_lifecycle(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let payload = body.collect().await?;
    let config: LifecycleConfiguration = from_xml(&payload)
        .map_err(|e| S3Error::with_message(S3ErrorCode::MalformedXML, e.to_string()))?;
    let document = serde_json::to_string(&config)
        .map_err(|e| S3Error::internal("failed to encode lifecycle").with_source(e))?;
    state
        .index
        .set_bucket_config(bucket, BucketConfigKind::Lifecycle, &document)?;
    Ok(S3Response::ok())
}

/// `DELETE /bucket?lifecycle`.
pub(crate) async fn delete_bucket_lifecycle(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    state
        .index
        .delete_bucket_config(ctx.bucket()?, BucketConfigKind::Lifecycle)?;
    Ok(S3Response::no_content())
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// `GET /bucket?notification` — absence answers the empty configuration.
pub(crate) async fn get_bucket_notification(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let config = match state
        .index
        .get_bucket_config(ctx.bucket()?, BucketConfigKind::Notification)
    {
        Ok(document) => serde_json::from_str(&document)
            .map_err(|e| S3Error::internal("stored notification unreadable").with_source(e))?,
        Err(basalt_index::IndexError::NoSuchConfig(_)) => NotificationConfiguration::default(),
        Err(e) => return Err(e.into()),
    };
    xml_response("NotificationConfiguration", &config)
}

/// `PUT /bucket?notification`.
pub(crate) async fn put_bucket_notification(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let payload = body.collect().await?;
    let config: NotificationConfiguration = from_xml(&payload)
        .map_err(|e| S3Error::with_message(S3ErrorCode::MalformedXML, e.to_string()))?;
    let document = serde_json::to_string(&config)
        .map_err(|e| S3Error::internal("failed to encode notification").with_source(e))?;
    state
        .index
        .set_bucket_config(bucket, BucketConfigKind::Notification, &document)?;
    Ok(S3Response::ok())
}

// ---------------------------------------------------------------------------
// Opaque configuration blobs
// ---------------------------------------------------------------------------

/// `GET` for a blob-shaped configuration (VPC, replication, encryption,
/// object lock): the stored document is echoed verbatim; absence answers
/// an empty JSON document.
pub(crate) async fn get_config_blob(
    state: &ServiceState,
    ctx: &RequestContext,
    kind: BucketConfigKind,
) -> Result<S3Response, S3Error> {
    match state.index.get_bucket_config(ctx.bucket()?, kind) {
        Ok(document) => {
            // Preserve whichever dialect the client stored.
            let response = if document.trim_start().starts_with('<') {
                S3Response::xml(document.into_bytes())
            } else {
                S3Response::json(document)
            };
            Ok(response)
        }
        Err(basalt_index::IndexError::NoSuchConfig(_)) => Ok(S3Response::json("{}")),
        Err(e) => Err(e.into()),
    }
}

/// `PUT` for a blob-shaped configuration: store the body verbatim.
pub(crate) async fn put_config_blob(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
    kind: BucketConfigKind,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let payload = body.collect().await?;
    let document = std::str::from_utf8(&payload)
        .map_err(|_| s3_error!(InvalidRequest, "configuration must be UTF-8"))?;
    state.index.set_bucket_config(bucket, kind, document)?;
    Ok(S3Response::ok())
}
