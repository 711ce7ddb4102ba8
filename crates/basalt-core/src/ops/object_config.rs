//! Object-scoped configuration handlers: ACL, tagging, and the
//! unimplemented select operation.

use basalt_model::types::AccessControlPolicy;
use basalt_model::{S3Error, S3ErrorCode};
use basalt_xml::deserialize::TaggingRequest;
use basalt_xml::serialize::TagSetView;
use basalt_xml::{from_xml, to_xml};

use crate::request::{RequestBody, RequestContext, S3Response};
use crate::state::ServiceState;

use super::bucket_config::parse_acl_request;

fn xml_response<T: basalt_xml::S3Serialize>(root: &str, value: &T) -> Result<S3Response, S3Error> {
    let document = to_xml(root, value)
        .map_err(|e| S3Error::internal("failed to serialize configuration").with_source(e))?;
    Ok(S3Response::xml(document))
}

/// `GET /bucket/key?acl` — the stored ACL or the implicit private one.
pub(crate) async fn get_object_acl(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let version = state.index.get_version(
        ctx.bucket()?,
        ctx.key()?,
        ctx.query_value("versionId"),
    )?;
    if version.is_delete_marker {
        return Err(S3Error::no_such_key(ctx.key()?.to_owned()));
    }
    let acl = version
        .acl
        .unwrap_or_else(|| AccessControlPolicy::private(version.owner));
    xml_response("AccessControlPolicy", &acl)
}

/// `PUT /bucket/key?acl`.
pub(crate) async fn put_object_acl(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    let version = state
        .index
        .get_version(bucket, key, ctx.query_value("versionId"))?;
    if version.is_delete_marker {
        return Err(S3Error::no_such_key(key.to_owned()));
    }

    let current = version
        .acl
        .clone()
        .unwrap_or_else(|| AccessControlPolicy::private(version.owner.clone()));
    let payload = body.collect().await?;
    let acl = parse_acl_request(ctx, &payload, &current)?;
    state
        .index
        .set_object_acl(bucket, key, &version.version_id, &acl)?;
    Ok(S3Response::ok())
}

/// `GET /bucket/key?tagging`.
pub(crate) async fn get_object_tagging(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let version = state.index.get_version(
        ctx.bucket()?,
        ctx.key()?,
        ctx.query_value("versionId"),
    )?;
    if version.is_delete_marker {
        return Err(S3Error::no_such_key(ctx.key()?.to_owned()));
    }
    xml_response("Tagging", &TagSetView(&version.tags))
}

/// `PUT /bucket/key?tagging`.
pub(crate) async fn put_object_tagging(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    let version = state
        .index
        .get_version(bucket, key, ctx.query_value("versionId"))?;
    if version.is_delete_marker {
        return Err(S3Error::no_such_key(key.to_owned()));
    }

    let payload = body.collect().await?;
    let request: TaggingRequest = from_xml(&payload)
        .map_err(|e| S3Error::with_message(S3ErrorCode::MalformedXML, e.to_string()))?;
    state
        .index
        .set_object_tags(bucket, key, &version.version_id, &request.tags)?;
    Ok(S3Response::ok())
}

/// `DELETE /bucket/key?tagging` — clears the tag set.
pub(crate) async fn delete_object_tagging(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    let version = state
        .index
        .get_version(bucket, key, ctx.query_value("versionId"))?;
    if version.is_delete_marker {
        return Err(S3Error::no_such_key(key.to_owned()));
    }
    state
        .index
        .set_object_tags(bucket, key, &version.version_id, &[])?;
    Ok(S3Response::no_content())
}

/// `POST /bucket/key?select` — not implemented.
pub(crate) async fn select_object_content(
    _state: &ServiceState,
    _ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    Err(S3Error::not_implemented("SelectObjectContent"))
}
