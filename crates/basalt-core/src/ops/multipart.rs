//! Multipart upload handlers, thin wrappers over the coordinator.

use chrono::Utc;

use basalt_access::{AccessRequest, S3Action, evaluate};
use basalt_model::{S3Error, S3ErrorCode, s3_error};
use basalt_store::{parse_range_header, resolve_range};
use basalt_xml::deserialize::CompleteUploadRequest;
use basalt_xml::responses::{
    CompleteUploadResult, CopyResult, InitiateUploadResult, ListPartsPage, PartSummary,
};
use basalt_xml::{from_xml, to_xml};

use crate::multipart;
use crate::notify;
use crate::request::{RequestBody, RequestContext, S3Response};
use crate::state::ServiceState;
use crate::validation::{validate_metadata, validate_object_key};

use super::object::parse_copy_source;
use super::util::{extract_metadata, version_id_header};

fn required_upload_id(ctx: &RequestContext) -> Result<&str, S3Error> {
    ctx.query_value("uploadId")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| s3_error!(InvalidArgument, "missing uploadId"))
}

fn required_part_number(ctx: &RequestContext) -> Result<u32, S3Error> {
    ctx.query_value("partNumber")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| s3_error!(InvalidArgument, "missing or invalid partNumber"))
}

/// `POST /bucket/key?uploads`.
pub(crate) async fn create_multipart_upload(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    validate_object_key(key)?;

    let metadata = extract_metadata(&ctx.headers);
    validate_metadata(&metadata.user_metadata)?;

    let upload_id = multipart::initiate(state, bucket, key, metadata, &ctx.principal).await?;
    let document = to_xml(
        "InitiateMultipartUploadResult",
        &InitiateUploadResult {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            upload_id,
        },
    )
    .map_err(|e| S3Error::internal("failed to serialize initiate result").with_source(e))?;
    Ok(S3Response::xml(document))
}

/// `PUT /bucket/key?partNumber=N&uploadId=U`.
pub(crate) async fn upload_part(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    let upload_id = required_upload_id(ctx)?;
    let part_number = required_part_number(ctx)?;

    let etag = multipart::upload_part(
        state,
        bucket,
        key,
        upload_id,
        part_number,
        body.into_stream(),
        ctx.content_length(),
    )
    .await?;
    Ok(S3Response::ok().header("ETag", etag))
}

/// `PUT /bucket/key?partNumber=N&uploadId=U` with `x-amz-copy-source`.
pub(crate) async fn upload_part_copy(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    let upload_id = required_upload_id(ctx)?;
    let part_number = required_part_number(ctx)?;

    let source_header = ctx
        .header("x-amz-copy-source")
        .ok_or_else(|| s3_error!(InvalidRequest, "missing x-amz-copy-source"))?;
    let source = parse_copy_source(source_header)?;

    evaluate(
        &state.index,
        state.evaluator_config(),
        &AccessRequest {
            principal: &ctx.principal,
            action: S3Action::GetObject,
            bucket: &source.bucket,
            key: Some(&source.key),
            admin_id: Some(state.admin_id()),
        },
    )?;

    let src_version =
        state
            .index
            .get_version(&source.bucket, &source.key, source.version_id.as_deref())?;
    if src_version.is_delete_marker {
        return Err(S3Error::no_such_key(source.key));
    }

    // x-amz-copy-source-range follows the same grammar as Range.
    let range = match ctx
        .header("x-amz-copy-source-range")
        .and_then(parse_range_header)
    {
        Some(spec) => match resolve_range(spec, src_version.size) {
            Some(bounds) => Some(bounds),
            None => return Err(S3Error::invalid_range(src_version.size)),
        },
        None => None,
    };

    let (len, stream) = state
        .store
        .read_stream(&source.bucket, &source.key, &src_version.version_id, range)
        .await?;
    let etag =
        multipart::upload_part(state, bucket, key, upload_id, part_number, stream, Some(len))
            .await?;

    let document = to_xml(
        "CopyPartResult",
        &CopyResult {
            etag,
            last_modified: Utc::now(),
        },
    )
    .map_err(|e| S3Error::internal("failed to serialize copy part result").with_source(e))?;
    Ok(S3Response::xml(document))
}

/// `POST /bucket/key?uploadId=U`.
pub(crate) async fn complete_multipart_upload(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    let upload_id = required_upload_id(ctx)?;

    let payload = body.collect().await?;
    let request: CompleteUploadRequest = from_xml(&payload)
        .map_err(|e| S3Error::with_message(S3ErrorCode::MalformedXML, e.to_string()))?;

    let (etag, version_id) =
        multipart::complete(state, bucket, key, upload_id, &request.parts).await?;
    crate::metrics::Metrics::incr(&state.metrics.objects_written_total);
    notify::emit(
        state,
        bucket,
        notify::OBJECT_CREATED_COMPLETE_MULTIPART,
        key,
    );

    let location = format!(
        "http://{}/{}/{}",
        ctx.header("host").unwrap_or("localhost"),
        bucket,
        key
    );
    let document = to_xml(
        "CompleteMultipartUploadResult",
        &CompleteUploadResult {
            location,
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            etag,
        },
    )
    .map_err(|e| S3Error::internal("failed to serialize complete result").with_source(e))?;
    Ok(S3Response::xml(document)
        .optional_header("x-amz-version-id", version_id_header(&version_id)))
}

/// `DELETE /bucket/key?uploadId=U`.
pub(crate) async fn abort_multipart_upload(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let upload_id = required_upload_id(ctx)?;
    multipart::abort(state, upload_id).await?;
    Ok(S3Response::no_content())
}

/// `GET /bucket/key?uploadId=U`.
pub(crate) async fn list_parts(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    let upload_id = required_upload_id(ctx)?;

    let owner = multipart::upload_owner(state, bucket, key, upload_id)?;
    let max_parts = ctx
        .query_value("max-parts")
        .and_then(|v| v.parse().ok())
        .unwrap_or(state.config.max_keys);

    let mut parts = state.index.list_parts(upload_id)?;
    let is_truncated = parts.len() > max_parts;
    parts.truncate(max_parts);

    let response = ListPartsPage {
        bucket: bucket.to_owned(),
        key: key.to_owned(),
        upload_id: upload_id.to_owned(),
        owner,
        max_parts,
        is_truncated,
        parts: parts
            .into_iter()
            .map(|p| PartSummary {
                part_number: p.part_number,
                last_modified: p.last_modified,
                etag: p.etag,
                size: p.size,
            })
            .collect(),
    };
    let document = to_xml("ListPartsResult", &response)
        .map_err(|e| S3Error::internal("failed to serialize parts listing").with_source(e))?;
    Ok(S3Response::xml(document))
}
