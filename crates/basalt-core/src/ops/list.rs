//! Listing handlers: objects (V1/V2), versions, multipart uploads.

use basalt_model::S3Error;
use basalt_xml::responses::{
    ListObjectsPage, ListUploadsPage, ListVersionsPage, UploadSummary,
};
use basalt_xml::to_xml;

use crate::request::{RequestContext, S3Response};
use crate::state::ServiceState;

fn xml_response<T: basalt_xml::S3Serialize>(root: &str, value: &T) -> Result<S3Response, S3Error> {
    let document = to_xml(root, value)
        .map_err(|e| S3Error::internal("failed to serialize listing").with_source(e))?;
    Ok(S3Response::xml(document))
}

fn page_size(ctx: &RequestContext, param: &str, cap: usize) -> Result<usize, S3Error> {
    match ctx.query_value(param) {
        None => Ok(cap),
        Some(raw) => {
            let requested: usize = raw
                .parse()
                .map_err(|_| S3Error::invalid_argument(format!("{param} must be an integer")))?;
            Ok(requested.min(cap))
        }
    }
}

/// `GET /bucket` and `GET /bucket?list-type=2`.
pub(crate) async fn list_objects(
    state: &ServiceState,
    ctx: &RequestContext,
    v2: bool,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let prefix = ctx.query_value("prefix").unwrap_or_default().to_owned();
    let delimiter = ctx.query_value("delimiter").unwrap_or_default().to_owned();
    let max_keys = page_size(ctx, "max-keys", state.config.max_keys)?;

    // V2 resumes from the continuation token, falling back to start-after;
    // V1 uses the plain marker. Both walk the same index path.
    let (marker, continuation_token, start_after) = if v2 {
        let token = ctx.query_value("continuation-token").map(str::to_owned);
        let start_after = ctx.query_value("start-after").map(str::to_owned);
        let marker = token.clone().or_else(|| start_after.clone());
        (marker.unwrap_or_default(), token, start_after)
    } else {
        (
            ctx.query_value("marker").unwrap_or_default().to_owned(),
            None,
            None,
        )
    };

    let page = state
        .index
        .list_objects(bucket, &prefix, &delimiter, &marker, max_keys)?;

    let response = ListObjectsPage {
        bucket: bucket.to_owned(),
        prefix,
        delimiter: ctx.query_value("delimiter").map(str::to_owned),
        max_keys,
        marker: if v2 { None } else { Some(marker) },
        continuation_token,
        start_after,
        is_truncated: page.is_truncated,
        next_marker: page.next_marker,
        contents: page.objects,
        common_prefixes: page.common_prefixes,
        v2,
    };
    xml_response("ListBucketResult", &response)
}

/// `GET /bucket?versions`.
pub(crate) async fn list_versions(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let prefix = ctx.query_value("prefix").unwrap_or_default().to_owned();
    let delimiter = ctx.query_value("delimiter").unwrap_or_default().to_owned();
    let key_marker = ctx.query_value("key-marker").unwrap_or_default().to_owned();
    let version_id_marker = ctx
        .query_value("version-id-marker")
        .unwrap_or_default()
        .to_owned();
    let max_keys = page_size(ctx, "max-keys", state.config.max_keys)?;

    let page = state.index.list_versions(
        bucket,
        &prefix,
        &delimiter,
        &key_marker,
        &version_id_marker,
        max_keys,
    )?;

    let response = ListVersionsPage {
        bucket: bucket.to_owned(),
        prefix,
        delimiter: ctx.query_value("delimiter").map(str::to_owned),
        max_keys,
        key_marker: Some(key_marker),
        version_id_marker: Some(version_id_marker),
        is_truncated: page.is_truncated,
        next_key_marker: page.next_key_marker,
        next_version_id_marker: page.next_version_id_marker,
        versions: page.versions,
        common_prefixes: page.common_prefixes,
    };
    xml_response("ListVersionsResult", &response)
}

/// `GET /bucket?uploads`.
pub(crate) async fn list_multipart_uploads(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let max_uploads = page_size(ctx, "max-uploads", state.config.max_keys)?;

    let mut uploads = state.index.list_uploads(bucket)?;
    let is_truncated = uploads.len() > max_uploads;
    uploads.truncate(max_uploads);

    let response = ListUploadsPage {
        bucket: bucket.to_owned(),
        max_uploads,
        is_truncated,
        uploads: uploads
            .into_iter()
            .map(|u| UploadSummary {
                key: u.key,
                upload_id: u.upload_id,
                owner: u.owner,
                initiated: u.initiated,
            })
            .collect(),
    };
    xml_response("ListMultipartUploadsResult", &response)
}
