//! Object CRUD handlers: put, copy, get, head, delete, bulk delete.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::Utc;
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};
use uuid::Uuid;

use basalt_access::{AccessRequest, S3Action, evaluate};
use basalt_index::IndexError;
use basalt_model::types::{
    BucketRecord, NULL_VERSION_ID, ObjectMetadata, ObjectVersion, Owner, VersioningState,
};
use basalt_model::{S3Error, S3ErrorCode, s3_error};
use basalt_store::{parse_range_header, resolve_range};
use basalt_xml::responses::{CopyResult, DeleteErrorEntry, DeleteResultPage, DeletedEntry};
use basalt_xml::{deserialize::DeleteRequest, from_xml, to_xml};

use crate::metrics::Metrics;
use crate::notify;
use crate::request::{RequestBody, RequestContext, ResponseBody, S3Response};
use crate::state::ServiceState;
use crate::validation::{validate_metadata, validate_object_key};

use super::util::{acl_from_headers, apply_object_headers, extract_metadata, version_id_header};

/// Sentinel values of `x-amz-content-sha256` that carry no digest.
fn is_sha256_sentinel(value: &str) -> bool {
    matches!(
        value,
        "UNSIGNED-PAYLOAD"
            | "STREAMING-AWS4-HMAC-SHA256-PAYLOAD"
            | "STREAMING-AWS4-HMAC-SHA256-PAYLOAD-TRAILER"
            | "STREAMING-UNSIGNED-PAYLOAD-TRAILER"
    )
}

fn new_version_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// `PUT /bucket/key` — streaming upload.
pub(crate) async fn put_object(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    validate_object_key(key)?;

    let record = state.index.get_bucket(bucket)?;
    let metadata = extract_metadata(&ctx.headers);
    validate_metadata(&metadata.user_metadata)?;

    let versioned = record.versioning == VersioningState::Enabled;
    let version_id = if versioned {
        new_version_id()
    } else {
        NULL_VERSION_ID.to_owned()
    };

    let outcome = state
        .store
        .write_stream(
            bucket,
            key,
            &version_id,
            body.into_stream(),
            ctx.content_length(),
        )
        .await?;
    Metrics::add(&state.metrics.bytes_in_total, outcome.size);

    // Content-MD5 is verified before any metadata becomes visible.
    if let Some(declared_md5) = ctx.header("content-md5") {
        let matches = BASE64_STANDARD
            .decode(declared_md5)
            .ok()
            .is_some_and(|digest| hex::encode(digest) == outcome.md5_hex);
        if !matches {
            state.store.delete(bucket, key, &version_id).await?;
            // An unversioned write has already replaced the "null" blob;
            // drop the now-dangling row too.
            if version_id == NULL_VERSION_ID {
                let _ = state.index.remove_version(bucket, key, &version_id);
            }
            return Err(S3Error::new(S3ErrorCode::BadDigest).with_resource(key.to_owned()));
        }
    }

    let owner = ctx.principal.to_owner();
    let version = ObjectVersion {
        key: key.to_owned(),
        version_id: version_id.clone(),
        size: outcome.size,
        etag: outcome.etag.clone(),
        last_modified: Utc::now(),
        is_latest: true,
        is_delete_marker: false,
        storage_class: ctx
            .header("x-amz-storage-class")
            .unwrap_or("STANDARD")
            .to_owned(),
        acl: acl_from_headers(ctx, owner.clone())?,
        owner,
        metadata,
        checksum: Some(basalt_model::types::ChecksumData {
            algorithm: "SHA256".to_owned(),
            value: outcome.sha256_hex.clone(),
        }),
        parts_count: None,
        tags: Vec::new(),
    };
    state.index.insert_version(bucket, &version)?;

    // The content hash is checked after the version exists; a mismatch
    // rolls the freshly written version back before the error surfaces.
    if let Some(declared) = ctx.header("x-amz-content-sha256") {
        if !is_sha256_sentinel(declared)
            && !declared.eq_ignore_ascii_case(&outcome.sha256_hex)
        {
            warn!(bucket, key, "content sha256 mismatch, rolling back version");
            state.index.remove_version(bucket, key, &version_id)?;
            state.store.delete(bucket, key, &version_id).await?;
            return Err(S3Error::new(S3ErrorCode::XAmzContentSHA256Mismatch)
                .with_resource(key.to_owned()));
        }
    }

    Metrics::incr(&state.metrics.objects_written_total);
    notify::emit(state, bucket, notify::OBJECT_CREATED_PUT, key);
    debug!(bucket, key, version_id = %version_id, size = outcome.size, "object written");

    Ok(S3Response::ok()
        .header("ETag", outcome.etag)
        .optional_header("x-amz-version-id", version_id_header(&version_id)))
}

/// Parsed `x-amz-copy-source`: `/bucket/key[?versionId=...]`.
pub(crate) struct CopySource {
    pub(crate) bucket: String,
    pub(crate) key: String,
    pub(crate) version_id: Option<String>,
}

pub(crate) fn parse_copy_source(raw: &str) -> Result<CopySource, S3Error> {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    let (path, version_id) = match decoded.split_once('?') {
        Some((path, query)) => {
            let version_id = query
                .split('&')
                .find_map(|pair| pair.strip_prefix("versionId="))
                .map(str::to_owned);
            (path, version_id)
        }
        None => (decoded.as_ref(), None),
    };
    let path = path.strip_prefix('/').unwrap_or(path);
    let (bucket, key) = path
        .split_once('/')
        .ok_or_else(|| s3_error!(InvalidArgument, "malformed x-amz-copy-source"))?;
    if bucket.is_empty() || key.is_empty() {
        return Err(s3_error!(InvalidArgument, "malformed x-amz-copy-source"));
    }
    Ok(CopySource {
        bucket: bucket.to_owned(),
        key: key.to_owned(),
        version_id,
    })
}

/// `PUT /bucket/key` with `x-amz-copy-source` — server-side copy.
pub(crate) async fn copy_object(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    validate_object_key(key)?;

    let source_header = ctx
        .header("x-amz-copy-source")
        .ok_or_else(|| s3_error!(InvalidRequest, "missing x-amz-copy-source"))?;
    let source = parse_copy_source(source_header)?;

    // Reading the source is authorized independently of the write.
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

    let src_version = state.index.get_version(
        &source.bucket,
        &source.key,
        source.version_id.as_deref(),
    )?;
    if src_version.is_delete_marker {
        return Err(S3Error::no_such_key(source.key));
    }

    let record = state.index.get_bucket(bucket)?;
    let versioned = record.versioning == VersioningState::Enabled;
    let version_id = if versioned {
        new_version_id()
    } else {
        NULL_VERSION_ID.to_owned()
    };

    let metadata = if ctx
        .header("x-amz-metadata-directive")
        .is_some_and(|d| d.eq_ignore_ascii_case("REPLACE"))
    {
        extract_metadata(&ctx.headers)
    } else {
        src_version.metadata.clone()
    };

    let (len, stream) = state
        .store
        .read_stream(&source.bucket, &source.key, &src_version.version_id, None)
        .await?;
    let outcome = state
        .store
        .write_stream(bucket, key, &version_id, stream, Some(len))
        .await?;

    let owner = ctx.principal.to_owner();
    let last_modified = Utc::now();
    let version = ObjectVersion {
        key: key.to_owned(),
        version_id: version_id.clone(),
        size: outcome.size,
        etag: outcome.etag.clone(),
        last_modified,
        is_latest: true,
        is_delete_marker: false,
        storage_class: src_version.storage_class.clone(),
        acl: acl_from_headers(ctx, owner.clone())?,
        owner,
        metadata,
        checksum: Some(basalt_model::types::ChecksumData {
            algorithm: "SHA256".to_owned(),
            value: outcome.sha256_hex.clone(),
        }),
        parts_count: None,
        tags: src_version.tags.clone(),
    };
    state.index.insert_version(bucket, &version)?;

    Metrics::incr(&state.metrics.objects_written_total);
    notify::emit(state, bucket, notify::OBJECT_CREATED_COPY, key);

    let document = to_xml(
        "CopyObjectResult",
        &CopyResult {
            etag: outcome.etag,
            last_modified,
        },
    )
    .map_err(|e| S3Error::internal("failed to serialize copy result").with_source(e))?;
    Ok(S3Response::xml(document)
        .optional_header("x-amz-version-id", version_id_header(&version_id)))
}

/// Resolve the version a read targets, translating delete markers into the
/// right error.
fn resolve_read_version(
    state: &ServiceState,
    bucket: &str,
    key: &str,
    requested_version: Option<&str>,
) -> Result<ObjectVersion, S3Error> {
    let version = state.index.get_version(bucket, key, requested_version)?;
    if version.is_delete_marker {
        let err = if requested_version.is_some() {
            // Addressing a delete marker directly is not a readable
            // operation.
            S3Error::method_not_allowed("GET")
        } else {
            S3Error::no_such_key(key.to_owned())
        };
        return Err(err.with_header("x-amz-delete-marker", "true"));
    }
    Ok(version)
}

/// `GET /bucket/key` — streaming download with range support.
pub(crate) async fn get_object(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    let version = resolve_read_version(state, bucket, key, ctx.query_value("versionId"))?;

    // Range resolution happens against the version size before the data
    // path is asked for bytes.
    let range = match ctx.header("range").and_then(parse_range_header) {
        Some(spec) => match resolve_range(spec, version.size) {
            Some(bounds) => Some(bounds),
            None => return Err(S3Error::invalid_range(version.size)),
        },
        None => None,
    };

    let (len, stream) = state
        .store
        .read_stream(bucket, key, &version.version_id, range)
        .await?;
    Metrics::add(&state.metrics.bytes_out_total, len);

    let status = if range.is_some() {
        http::StatusCode::PARTIAL_CONTENT
    } else {
        http::StatusCode::OK
    };
    let mut response = S3Response {
        status,
        headers: Vec::new(),
        body: ResponseBody::Stream { len, stream },
    };
    response = apply_object_headers(response, &version)
        .header("Content-Length", len.to_string());
    if let Some((start, end)) = range {
        response = response.header(
            "Content-Range",
            format!("bytes {start}-{end}/{}", version.size),
        );
    }
    Ok(response)
}

/// `HEAD /bucket/key` — metadata only.
pub(crate) async fn head_object(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    let version = resolve_read_version(state, bucket, key, ctx.query_value("versionId"))?;

    let response = apply_object_headers(S3Response::ok(), &version)
        .header("Content-Length", version.size.to_string());
    Ok(response)
}

/// Outcome of a delete, shared by the single handler, bulk delete, and the
/// janitor.
#[derive(Debug)]
pub(crate) enum DeleteOutcome {
    /// A delete marker was inserted (versioning enabled).
    MarkerCreated {
        /// The marker's version id.
        version_id: String,
    },
    /// A version row (object or marker) was removed.
    VersionRemoved {
        /// The removed version id.
        version_id: String,
        /// Whether the removed row was a delete marker.
        was_marker: bool,
    },
    /// Nothing existed; the delete is an idempotent no-op.
    NothingToDo,
}

/// Current-version delete: insert a marker in a versioning-enabled bucket,
/// remove the `"null"` row otherwise.
pub(crate) async fn delete_current(
    state: &ServiceState,
    record: &BucketRecord,
    key: &str,
    owner: Owner,
) -> Result<DeleteOutcome, S3Error> {
    if record.versioning == VersioningState::Enabled {
        let version_id = new_version_id();
        let marker = ObjectVersion {
            key: key.to_owned(),
            version_id: version_id.clone(),
            size: 0,
            etag: "\"\"".to_owned(),
            last_modified: Utc::now(),
            is_latest: true,
            is_delete_marker: true,
            storage_class: "STANDARD".to_owned(),
            owner,
            metadata: ObjectMetadata::default(),
            checksum: None,
            parts_count: None,
            acl: None,
            tags: Vec::new(),
        };
        state.index.mark_delete(&record.name, &marker)?;
        notify::emit(
            state,
            &record.name,
            notify::OBJECT_REMOVED_DELETE_MARKER,
            key,
        );
        return Ok(DeleteOutcome::MarkerCreated { version_id });
    }

    match state.index.remove_version(&record.name, key, NULL_VERSION_ID) {
        Ok(removed) => {
            state
                .store
                .delete(&record.name, key, NULL_VERSION_ID)
                .await?;
            Metrics::incr(&state.metrics.objects_deleted_total);
            notify::emit(state, &record.name, notify::OBJECT_REMOVED_DELETE, key);
            Ok(DeleteOutcome::VersionRemoved {
                version_id: removed.version_id,
                was_marker: false,
            })
        }
        Err(IndexError::NoSuchKey(_)) => Ok(DeleteOutcome::NothingToDo),
        Err(e) => Err(e.into()),
    }
}

/// Version-targeted delete. Idempotent: a missing version is a no-op.
pub(crate) async fn delete_specific(
    state: &ServiceState,
    bucket: &str,
    key: &str,
    version_id: &str,
) -> Result<DeleteOutcome, S3Error> {
    match state.index.remove_version(bucket, key, version_id) {
        Ok(removed) => {
            if !removed.is_delete_marker {
                state.store.delete(bucket, key, version_id).await?;
            }
            Metrics::incr(&state.metrics.objects_deleted_total);
            notify::emit(state, bucket, notify::OBJECT_REMOVED_DELETE, key);
            Ok(DeleteOutcome::VersionRemoved {
                version_id: removed.version_id,
                was_marker: removed.is_delete_marker,
            })
        }
        Err(IndexError::NoSuchKey(_)) => Ok(DeleteOutcome::NothingToDo),
        Err(e) => Err(e.into()),
    }
}

/// `DELETE /bucket/key` — versioned or current delete.
pub(crate) async fn delete_object(
    state: &ServiceState,
    ctx: &RequestContext,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let key = ctx.key()?;
    let record = state.index.get_bucket(bucket)?;

    let outcome = match ctx.query_value("versionId") {
        Some(version_id) => delete_specific(state, bucket, key, version_id).await?,
        None => delete_current(state, &record, key, ctx.principal.to_owner()).await?,
    };

    let response = match outcome {
        DeleteOutcome::MarkerCreated { version_id } => S3Response::no_content()
            .header("x-amz-delete-marker", "true")
            .header("x-amz-version-id", version_id),
        DeleteOutcome::VersionRemoved {
            version_id,
            was_marker,
        } => {
            let response = S3Response::no_content()
                .optional_header("x-amz-version-id", version_id_header(&version_id));
            if was_marker {
                response.header("x-amz-delete-marker", "true")
            } else {
                response
            }
        }
        DeleteOutcome::NothingToDo => S3Response::no_content(),
    };
    Ok(response)
}

/// `POST /bucket?delete` — bulk delete.
///
/// Authorization runs per key; a denied entry becomes an `<Error>` element
/// instead of failing the whole request.
pub(crate) async fn delete_objects(
    state: &ServiceState,
    ctx: &RequestContext,
    body: RequestBody,
) -> Result<S3Response, S3Error> {
    let bucket = ctx.bucket()?;
    let record = state.index.get_bucket(bucket)?;

    let payload = body.collect().await?;
    let request: DeleteRequest = from_xml(&payload)
        .map_err(|e| S3Error::with_message(S3ErrorCode::MalformedXML, e.to_string()))?;

    let mut result = DeleteResultPage {
        quiet: request.quiet,
        ..DeleteResultPage::default()
    };

    for object in &request.objects {
        let decision = evaluate(
            &state.index,
            state.evaluator_config(),
            &AccessRequest {
                principal: &ctx.principal,
                action: S3Action::DeleteObject,
                bucket,
                key: Some(&object.key),
                admin_id: Some(state.admin_id()),
            },
        );
        if let Err(err) = decision {
            result.errors.push(DeleteErrorEntry {
                key: object.key.clone(),
                version_id: object.version_id.clone(),
                code: err.code.as_str().to_owned(),
                message: err.message,
            });
            continue;
        }

        let outcome = match &object.version_id {
            Some(version_id) => {
                delete_specific(state, bucket, &object.key, version_id).await
            }
            None => {
                delete_current(state, &record, &object.key, ctx.principal.to_owner()).await
            }
        };
        match outcome {
            Ok(DeleteOutcome::MarkerCreated { version_id }) => {
                result.deleted.push(DeletedEntry {
                    key: object.key.clone(),
                    version_id: object.version_id.clone(),
                    delete_marker: true,
                    delete_marker_version_id: Some(version_id),
                });
            }
            Ok(DeleteOutcome::VersionRemoved {
                version_id,
                was_marker,
            }) => {
                result.deleted.push(DeletedEntry {
                    key: object.key.clone(),
                    version_id: Some(version_id),
                    delete_marker: was_marker,
                    delete_marker_version_id: None,
                });
            }
            Ok(DeleteOutcome::NothingToDo) => {
                result.deleted.push(DeletedEntry {
                    key: object.key.clone(),
                    version_id: object.version_id.clone(),
                    delete_marker: false,
                    delete_marker_version_id: None,
                });
            }
            Err(err) => {
                result.errors.push(DeleteErrorEntry {
                    key: object.key.clone(),
                    version_id: object.version_id.clone(),
                    code: err.code.as_str().to_owned(),
                    message: err.message,
                });
            }
        }
    }

    let document = to_xml("DeleteResult", &result)
        .map_err(|e| S3Error::internal("failed to serialize delete result").with_source(e))?;
    Ok(S3Response::xml(document))
}
