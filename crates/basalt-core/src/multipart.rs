//! The multipart coordinator.
//!
//! Upload state is `Initiated` until `complete` or `abort` removes it (or
//! the janitor garbage-collects it). All operations on one upload id are
//! serialized through a striped lock map, so exactly one concurrent
//! `complete` can win and a `complete` never races a part write.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use basalt_index::IndexError;
use basalt_model::types::{
    MultipartUpload, NULL_VERSION_ID, ObjectMetadata, ObjectVersion, Owner, Principal, UploadPart,
    VersioningState,
};
use basalt_model::{S3Error, S3ErrorCode, s3_error};
use basalt_store::ByteStream;
use basalt_store::etag::unquote;
use basalt_xml::deserialize::CompletedPart;

use crate::state::ServiceState;

/// Highest part number S3 accepts.
const MAX_PART_NUMBER: u32 = 10_000;

/// Serializes multipart operations per upload id.
#[derive(Debug, Default)]
pub struct MultipartCoordinator {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MultipartCoordinator {
    /// Create an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, upload_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(upload_id.to_owned())
            .or_default()
            .clone()
    }

    fn drop_lock(&self, upload_id: &str) {
        self.locks.remove(upload_id);
    }
}

/// Initiate an upload, capturing metadata that `complete` will apply.
///
/// # Errors
///
/// `NoSuchBucket` when the bucket is absent.
pub async fn initiate(
    state: &ServiceState,
    bucket: &str,
    key: &str,
    metadata: ObjectMetadata,
    principal: &Principal,
) -> Result<String, S3Error> {
    let upload_id = Uuid::new_v4().simple().to_string();
    let upload = MultipartUpload {
        upload_id: upload_id.clone(),
        bucket: bucket.to_owned(),
        key: key.to_owned(),
        initiated: Utc::now(),
        owner: principal.to_owner(),
        metadata,
    };
    state.index.create_upload(&upload)?;
    info!(bucket, key, upload_id = %upload_id, "multipart upload initiated");
    Ok(upload_id)
}

/// Stage one part. A later call with the same part number replaces the
/// earlier staging atomically.
///
/// # Errors
///
/// `NoSuchUpload` when the upload is gone; `InvalidArgument` for part
/// numbers outside `1..=10000`.
pub async fn upload_part(
    state: &ServiceState,
    bucket: &str,
    key: &str,
    upload_id: &str,
    part_number: u32,
    source: ByteStream,
    declared_size: Option<u64>,
) -> Result<String, S3Error> {
    if part_number == 0 || part_number > MAX_PART_NUMBER {
        return Err(s3_error!(
            InvalidArgument,
            "part number must be between 1 and 10000"
        ));
    }
    ensure_upload_matches(state, bucket, key, upload_id)?;

    let lock = state.multipart.lock_for(upload_id);
    let _guard = lock.lock().await;

    // Re-check under the lock: a concurrent complete/abort may have won.
    ensure_upload_matches(state, bucket, key, upload_id)?;

    let outcome = state
        .store
        .write_part(upload_id, part_number, source, declared_size)
        .await?;
    state.index.put_part(
        upload_id,
        &UploadPart {
            part_number,
            size: outcome.size,
            etag: outcome.etag.clone(),
            last_modified: Utc::now(),
        },
    )?;

    debug!(upload_id, part_number, size = outcome.size, "part staged");
    Ok(outcome.etag)
}

/// Atomically materialize the upload into a new object version.
///
/// Validation order follows the protocol: every client part must be staged
/// with a matching ETag (`InvalidPart`), the list must be strictly
/// ascending (`InvalidPartOrder`), and every non-final part must reach the
/// configured minimum size (`EntityTooSmall`). On success the staged parts
/// and the upload record are gone; on any failure the upload stays
/// `Initiated` so the client may retry. A duplicate `complete` therefore
/// answers `NoSuchUpload`.
///
/// # Errors
///
/// As described above, plus `InternalError` for storage failures.
pub async fn complete(
    state: &ServiceState,
    bucket: &str,
    key: &str,
    upload_id: &str,
    client_parts: &[CompletedPart],
) -> Result<(String, String), S3Error> {
    let lock = state.multipart.lock_for(upload_id);
    let _guard = lock.lock().await;

    let upload = match state.index.get_upload(upload_id) {
        Ok(upload) => upload,
        Err(IndexError::NoSuchUpload(id)) => return Err(S3Error::no_such_upload(id)),
        Err(e) => return Err(e.into()),
    };
    if upload.bucket != bucket || upload.key != key {
        return Err(S3Error::no_such_upload(upload_id.to_owned()));
    }

    if client_parts.is_empty() {
        return Err(s3_error!(
            InvalidRequest,
            "you must specify at least one part"
        ));
    }

    // Strictly ascending part numbers.
    for window in client_parts.windows(2) {
        if window[1].part_number <= window[0].part_number {
            return Err(S3Error::new(S3ErrorCode::InvalidPartOrder));
        }
    }

    // Every client part must be staged and must match its staged ETag.
    let mut staged_parts = Vec::with_capacity(client_parts.len());
    for part in client_parts {
        let staged = state
            .index
            .get_part(upload_id, part.part_number)?
            .ok_or_else(|| {
                S3Error::new(S3ErrorCode::InvalidPart)
                    .with_resource(format!("part {}", part.part_number))
            })?;
        if unquote(&staged.etag) != unquote(&part.etag) {
            return Err(S3Error::new(S3ErrorCode::InvalidPart)
                .with_resource(format!("part {}", part.part_number)));
        }
        staged_parts.push(staged);
    }

    // Every part but the last must reach the minimum size.
    for staged in &staged_parts[..staged_parts.len() - 1] {
        if staged.size < state.config.min_part_size {
            return Err(S3Error::new(S3ErrorCode::EntityTooSmall)
                .with_resource(format!("part {}", staged.part_number)));
        }
    }

    let bucket_record = state.index.get_bucket(bucket)?;
    let version_id = if bucket_record.versioning == VersioningState::Enabled {
        Uuid::new_v4().simple().to_string()
    } else {
        NULL_VERSION_ID.to_owned()
    };

    let part_numbers: Vec<u32> = client_parts.iter().map(|p| p.part_number).collect();
    let (size, etag) = state
        .store
        .concatenate(bucket, key, &version_id, upload_id, &part_numbers)
        .await?;

    let version = ObjectVersion {
        key: key.to_owned(),
        version_id: version_id.clone(),
        size,
        etag: etag.clone(),
        last_modified: Utc::now(),
        is_latest: true,
        is_delete_marker: false,
        storage_class: "STANDARD".to_owned(),
        owner: upload.owner.clone(),
        metadata: upload.metadata.clone(),
        checksum: None,
        parts_count: Some(u32::try_from(part_numbers.len()).unwrap_or(u32::MAX)),
        acl: None,
        tags: Vec::new(),
    };
    state.index.insert_version(bucket, &version)?;

    // The object is durable; staged state goes away as one step.
    state.store.remove_upload(upload_id).await?;
    state.index.delete_upload(upload_id)?;
    drop(_guard);
    state.multipart.drop_lock(upload_id);

    info!(
        bucket,
        key,
        upload_id,
        version_id = %version_id,
        size,
        parts = part_numbers.len(),
        "multipart upload completed"
    );
    Ok((etag, version_id))
}

/// Abort an upload, discarding the record and every staged part.
/// Idempotent: aborting an unknown upload succeeds.
///
/// # Errors
///
/// `InternalError` for storage failures.
pub async fn abort(state: &ServiceState, upload_id: &str) -> Result<(), S3Error> {
    let lock = state.multipart.lock_for(upload_id);
    let _guard = lock.lock().await;

    state.index.delete_upload(upload_id)?;
    state.store.remove_upload(upload_id).await?;
    drop(_guard);
    state.multipart.drop_lock(upload_id);

    debug!(upload_id, "multipart upload aborted");
    Ok(())
}

fn ensure_upload_matches(
    state: &ServiceState,
    bucket: &str,
    key: &str,
    upload_id: &str,
) -> Result<MultipartUpload, S3Error> {
    let upload = match state.index.get_upload(upload_id) {
        Ok(upload) => upload,
        Err(IndexError::NoSuchUpload(id)) => return Err(S3Error::no_such_upload(id)),
        Err(e) => return Err(e.into()),
    };
    if upload.bucket != bucket || upload.key != key {
        return Err(S3Error::no_such_upload(upload_id.to_owned()));
    }
    Ok(upload)
}

/// The owner recorded at initiation, used by `ListParts`.
///
/// # Errors
///
/// `NoSuchUpload` when absent or addressing a different bucket/key.
pub fn upload_owner(
    state: &ServiceState,
    bucket: &str,
    key: &str,
    upload_id: &str,
) -> Result<Owner, S3Error> {
    ensure_upload_matches(state, bucket, key, upload_id).map(|u| u.owner)
}
