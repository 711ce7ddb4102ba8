//! Streaming blob reads and writes.
//!
//! [`DataStore`] owns the storage root. Writes consume a pull-based chunk
//! stream, hash incrementally (MD5 for the ETag, SHA-256 for the content
//! check), land in a `.tmp.<random>` sibling, and are renamed into place
//! only on success; any failure removes the temp file. Reads hand back a
//! chunk stream so a slow client throttles disk reads instead of buffering.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use md5::{Digest, Md5};
use sha2::Sha256;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, trace, warn};

use basalt_model::{S3Error, S3ErrorCode};

use crate::etag;
use crate::layout;

/// A pull-based stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// Read/write chunk size for disk streaming.
const CHUNK_SIZE: usize = 64 * 1024;

/// Wrap an in-memory buffer as a one-chunk [`ByteStream`].
#[must_use]
pub fn bytes_stream(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Errors raised by the data path.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The source stream ended before `declared_size` bytes arrived.
    #[error("incomplete body: expected {expected} bytes, received {actual}")]
    IncompleteBody {
        /// Bytes the client declared.
        expected: u64,
        /// Bytes that actually arrived.
        actual: u64,
    },
    /// The blob the index pointed at is not on disk.
    #[error("blob not found on disk")]
    MissingBlob,
    /// A staged part is missing.
    #[error("staged part {0} not found")]
    MissingPart(u32),
    /// Underlying filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<StoreError> for S3Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IncompleteBody { .. } => {
                S3Error::with_message(S3ErrorCode::IncompleteBody, err.to_string())
            }
            StoreError::MissingPart(_) => {
                S3Error::with_message(S3ErrorCode::InvalidPart, err.to_string())
            }
            StoreError::MissingBlob => S3Error::internal(err.to_string()),
            StoreError::Io(io_err) => S3Error::internal("storage I/O failure").with_source(io_err),
        }
    }
}

/// Result of a streaming write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// Bytes written.
    pub size: u64,
    /// Quoted hex MD5, the object ETag.
    pub etag: String,
    /// Unquoted hex MD5.
    pub md5_hex: String,
    /// Hex SHA-256 of the body.
    pub sha256_hex: String,
}

/// File-backed blob storage rooted at a single directory.
#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    /// Open (creating if needed) a store under `root` and sweep abandoned
    /// temp files from a previous run.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created or walked.
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(layout::OBJECTS_DIR)).await?;
        fs::create_dir_all(root.join(layout::MULTIPART_DIR)).await?;
        let store = Self { root };
        store.sweep_tmp_files().await?;
        Ok(store)
    }

    /// The storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    // -----------------------------------------------------------------------
    // Object blobs
    // -----------------------------------------------------------------------

    /// Stream an object body to disk.
    ///
    /// Consumes `source` chunk by chunk, computing MD5 and SHA-256 on the
    /// fly. With `declared_size` set, fewer arriving bytes fail with
    /// [`StoreError::IncompleteBody`]. The blob becomes visible only via
    /// the final atomic rename; on any error the temp file is removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on stream or filesystem failure.
    pub async fn write_stream(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        source: ByteStream,
        declared_size: Option<u64>,
    ) -> Result<WriteOutcome, StoreError> {
        let path = layout::blob_path(&self.root, bucket, key, version_id);
        let outcome = self.write_to_path(&path, source, declared_size).await?;
        trace!(bucket, key, version_id, size = outcome.size, "stored blob");
        Ok(outcome)
    }

    /// Convenience wrapper writing an in-memory buffer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on filesystem failure.
    pub async fn write_bytes(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        data: impl Into<Bytes> + Send,
    ) -> Result<WriteOutcome, StoreError> {
        self.write_stream(bucket, key, version_id, bytes_stream(data), None)
            .await
    }

    /// Open an object blob for streaming, optionally restricted to an
    /// inclusive byte range that the caller has already resolved.
    ///
    /// Returns the number of bytes the stream will yield.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingBlob`] if the blob is absent;
    /// [`StoreError::Io`] on filesystem failure.
    pub async fn read_stream(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        range: Option<(u64, u64)>,
    ) -> Result<(u64, ByteStream), StoreError> {
        let path = layout::blob_path(&self.root, bucket, key, version_id);
        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::MissingBlob),
            Err(e) => return Err(e.into()),
        };
        let file_len = file.metadata().await?.len();

        let (start, len) = match range {
            Some((start, end)) => {
                debug_assert!(start <= end && end < file_len);
                (start, end.saturating_sub(start) + 1)
            }
            None => (0, file_len),
        };
        if start > 0 {
            file.seek(io::SeekFrom::Start(start)).await?;
        }

        let stream = futures::stream::try_unfold((file, len), |(mut file, remaining)| async move {
            if remaining == 0 {
                return Ok(None);
            }
            let take = CHUNK_SIZE.min(usize::try_from(remaining).unwrap_or(CHUNK_SIZE));
            let mut buf = vec![0u8; take];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                // The file shrank underneath us; surface as an I/O error.
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "blob truncated during read",
                ));
            }
            buf.truncate(n);
            Ok(Some((Bytes::from(buf), (file, remaining - n as u64))))
        });

        Ok((len, Box::pin(stream)))
    }

    /// Read a whole blob into memory. Used by server-side copy and tests.
    ///
    /// # Errors
    ///
    /// Same as [`DataStore::read_stream`].
    pub async fn read_bytes(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        range: Option<(u64, u64)>,
    ) -> Result<Bytes, StoreError> {
        let (len, mut stream) = self.read_stream(bucket, key, version_id, range).await?;
        let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buf))
    }

    /// Delete an object blob. Absent blobs yield success.
    ///
    /// # Errors
    ///
    /// Returns an error only for filesystem failures other than not-found.
    pub async fn delete(&self, bucket: &str, key: &str, version_id: &str) -> io::Result<()> {
        let path = layout::blob_path(&self.root, bucket, key, version_id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                trace!(bucket, key, version_id, "deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Remove every blob belonging to a bucket.
    ///
    /// # Errors
    ///
    /// Returns an error for filesystem failures other than not-found.
    pub async fn delete_bucket(&self, bucket: &str) -> io::Result<()> {
        let dir = layout::bucket_dir(&self.root, bucket);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(bucket, "removed bucket blobs");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Multipart staging
    // -----------------------------------------------------------------------

    /// Stage one part of a multipart upload. A later write with the same
    /// part number atomically replaces the earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on stream or filesystem failure.
    pub async fn write_part(
        &self,
        upload_id: &str,
        part_number: u32,
        source: ByteStream,
        declared_size: Option<u64>,
    ) -> Result<WriteOutcome, StoreError> {
        let path = layout::part_path(&self.root, upload_id, part_number);
        let outcome = self.write_to_path(&path, source, declared_size).await?;
        trace!(upload_id, part_number, size = outcome.size, "staged part");
        Ok(outcome)
    }

    /// Concatenate staged parts into the final object blob.
    ///
    /// `part_numbers` must already be validated and sorted by the
    /// coordinator. Returns the total size and the composite ETag
    /// (`hex(md5(md5_1 ∥ … ∥ md5_N)) + "-N"`).
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingPart`] if a staged part vanished;
    /// [`StoreError::Io`] on filesystem failure.
    pub async fn concatenate(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        upload_id: &str,
        part_numbers: &[u32],
    ) -> Result<(u64, String), StoreError> {
        let final_path = layout::blob_path(&self.root, bucket, key, version_id);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = layout::tmp_sibling(&final_path);

        let result = self
            .concatenate_into(&tmp_path, upload_id, part_numbers)
            .await;
        match result {
            Ok(outcome) => {
                fs::rename(&tmp_path, &final_path).await?;
                debug!(
                    bucket,
                    key,
                    version_id,
                    upload_id,
                    parts = part_numbers.len(),
                    "materialized multipart object"
                );
                Ok(outcome)
            }
            Err(e) => {
                remove_quietly(&tmp_path).await;
                Err(e)
            }
        }
    }

    async fn concatenate_into(
        &self,
        tmp_path: &Path,
        upload_id: &str,
        part_numbers: &[u32],
    ) -> Result<(u64, String), StoreError> {
        let mut out = fs::File::create(tmp_path).await?;
        let mut total: u64 = 0;
        let mut part_digests: Vec<String> = Vec::with_capacity(part_numbers.len());

        for &part_number in part_numbers {
            let part_path = layout::part_path(&self.root, upload_id, part_number);
            let mut part_file = match fs::File::open(&part_path).await {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(StoreError::MissingPart(part_number));
                }
                Err(e) => return Err(e.into()),
            };

            let mut hasher = Md5::new();
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let n = part_file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                out.write_all(&buf[..n]).await?;
                total += n as u64;
            }
            part_digests.push(hex::encode(hasher.finalize()));
        }

        out.flush().await?;
        Ok((total, etag::composite_etag(&part_digests)))
    }

    /// Discard every staged part and the staging directory for an upload.
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error for filesystem failures other than not-found.
    pub async fn remove_upload(&self, upload_id: &str) -> io::Result<()> {
        let dir = layout::upload_dir(&self.root, upload_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                trace!(upload_id, "removed staged parts");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn write_to_path(
        &self,
        final_path: &Path,
        mut source: ByteStream,
        declared_size: Option<u64>,
    ) -> Result<WriteOutcome, StoreError> {
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = layout::tmp_sibling(final_path);
        let mut file = fs::File::create(&tmp_path).await?;

        let mut md5 = Md5::new();
        let mut sha256 = Sha256::new();
        let mut total: u64 = 0;

        let copy_result: Result<(), StoreError> = async {
            while let Some(chunk) = source.next().await {
                let chunk = chunk?;
                md5.update(&chunk);
                sha256.update(&chunk);
                total += chunk.len() as u64;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = copy_result {
            drop(file);
            remove_quietly(&tmp_path).await;
            return Err(e);
        }

        if let Some(expected) = declared_size {
            if total < expected {
                drop(file);
                remove_quietly(&tmp_path).await;
                return Err(StoreError::IncompleteBody {
                    expected,
                    actual: total,
                });
            }
        }

        drop(file);
        fs::rename(&tmp_path, final_path).await?;

        let md5_hex = hex::encode(md5.finalize());
        Ok(WriteOutcome {
            size: total,
            etag: etag::quote(&md5_hex),
            md5_hex,
            sha256_hex: hex::encode(sha256.finalize()),
        })
    }

    /// Remove `*.tmp.*` files left behind by a previous run.
    async fn sweep_tmp_files(&self) -> io::Result<()> {
        let mut pending = vec![self.root.clone()];
        let mut swept = 0usize;
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if layout::is_tmp_name(&entry.file_name().to_string_lossy()) {
                    remove_quietly(&path).await;
                    swept += 1;
                }
            }
        }
        if swept > 0 {
            debug!(swept, "removed abandoned temp files");
        }
        Ok(())
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove temp file");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
