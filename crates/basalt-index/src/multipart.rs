//! Multipart upload records and staged part metadata.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tracing::debug;

use basalt_model::types::{MultipartUpload, Owner, UploadPart};

use crate::bucket::ensure_bucket;
use crate::error::{IndexError, IndexResult};
use crate::store::{Index, json_from_sql, json_to_sql, ts_from_sql, ts_to_sql};

struct RawUpload {
    upload_id: String,
    bucket: String,
    key: String,
    initiated_at: String,
    owner_id: String,
    owner_display: String,
    metadata: String,
}

fn upload_from_row(row: &Row<'_>) -> rusqlite::Result<RawUpload> {
    Ok(RawUpload {
        upload_id: row.get(0)?,
        bucket: row.get(1)?,
        key: row.get(2)?,
        initiated_at: row.get(3)?,
        owner_id: row.get(4)?,
        owner_display: row.get(5)?,
        metadata: row.get(6)?,
    })
}

fn decode_upload(raw: RawUpload) -> IndexResult<MultipartUpload> {
    Ok(MultipartUpload {
        initiated: ts_from_sql(&raw.initiated_at)?,
        metadata: json_from_sql(&raw.metadata)?,
        owner: Owner {
            id: raw.owner_id,
            display_name: raw.owner_display,
        },
        upload_id: raw.upload_id,
        bucket: raw.bucket,
        key: raw.key,
    })
}

const UPLOAD_COLUMNS: &str =
    "upload_id, bucket, key, initiated_at, owner_id, owner_display, metadata";

impl Index {
    /// Record a newly initiated multipart upload.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when the bucket is absent.
    pub fn create_upload(&self, upload: &MultipartUpload) -> IndexResult<()> {
        let conn = self.conn.lock();
        ensure_bucket(&conn, &upload.bucket)?;
        conn.execute(
            "INSERT INTO multipart_uploads
                 (upload_id, bucket, key, initiated_at, owner_id, owner_display, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                upload.upload_id,
                upload.bucket,
                upload.key,
                ts_to_sql(upload.initiated),
                upload.owner.id,
                upload.owner.display_name,
                json_to_sql(&upload.metadata)?,
            ],
        )?;
        debug!(
            upload_id = %upload.upload_id,
            bucket = %upload.bucket,
            key = %upload.key,
            "multipart upload initiated"
        );
        Ok(())
    }

    /// Fetch an upload record.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchUpload`] when absent.
    pub fn get_upload(&self, upload_id: &str) -> IndexResult<MultipartUpload> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {UPLOAD_COLUMNS} FROM multipart_uploads WHERE upload_id = ?1"),
                params![upload_id],
                upload_from_row,
            )
            .optional()?
            .ok_or_else(|| IndexError::NoSuchUpload(upload_id.to_owned()))?;
        decode_upload(raw)
    }

    /// Remove an upload record and its part rows. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn delete_upload(&self, upload_id: &str) -> IndexResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM multipart_parts WHERE upload_id = ?1",
            params![upload_id],
        )?;
        tx.execute(
            "DELETE FROM multipart_uploads WHERE upload_id = ?1",
            params![upload_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Insert or replace a staged part row.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchUpload`] when the upload is absent.
    #[allow(clippy::cast_possible_wrap)]
    pub fn put_part(&self, upload_id: &str, part: &UploadPart) -> IndexResult<()> {
        let conn = self.conn.lock();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM multipart_uploads WHERE upload_id = ?1",
                params![upload_id],
                |r| r.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(IndexError::NoSuchUpload(upload_id.to_owned()));
        }
        conn.execute(
            "INSERT INTO multipart_parts (upload_id, part_number, size, etag, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (upload_id, part_number) DO UPDATE
             SET size = excluded.size, etag = excluded.etag,
                 uploaded_at = excluded.uploaded_at",
            params![
                upload_id,
                i64::from(part.part_number),
                part.size as i64,
                part.etag,
                ts_to_sql(part.last_modified),
            ],
        )?;
        Ok(())
    }

    /// Fetch one staged part row.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    #[allow(clippy::cast_sign_loss)]
    pub fn get_part(&self, upload_id: &str, part_number: u32) -> IndexResult<Option<UploadPart>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT part_number, size, etag, uploaded_at FROM multipart_parts
                 WHERE upload_id = ?1 AND part_number = ?2",
                params![upload_id, i64::from(part_number)],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(part_number, size, etag, uploaded_at)| {
            Ok(UploadPart {
                part_number: part_number as u32,
                size: size as u64,
                etag,
                last_modified: ts_from_sql(&uploaded_at)?,
            })
        })
        .transpose()
    }

    /// List staged parts, ascending by part number.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchUpload`] when the upload is absent.
    #[allow(clippy::cast_sign_loss)]
    pub fn list_parts(&self, upload_id: &str) -> IndexResult<Vec<UploadPart>> {
        // Existence check first so a vanished upload reads as NoSuchUpload,
        // not an empty part list.
        self.get_upload(upload_id)?;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT part_number, size, etag, uploaded_at FROM multipart_parts
             WHERE upload_id = ?1 ORDER BY part_number ASC",
        )?;
        let rows = stmt.query_map(params![upload_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut parts = Vec::new();
        for row in rows {
            let (part_number, size, etag, uploaded_at) = row?;
            parts.push(UploadPart {
                part_number: part_number as u32,
                size: size as u64,
                etag,
                last_modified: ts_from_sql(&uploaded_at)?,
            });
        }
        Ok(parts)
    }

    /// List in-progress uploads for a bucket, ordered by key then id.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when the bucket is absent.
    pub fn list_uploads(&self, bucket: &str) -> IndexResult<Vec<MultipartUpload>> {
        let conn = self.conn.lock();
        ensure_bucket(&conn, bucket)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM multipart_uploads
             WHERE bucket = ?1 ORDER BY key ASC, upload_id ASC"
        ))?;
        let mut uploads = Vec::new();
        for raw in stmt.query_map(params![bucket], upload_from_row)? {
            uploads.push(decode_upload(raw?)?);
        }
        Ok(uploads)
    }

    /// Uploads initiated before `cutoff`, across all buckets. Used by the
    /// janitor to garbage-collect abandoned uploads.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn uploads_initiated_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> IndexResult<Vec<MultipartUpload>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM multipart_uploads
             WHERE initiated_at < ?1 ORDER BY initiated_at ASC"
        ))?;
        let mut uploads = Vec::new();
        for raw in stmt.query_map(params![ts_to_sql(cutoff)], upload_from_row)? {
            uploads.push(decode_upload(raw?)?);
        }
        Ok(uploads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_model::types::{
        AccessControlPolicy, BucketRecord, CannedAcl, ObjectMetadata, VersioningState,
    };
    use chrono::Duration;

    fn index_with_bucket(name: &str) -> Index {
        let index = Index::open_in_memory().expect("open");
        let owner = Owner {
            id: "o1".to_owned(),
            display_name: "alice".to_owned(),
        };
        index
            .create_bucket(&BucketRecord {
                name: name.to_owned(),
                region: "us-east-1".to_owned(),
                created_at: Utc::now(),
                acl: AccessControlPolicy::canned(owner.clone(), CannedAcl::Private),
                owner,
                versioning: VersioningState::Unversioned,
                mfa_delete: false,
                tags: Vec::new(),
            })
            .expect("create bucket");
        index
    }

    fn upload(id: &str, bucket: &str, key: &str) -> MultipartUpload {
        MultipartUpload {
            upload_id: id.to_owned(),
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            initiated: Utc::now(),
            owner: Owner {
                id: "o1".to_owned(),
                display_name: "alice".to_owned(),
            },
            metadata: ObjectMetadata::default(),
        }
    }

    fn part(number: u32, size: u64, etag: &str) -> UploadPart {
        UploadPart {
            part_number: number,
            size,
            etag: etag.to_owned(),
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn test_should_create_and_fetch_upload() {
        let index = index_with_bucket("b1");
        index.create_upload(&upload("u1", "b1", "big")).expect("create");

        let fetched = index.get_upload("u1").expect("get");
        assert_eq!(fetched.bucket, "b1");
        assert_eq!(fetched.key, "big");

        assert!(matches!(
            index.get_upload("ghost"),
            Err(IndexError::NoSuchUpload(_))
        ));
    }

    #[test]
    fn test_should_replace_part_on_same_number() {
        let index = index_with_bucket("b1");
        index.create_upload(&upload("u1", "b1", "big")).expect("create");

        index.put_part("u1", &part(1, 100, "\"old\"")).expect("put");
        index.put_part("u1", &part(1, 200, "\"new\"")).expect("replace");

        let parts = index.list_parts("u1").expect("list");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].size, 200);
        assert_eq!(parts[0].etag, "\"new\"");
    }

    #[test]
    fn test_should_list_parts_in_ascending_order() {
        let index = index_with_bucket("b1");
        index.create_upload(&upload("u1", "b1", "big")).expect("create");
        for n in [3, 1, 2] {
            index.put_part("u1", &part(n, 10, "\"e\"")).expect("put");
        }
        let numbers: Vec<u32> = index
            .list_parts("u1")
            .expect("list")
            .iter()
            .map(|p| p.part_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_should_reject_part_for_unknown_upload() {
        let index = index_with_bucket("b1");
        assert!(matches!(
            index.put_part("ghost", &part(1, 1, "\"e\"")),
            Err(IndexError::NoSuchUpload(_))
        ));
    }

    #[test]
    fn test_should_delete_upload_with_parts_idempotently() {
        let index = index_with_bucket("b1");
        index.create_upload(&upload("u1", "b1", "big")).expect("create");
        index.put_part("u1", &part(1, 10, "\"e\"")).expect("put");

        index.delete_upload("u1").expect("delete");
        index.delete_upload("u1").expect("delete again");
        assert!(matches!(
            index.get_upload("u1"),
            Err(IndexError::NoSuchUpload(_))
        ));
    }

    #[test]
    fn test_should_find_stale_uploads() {
        let index = index_with_bucket("b1");
        let mut old = upload("old", "b1", "a");
        old.initiated = Utc::now() - Duration::hours(3);
        index.create_upload(&old).expect("create old");
        index.create_upload(&upload("fresh", "b1", "b")).expect("create fresh");

        let stale = index
            .uploads_initiated_before(Utc::now() - Duration::hours(1))
            .expect("query");
        let ids: Vec<&str> = stale.iter().map(|u| u.upload_id.as_str()).collect();
        assert_eq!(ids, vec!["old"]);
    }

    #[test]
    fn test_should_list_uploads_per_bucket() {
        let index = index_with_bucket("b1");
        index.create_upload(&upload("u2", "b1", "kb")).expect("create");
        index.create_upload(&upload("u1", "b1", "ka")).expect("create");

        let keys: Vec<String> = index
            .list_uploads("b1")
            .expect("list")
            .into_iter()
            .map(|u| u.key)
            .collect();
        assert_eq!(keys, vec!["ka", "kb"]);

        assert!(matches!(
            index.list_uploads("ghost"),
            Err(IndexError::NoSuchBucket(_))
        ));
    }
}
