//! Bucket table operations and per-bucket configuration documents.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tracing::info;

use basalt_model::types::{
    AccessControlPolicy, BucketConfigKind, BucketRecord, Owner, Tag, VersioningState,
};

use crate::error::{IndexError, IndexResult};
use crate::store::{Index, json_from_sql, json_to_sql, ts_from_sql, ts_to_sql};

/// Raw column values; JSON and timestamp columns are decoded outside the
/// rusqlite row closure so decoding failures keep their detail.
struct RawBucket {
    name: String,
    region: String,
    created_at: String,
    owner_id: String,
    owner_display: String,
    versioning: String,
    mfa_delete: i64,
    acl: String,
    tags: String,
}

fn bucket_from_row(row: &Row<'_>) -> rusqlite::Result<RawBucket> {
    Ok(RawBucket {
        name: row.get(0)?,
        region: row.get(1)?,
        created_at: row.get(2)?,
        owner_id: row.get(3)?,
        owner_display: row.get(4)?,
        versioning: row.get(5)?,
        mfa_delete: row.get(6)?,
        acl: row.get(7)?,
        tags: row.get(8)?,
    })
}

fn decode_bucket(raw: RawBucket) -> IndexResult<BucketRecord> {
    Ok(BucketRecord {
        created_at: ts_from_sql(&raw.created_at)?,
        versioning: match raw.versioning.as_str() {
            "Enabled" => VersioningState::Enabled,
            "Suspended" => VersioningState::Suspended,
            _ => VersioningState::Unversioned,
        },
        acl: json_from_sql(&raw.acl)?,
        tags: json_from_sql(&raw.tags)?,
        owner: Owner {
            id: raw.owner_id,
            display_name: raw.owner_display,
        },
        name: raw.name,
        region: raw.region,
        mfa_delete: raw.mfa_delete != 0,
    })
}

const BUCKET_COLUMNS: &str =
    "name, region, created_at, owner_id, owner_display, versioning, mfa_delete, acl, tags";

impl Index {
    /// Create a bucket.
    ///
    /// # Errors
    ///
    /// [`IndexError::BucketAlreadyOwnedByYou`] when the caller owns the
    /// name already, [`IndexError::BucketAlreadyExists`] when another
    /// account does.
    pub fn create_bucket(&self, record: &BucketRecord) -> IndexResult<()> {
        let conn = self.conn.lock();
        let existing_owner: Option<String> = conn
            .query_row(
                "SELECT owner_id FROM buckets WHERE name = ?1",
                params![record.name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(owner_id) = existing_owner {
            if owner_id == record.owner.id {
                return Err(IndexError::BucketAlreadyOwnedByYou(record.name.clone()));
            }
            return Err(IndexError::BucketAlreadyExists(record.name.clone()));
        }

        conn.execute(
            "INSERT INTO buckets (name, region, created_at, owner_id, owner_display,
                                  versioning, mfa_delete, acl, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.name,
                record.region,
                ts_to_sql(record.created_at),
                record.owner.id,
                record.owner.display_name,
                match record.versioning {
                    VersioningState::Unversioned => "Unversioned",
                    VersioningState::Enabled => "Enabled",
                    VersioningState::Suspended => "Suspended",
                },
                i64::from(record.mfa_delete),
                json_to_sql(&record.acl)?,
                json_to_sql(&record.tags)?,
            ],
        )?;
        info!(bucket = %record.name, owner = %record.owner.display_name, "bucket created");
        Ok(())
    }

    /// Fetch a bucket row.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when absent.
    pub fn get_bucket(&self, name: &str) -> IndexResult<BucketRecord> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {BUCKET_COLUMNS} FROM buckets WHERE name = ?1"),
                params![name],
                bucket_from_row,
            )
            .optional()?
            .ok_or_else(|| IndexError::NoSuchBucket(name.to_owned()))?;
        decode_bucket(raw)
    }

    /// Whether the bucket exists.
    #[must_use]
    pub fn bucket_exists(&self, name: &str) -> bool {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT 1 FROM buckets WHERE name = ?1",
            params![name],
            |_| Ok(()),
        )
        .optional()
        .is_ok_and(|found| found.is_some())
    }

    /// Delete a bucket; it must exist and hold no versions, delete
    /// markers, or in-progress uploads. Object rows and configs cascade.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] or [`IndexError::BucketNotEmpty`].
    pub fn delete_bucket(&self, name: &str) -> IndexResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM buckets WHERE name = ?1", params![name], |r| {
                r.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(IndexError::NoSuchBucket(name.to_owned()));
        }

        let versions: i64 = tx.query_row(
            "SELECT COUNT(*) FROM object_versions WHERE bucket = ?1",
            params![name],
            |r| r.get(0),
        )?;
        let uploads: i64 = tx.query_row(
            "SELECT COUNT(*) FROM multipart_uploads WHERE bucket = ?1",
            params![name],
            |r| r.get(0),
        )?;
        if versions > 0 || uploads > 0 {
            return Err(IndexError::BucketNotEmpty(name.to_owned()));
        }

        tx.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
        tx.commit()?;
        info!(bucket = %name, "bucket deleted");
        Ok(())
    }

    /// List buckets, optionally restricted to an owner, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn list_buckets(
        &self,
        owner_id: Option<&str>,
    ) -> IndexResult<Vec<(String, DateTime<Utc>)>> {
        let conn = self.conn.lock();
        let mut out = Vec::new();
        match owner_id {
            Some(owner_id) => {
                let mut stmt = conn.prepare(
                    "SELECT name, created_at FROM buckets WHERE owner_id = ?1 ORDER BY name",
                )?;
                let rows = stmt.query_map(params![owner_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                for row in rows {
                    let (name, created) = row?;
                    out.push((name, ts_from_sql(&created)?));
                }
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT name, created_at FROM buckets ORDER BY name")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                for row in rows {
                    let (name, created) = row?;
                    out.push((name, ts_from_sql(&created)?));
                }
            }
        }
        Ok(out)
    }

    /// Update the versioning state and optionally the MFA-delete flag.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when absent.
    pub fn set_versioning(
        &self,
        name: &str,
        state: VersioningState,
        mfa_delete: Option<bool>,
    ) -> IndexResult<()> {
        let conn = self.conn.lock();
        let state_str = match state {
            VersioningState::Unversioned => "Unversioned",
            VersioningState::Enabled => "Enabled",
            VersioningState::Suspended => "Suspended",
        };
        let changed = match mfa_delete {
            Some(mfa) => conn.execute(
                "UPDATE buckets SET versioning = ?2, mfa_delete = ?3 WHERE name = ?1",
                params![name, state_str, i64::from(mfa)],
            )?,
            None => conn.execute(
                "UPDATE buckets SET versioning = ?2 WHERE name = ?1",
                params![name, state_str],
            )?,
        };
        if changed == 0 {
            return Err(IndexError::NoSuchBucket(name.to_owned()));
        }
        Ok(())
    }

    /// Replace the bucket ACL.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when absent.
    pub fn set_bucket_acl(&self, name: &str, acl: &AccessControlPolicy) -> IndexResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE buckets SET acl = ?2 WHERE name = ?1",
            params![name, json_to_sql(acl)?],
        )?;
        if changed == 0 {
            return Err(IndexError::NoSuchBucket(name.to_owned()));
        }
        Ok(())
    }

    /// Replace the bucket tag set.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when absent.
    pub fn set_bucket_tags(&self, name: &str, tags: &[Tag]) -> IndexResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE buckets SET tags = ?2 WHERE name = ?1",
            params![name, json_to_sql(&tags)?],
        )?;
        if changed == 0 {
            return Err(IndexError::NoSuchBucket(name.to_owned()));
        }
        Ok(())
    }

    /// Fetch a configuration document.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when the bucket is absent,
    /// [`IndexError::NoSuchConfig`] when the document is.
    pub fn get_bucket_config(&self, name: &str, kind: BucketConfigKind) -> IndexResult<String> {
        let conn = self.conn.lock();
        ensure_bucket(&conn, name)?;
        conn.query_row(
            "SELECT document FROM bucket_configs WHERE bucket = ?1 AND kind = ?2",
            params![name, kind.as_str()],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(IndexError::NoSuchConfig(kind))
    }

    /// Store (insert or replace) a configuration document.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when the bucket is absent.
    pub fn set_bucket_config(
        &self,
        name: &str,
        kind: BucketConfigKind,
        document: &str,
    ) -> IndexResult<()> {
        let conn = self.conn.lock();
        ensure_bucket(&conn, name)?;
        conn.execute(
            "INSERT INTO bucket_configs (bucket, kind, document, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (bucket, kind) DO UPDATE
             SET document = excluded.document, updated_at = excluded.updated_at",
            params![name, kind.as_str(), document, ts_to_sql(Utc::now())],
        )?;
        Ok(())
    }

    /// Delete a configuration document; absent documents yield success.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when the bucket is absent.
    pub fn delete_bucket_config(&self, name: &str, kind: BucketConfigKind) -> IndexResult<()> {
        let conn = self.conn.lock();
        ensure_bucket(&conn, name)?;
        conn.execute(
            "DELETE FROM bucket_configs WHERE bucket = ?1 AND kind = ?2",
            params![name, kind.as_str()],
        )?;
        Ok(())
    }
}

pub(crate) fn ensure_bucket(conn: &rusqlite::Connection, name: &str) -> IndexResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM buckets WHERE name = ?1", params![name], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Err(IndexError::NoSuchBucket(name.to_owned()));
    }
    Ok(())
}
