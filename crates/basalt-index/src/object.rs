//! Object version rows: transactional writes and the shared listing walk.
//!
//! `insert_version`, `mark_delete`, and `remove_version` maintain the
//! `is_latest` invariant inside a single transaction. The listing walk is
//! shared by `ListObjects`, `ListObjectsV2`, and `ListVersions`: prefix
//! filter, marker skip, delimiter grouping, truncation with next markers.

use rusqlite::{OptionalExtension, Row, Transaction, params};
use tracing::debug;

use basalt_model::types::{NULL_VERSION_ID, ObjectVersion, Owner, Tag};

use crate::bucket::ensure_bucket;
use crate::error::{IndexError, IndexResult};
use crate::store::{Index, json_from_sql, json_to_sql, ts_from_sql, ts_to_sql};

const VERSION_COLUMNS: &str = "key, version_id, size, etag, last_modified, is_latest, \
     is_delete_marker, storage_class, owner_id, owner_display, metadata, \
     checksum_algorithm, checksum_value, parts_count, acl, tags";

/// One page of a `ListObjects` walk.
#[derive(Debug, Clone)]
pub struct ListPage {
    /// Latest, non-delete-marker objects in key order.
    pub objects: Vec<ObjectVersion>,
    /// Delimiter-grouped common prefixes, in emission order.
    pub common_prefixes: Vec<String>,
    /// Whether more entries remain.
    pub is_truncated: bool,
    /// Marker for the next page (last emitted key or prefix).
    pub next_marker: Option<String>,
}

/// One page of a `ListVersions` walk.
#[derive(Debug, Clone)]
pub struct VersionPage {
    /// Versions and delete markers, ascending by (key, version id).
    pub versions: Vec<ObjectVersion>,
    /// Delimiter-grouped common prefixes, in emission order.
    pub common_prefixes: Vec<String>,
    /// Whether more entries remain.
    pub is_truncated: bool,
    /// Key marker for the next page.
    pub next_key_marker: Option<String>,
    /// Version-id marker for the next page.
    pub next_version_id_marker: Option<String>,
}

struct RawVersion {
    key: String,
    version_id: String,
    size: i64,
    etag: String,
    last_modified: String,
    is_latest: i64,
    is_delete_marker: i64,
    storage_class: String,
    owner_id: String,
    owner_display: String,
    metadata: String,
    checksum_algorithm: Option<String>,
    checksum_value: Option<String>,
    parts_count: Option<i64>,
    acl: Option<String>,
    tags: String,
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<RawVersion> {
    Ok(RawVersion {
        key: row.get(0)?,
        version_id: row.get(1)?,
        size: row.get(2)?,
        etag: row.get(3)?,
        last_modified: row.get(4)?,
        is_latest: row.get(5)?,
        is_delete_marker: row.get(6)?,
        storage_class: row.get(7)?,
        owner_id: row.get(8)?,
        owner_display: row.get(9)?,
        metadata: row.get(10)?,
        checksum_algorithm: row.get(11)?,
        checksum_value: row.get(12)?,
        parts_count: row.get(13)?,
        acl: row.get(14)?,
        tags: row.get(15)?,
    })
}

#[allow(clippy::cast_sign_loss)]
fn decode_version(raw: RawVersion) -> IndexResult<ObjectVersion> {
    let checksum = match (raw.checksum_algorithm, raw.checksum_value) {
        (Some(algorithm), Some(value)) => {
            Some(basalt_model::types::ChecksumData { algorithm, value })
        }
        _ => None,
    };
    Ok(ObjectVersion {
        last_modified: ts_from_sql(&raw.last_modified)?,
        metadata: json_from_sql(&raw.metadata)?,
        acl: raw.acl.as_deref().map(json_from_sql).transpose()?,
        tags: json_from_sql(&raw.tags)?,
        owner: Owner {
            id: raw.owner_id,
            display_name: raw.owner_display,
        },
        key: raw.key,
        version_id: raw.version_id,
        size: raw.size as u64,
        etag: raw.etag,
        is_latest: raw.is_latest != 0,
        is_delete_marker: raw.is_delete_marker != 0,
        storage_class: raw.storage_class,
        checksum,
        parts_count: raw.parts_count.map(|n| n as u32),
    })
}

#[allow(clippy::cast_possible_wrap)]
fn insert_row(tx: &Transaction<'_>, bucket: &str, version: &ObjectVersion) -> IndexResult<()> {
    // An unversioned write replaces the "null" row in place.
    if version.version_id == NULL_VERSION_ID {
        tx.execute(
            "DELETE FROM object_versions
             WHERE bucket = ?1 AND key = ?2 AND version_id = ?3",
            params![bucket, version.key, NULL_VERSION_ID],
        )?;
    }
    tx.execute(
        "UPDATE object_versions SET is_latest = 0
         WHERE bucket = ?1 AND key = ?2 AND is_latest = 1",
        params![bucket, version.key],
    )?;
    tx.execute(
        &format!(
            "INSERT INTO object_versions (bucket, {VERSION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            bucket,
            version.key,
            version.version_id,
            version.size as i64,
            version.etag,
            ts_to_sql(version.last_modified),
            i64::from(version.is_delete_marker),
            version.storage_class,
            version.owner.id,
            version.owner.display_name,
            json_to_sql(&version.metadata)?,
            version.checksum.as_ref().map(|c| c.algorithm.clone()),
            version.checksum.as_ref().map(|c| c.value.clone()),
            version.parts_count.map(i64::from),
            version
                .acl
                .as_ref()
                .map(|acl| json_to_sql(acl))
                .transpose()?,
            json_to_sql(&version.tags)?,
        ],
    )?;
    Ok(())
}

impl Index {
    /// Insert a new object version as the current one.
    ///
    /// Within one transaction: any prior `is_latest` row for the key is
    /// cleared, and in an unversioned bucket the existing `"null"` row is
    /// removed first.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when the bucket is absent.
    pub fn insert_version(&self, bucket: &str, version: &ObjectVersion) -> IndexResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        ensure_bucket(&tx, bucket)?;
        insert_row(&tx, bucket, version)?;
        tx.commit()?;
        debug!(bucket, key = %version.key, version_id = %version.version_id, "inserted version");
        Ok(())
    }

    /// Insert a delete marker as the current version of a key.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when the bucket is absent.
    pub fn mark_delete(&self, bucket: &str, marker: &ObjectVersion) -> IndexResult<()> {
        debug_assert!(marker.is_delete_marker && marker.size == 0);
        self.insert_version(bucket, marker)
    }

    /// Remove one version row. If it was the current one, the next-newest
    /// remaining version (by last-modified, then version id, descending)
    /// is promoted in the same transaction. Returns the removed row.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] / [`IndexError::NoSuchKey`].
    pub fn remove_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> IndexResult<ObjectVersion> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        ensure_bucket(&tx, bucket)?;

        let raw = tx
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM object_versions
                     WHERE bucket = ?1 AND key = ?2 AND version_id = ?3"
                ),
                params![bucket, key, version_id],
                version_from_row,
            )
            .optional()?
            .ok_or_else(|| IndexError::NoSuchKey(key.to_owned()))?;
        let removed = decode_version(raw)?;

        tx.execute(
            "DELETE FROM object_versions
             WHERE bucket = ?1 AND key = ?2 AND version_id = ?3",
            params![bucket, key, version_id],
        )?;

        if removed.is_latest {
            let next: Option<String> = tx
                .query_row(
                    "SELECT version_id FROM object_versions
                     WHERE bucket = ?1 AND key = ?2
                     ORDER BY last_modified DESC, version_id DESC LIMIT 1",
                    params![bucket, key],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(next_version) = next {
                tx.execute(
                    "UPDATE object_versions SET is_latest = 1
                     WHERE bucket = ?1 AND key = ?2 AND version_id = ?3",
                    params![bucket, key, next_version],
                )?;
            }
        }

        tx.commit()?;
        debug!(bucket, key, version_id, "removed version");
        Ok(removed)
    }

    /// Fetch a version row: a specific one, or the current one when
    /// `version_id` is absent. The current row may be a delete marker; the
    /// orchestrator decides what that means per operation.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] / [`IndexError::NoSuchKey`].
    pub fn get_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> IndexResult<ObjectVersion> {
        let conn = self.conn.lock();
        ensure_bucket(&conn, bucket)?;
        let raw = match version_id {
            Some(version_id) => conn
                .query_row(
                    &format!(
                        "SELECT {VERSION_COLUMNS} FROM object_versions
                         WHERE bucket = ?1 AND key = ?2 AND version_id = ?3"
                    ),
                    params![bucket, key, version_id],
                    version_from_row,
                )
                .optional()?,
            None => conn
                .query_row(
                    &format!(
                        "SELECT {VERSION_COLUMNS} FROM object_versions
                         WHERE bucket = ?1 AND key = ?2 AND is_latest = 1"
                    ),
                    params![bucket, key],
                    version_from_row,
                )
                .optional()?,
        }
        .ok_or_else(|| IndexError::NoSuchKey(key.to_owned()))?;
        decode_version(raw)
    }

    /// Whether the key currently resolves to a real object (a latest row
    /// that is not a delete marker).
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when the bucket is absent.
    pub fn object_exists(&self, bucket: &str, key: &str) -> IndexResult<bool> {
        let conn = self.conn.lock();
        ensure_bucket(&conn, bucket)?;
        let marker: Option<i64> = conn
            .query_row(
                "SELECT is_delete_marker FROM object_versions
                 WHERE bucket = ?1 AND key = ?2 AND is_latest = 1",
                params![bucket, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(marker == Some(0))
    }

    /// Replace the ACL stored on one version.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] / [`IndexError::NoSuchKey`].
    pub fn set_object_acl(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        acl: &basalt_model::types::AccessControlPolicy,
    ) -> IndexResult<()> {
        let conn = self.conn.lock();
        ensure_bucket(&conn, bucket)?;
        let changed = conn.execute(
            "UPDATE object_versions SET acl = ?4
             WHERE bucket = ?1 AND key = ?2 AND version_id = ?3",
            params![bucket, key, version_id, json_to_sql(acl)?],
        )?;
        if changed == 0 {
            return Err(IndexError::NoSuchKey(key.to_owned()));
        }
        Ok(())
    }

    /// Replace the tag set stored on one version.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] / [`IndexError::NoSuchKey`].
    pub fn set_object_tags(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        tags: &[Tag],
    ) -> IndexResult<()> {
        let conn = self.conn.lock();
        ensure_bucket(&conn, bucket)?;
        let changed = conn.execute(
            "UPDATE object_versions SET tags = ?4
             WHERE bucket = ?1 AND key = ?2 AND version_id = ?3",
            params![bucket, key, version_id, json_to_sql(&tags)?],
        )?;
        if changed == 0 {
            return Err(IndexError::NoSuchKey(key.to_owned()));
        }
        Ok(())
    }

    /// List current objects: ascending key order, delete markers excluded.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when the bucket is absent.
    pub fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        marker: &str,
        max_keys: usize,
    ) -> IndexResult<ListPage> {
        let rows = {
            let conn = self.conn.lock();
            ensure_bucket(&conn, bucket)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM object_versions
                 WHERE bucket = ?1 AND is_latest = 1 AND is_delete_marker = 0
                 ORDER BY key ASC"
            ))?;
            let mut rows = Vec::new();
            for raw in stmt.query_map(params![bucket], version_from_row)? {
                rows.push(decode_version(raw?)?);
            }
            rows
        };

        let mut objects = Vec::new();
        let mut common_prefixes = Vec::new();
        let mut last_prefix: Option<String> = None;
        let mut count = 0usize;
        let mut is_truncated = false;
        let mut last_emitted: Option<String> = None;

        if max_keys == 0 {
            return Ok(ListPage {
                objects,
                common_prefixes,
                is_truncated: false,
                next_marker: None,
            });
        }

        for obj in rows {
            if !marker.is_empty() && obj.key.as_str() <= marker {
                continue;
            }
            if !prefix.is_empty() && !obj.key.starts_with(prefix) {
                continue;
            }

            if !delimiter.is_empty() {
                if let Some(pos) = obj.key[prefix.len()..].find(delimiter) {
                    let group =
                        format!("{prefix}{}{delimiter}", &obj.key[prefix.len()..prefix.len() + pos]);
                    if last_prefix.as_deref() == Some(group.as_str()) {
                        continue;
                    }
                    if count == max_keys {
                        is_truncated = true;
                        break;
                    }
                    last_prefix = Some(group.clone());
                    last_emitted = Some(group.clone());
                    common_prefixes.push(group);
                    count += 1;
                    continue;
                }
            }

            if count == max_keys {
                is_truncated = true;
                break;
            }
            last_emitted = Some(obj.key.clone());
            objects.push(obj);
            count += 1;
        }

        Ok(ListPage {
            objects,
            common_prefixes,
            is_truncated,
            next_marker: if is_truncated { last_emitted } else { None },
        })
    }

    /// List version rows (including delete markers): ascending by
    /// (key, version id), with the composite marker skip.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchBucket`] when the bucket is absent.
    #[allow(clippy::too_many_lines)]
    pub fn list_versions(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        key_marker: &str,
        version_id_marker: &str,
        max_keys: usize,
    ) -> IndexResult<VersionPage> {
        let rows = {
            let conn = self.conn.lock();
            ensure_bucket(&conn, bucket)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM object_versions
                 WHERE bucket = ?1
                 ORDER BY key ASC, version_id ASC"
            ))?;
            let mut rows = Vec::new();
            for raw in stmt.query_map(params![bucket], version_from_row)? {
                rows.push(decode_version(raw?)?);
            }
            rows
        };

        let mut versions = Vec::new();
        let mut common_prefixes = Vec::new();
        let mut last_prefix: Option<String> = None;
        let mut count = 0usize;
        let mut is_truncated = false;
        let mut last_key: Option<String> = None;
        let mut last_version: Option<String> = None;

        if max_keys == 0 {
            return Ok(VersionPage {
                versions,
                common_prefixes,
                is_truncated: false,
                next_key_marker: None,
                next_version_id_marker: None,
            });
        }

        for row in rows {
            // Composite (key, version id) marker skip.
            if !key_marker.is_empty() {
                if row.key.as_str() < key_marker {
                    continue;
                }
                if row.key.as_str() == key_marker {
                    if version_id_marker.is_empty() {
                        continue;
                    }
                    if row.version_id.as_str() <= version_id_marker {
                        continue;
                    }
                }
            }
            if !prefix.is_empty() && !row.key.starts_with(prefix) {
                continue;
            }

            if !delimiter.is_empty() {
                if let Some(pos) = row.key[prefix.len()..].find(delimiter) {
                    let group =
                        format!("{prefix}{}{delimiter}", &row.key[prefix.len()..prefix.len() + pos]);
                    if last_prefix.as_deref() == Some(group.as_str()) {
                        continue;
                    }
                    if count == max_keys {
                        is_truncated = true;
                        break;
                    }
                    last_prefix = Some(group.clone());
                    last_key = Some(group.clone());
                    last_version = None;
                    common_prefixes.push(group);
                    count += 1;
                    continue;
                }
            }

            if count == max_keys {
                is_truncated = true;
                break;
            }
            last_key = Some(row.key.clone());
            last_version = Some(row.version_id.clone());
            versions.push(row);
            count += 1;
        }

        Ok(VersionPage {
            versions,
            common_prefixes,
            is_truncated,
            next_key_marker: if is_truncated { last_key } else { None },
            next_version_id_marker: if is_truncated { last_version } else { None },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_model::types::{BucketRecord, ObjectMetadata, VersioningState};
    use basalt_model::types::{AccessControlPolicy, CannedAcl};
    use chrono::{Duration, Utc};

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

    fn version(key: &str, version_id: &str) -> ObjectVersion {
        ObjectVersion {
            key: key.to_owned(),
            version_id: version_id.to_owned(),
            size: 5,
            etag: "\"5d41402abc4b2a76b9719d911017c592\"".to_owned(),
            last_modified: Utc::now(),
            is_latest: true,
            is_delete_marker: false,
            storage_class: "STANDARD".to_owned(),
            owner: Owner {
                id: "o1".to_owned(),
                display_name: "alice".to_owned(),
            },
            metadata: ObjectMetadata::default(),
            checksum: None,
            parts_count: None,
            acl: None,
            tags: Vec::new(),
        }
    }

    fn marker(key: &str, version_id: &str) -> ObjectVersion {
        let mut m = version(key, version_id);
        m.is_delete_marker = true;
        m.size = 0;
        m
    }

    fn latest_count(index: &Index, bucket: &str, key: &str) -> i64 {
        index
            .conn
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM object_versions
                 WHERE bucket = ?1 AND key = ?2 AND is_latest = 1",
                params![bucket, key],
                |row| row.get(0),
            )
            .expect("count")
    }

    #[test]
    fn test_should_insert_and_fetch_latest_version() {
        let index = index_with_bucket("b1");
        index.insert_version("b1", &version("k", "v1")).expect("insert");

        let fetched = index.get_version("b1", "k", None).expect("get");
        assert_eq!(fetched.version_id, "v1");
        assert!(fetched.is_latest);
    }

    #[test]
    fn test_should_keep_single_latest_row_per_key() {
        let index = index_with_bucket("b1");
        for v in ["v1", "v2", "v3"] {
            index.insert_version("b1", &version("k", v)).expect("insert");
        }
        assert_eq!(latest_count(&index, "b1", "k"), 1);
        assert_eq!(
            index.get_version("b1", "k", None).expect("get").version_id,
            "v3"
        );
        // Older versions stay addressable.
        assert!(index.get_version("b1", "k", Some("v1")).is_ok());
    }

    #[test]
    fn test_should_replace_null_version_in_place() {
        let index = index_with_bucket("b1");
        index
            .insert_version("b1", &version("k", NULL_VERSION_ID))
            .expect("first");
        let mut second = version("k", NULL_VERSION_ID);
        second.size = 99;
        index.insert_version("b1", &second).expect("second");

        // One row only, not two.
        let page = index.list_versions("b1", "", "", "", "", 100).expect("list");
        assert_eq!(page.versions.len(), 1);
        assert_eq!(page.versions[0].size, 99);
    }

    #[test]
    fn test_should_mark_delete_and_hide_object() {
        let index = index_with_bucket("b1");
        index.insert_version("b1", &version("k", "v1")).expect("insert");
        index.mark_delete("b1", &marker("k", "dm1")).expect("mark");

        assert_eq!(latest_count(&index, "b1", "k"), 1);
        assert!(!index.object_exists("b1", "k").expect("exists"));

        let latest = index.get_version("b1", "k", None).expect("get");
        assert!(latest.is_delete_marker);
        assert_eq!(latest.version_id, "dm1");
    }

    #[test]
    fn test_should_promote_next_newest_on_remove() {
        let index = index_with_bucket("b1");
        let mut v1 = version("k", "v1");
        v1.last_modified = Utc::now() - Duration::seconds(20);
        let mut v2 = version("k", "v2");
        v2.last_modified = Utc::now() - Duration::seconds(10);
        let v3 = version("k", "v3");
        index.insert_version("b1", &v1).expect("v1");
        index.insert_version("b1", &v2).expect("v2");
        index.insert_version("b1", &v3).expect("v3");

        let removed = index.remove_version("b1", "k", "v3").expect("remove latest");
        assert!(removed.is_latest);
        assert!(!removed.is_delete_marker);

        let latest = index.get_version("b1", "k", None).expect("get");
        assert_eq!(latest.version_id, "v2");
        assert_eq!(latest_count(&index, "b1", "k"), 1);

        // Removing a non-latest version does not disturb the flag.
        index.remove_version("b1", "k", "v1").expect("remove old");
        assert_eq!(
            index.get_version("b1", "k", None).expect("get").version_id,
            "v2"
        );
    }

    #[test]
    fn test_should_report_missing_rows() {
        let index = index_with_bucket("b1");
        assert!(matches!(
            index.get_version("b1", "ghost", None),
            Err(IndexError::NoSuchKey(_))
        ));
        assert!(matches!(
            index.remove_version("b1", "ghost", "v1"),
            Err(IndexError::NoSuchKey(_))
        ));
        // Bucket errors take precedence over key errors.
        assert!(matches!(
            index.get_version("nope", "k", None),
            Err(IndexError::NoSuchBucket(_))
        ));
        assert!(matches!(
            index.list_objects("nope", "", "", "", 10),
            Err(IndexError::NoSuchBucket(_))
        ));
    }

    #[test]
    fn test_should_list_objects_in_key_order() {
        let index = index_with_bucket("b1");
        for key in ["delta", "alpha", "charlie", "bravo"] {
            index
                .insert_version("b1", &version(key, NULL_VERSION_ID))
                .expect("insert");
        }
        let page = index.list_objects("b1", "", "", "", 100).expect("list");
        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "bravo", "charlie", "delta"]);
        assert!(!page.is_truncated);
    }

    #[test]
    fn test_should_exclude_delete_markers_from_object_listing() {
        let index = index_with_bucket("b1");
        index.insert_version("b1", &version("keep", "v1")).expect("insert");
        index.insert_version("b1", &version("gone", "v1")).expect("insert");
        index.mark_delete("b1", &marker("gone", "dm1")).expect("mark");

        let page = index.list_objects("b1", "", "", "", 100).expect("list");
        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["keep"]);
    }

    #[test]
    fn test_should_paginate_with_markers() {
        let index = index_with_bucket("b1");
        for i in 0..7 {
            index
                .insert_version("b1", &version(&format!("key-{i}"), NULL_VERSION_ID))
                .expect("insert");
        }

        let page1 = index.list_objects("b1", "", "", "", 3).expect("page 1");
        assert_eq!(page1.objects.len(), 3);
        assert!(page1.is_truncated);
        let marker = page1.next_marker.clone().expect("marker");
        assert_eq!(marker, "key-2");

        let page2 = index
            .list_objects("b1", "", "", &marker, 3)
            .expect("page 2");
        assert_eq!(page2.objects[0].key, "key-3");
        assert!(page2.is_truncated);

        let page3 = index
            .list_objects("b1", "", "", page2.next_marker.as_deref().unwrap_or(""), 3)
            .expect("page 3");
        assert_eq!(page3.objects.len(), 1);
        assert!(!page3.is_truncated);
        assert!(page3.next_marker.is_none());
    }

    #[test]
    fn test_should_group_by_delimiter() {
        let index = index_with_bucket("b1");
        for key in [
            "photos/2023/jan.jpg",
            "photos/2023/feb.jpg",
            "photos/2024/mar.jpg",
            "docs/readme.txt",
            "top.txt",
        ] {
            index
                .insert_version("b1", &version(key, NULL_VERSION_ID))
                .expect("insert");
        }

        let page = index.list_objects("b1", "", "/", "", 100).expect("list");
        assert_eq!(page.common_prefixes, vec!["docs/", "photos/"]);
        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["top.txt"]);

        let page = index
            .list_objects("b1", "photos/", "/", "", 100)
            .expect("list");
        assert_eq!(page.common_prefixes, vec!["photos/2023/", "photos/2024/"]);
        assert!(page.objects.is_empty());

        let page = index
            .list_objects("b1", "photos/2023/", "/", "", 100)
            .expect("list");
        assert_eq!(page.objects.len(), 2);
        assert!(page.common_prefixes.is_empty());
    }

    #[test]
    fn test_should_list_versions_ascending_by_key_then_version() {
        let index = index_with_bucket("b1");
        index.insert_version("b1", &version("a", "v2")).expect("insert");
        index.insert_version("b1", &version("a", "v1")).expect("insert");
        index.insert_version("b1", &version("b", "v9")).expect("insert");
        index.mark_delete("b1", &marker("a", "v3")).expect("mark");

        let page = index.list_versions("b1", "", "", "", "", 100).expect("list");
        let entries: Vec<(String, String, bool)> = page
            .versions
            .iter()
            .map(|v| (v.key.clone(), v.version_id.clone(), v.is_delete_marker))
            .collect();
        assert_eq!(
            entries,
            vec![
                ("a".to_owned(), "v1".to_owned(), false),
                ("a".to_owned(), "v2".to_owned(), false),
                ("a".to_owned(), "v3".to_owned(), true),
                ("b".to_owned(), "v9".to_owned(), false),
            ]
        );
        // Exactly one is_latest per key.
        let latest: Vec<&str> = page
            .versions
            .iter()
            .filter(|v| v.is_latest)
            .map(|v| v.key.as_str())
            .collect();
        assert_eq!(latest, vec!["a", "b"]);
    }

    #[test]
    fn test_should_resume_versions_from_composite_marker() {
        let index = index_with_bucket("b1");
        for v in ["v1", "v2", "v3"] {
            index.insert_version("b1", &version("k", v)).expect("insert");
        }

        let page1 = index.list_versions("b1", "", "", "", "", 2).expect("page 1");
        assert_eq!(page1.versions.len(), 2);
        assert!(page1.is_truncated);
        assert_eq!(page1.next_key_marker.as_deref(), Some("k"));
        assert_eq!(page1.next_version_id_marker.as_deref(), Some("v2"));

        let page2 = index
            .list_versions("b1", "", "", "k", "v2", 2)
            .expect("page 2");
        assert_eq!(page2.versions.len(), 1);
        assert_eq!(page2.versions[0].version_id, "v3");
        assert!(!page2.is_truncated);
    }

    #[test]
    fn test_should_update_object_acl_and_tags() {
        let index = index_with_bucket("b1");
        index.insert_version("b1", &version("k", "v1")).expect("insert");

        let acl = AccessControlPolicy::canned(
            Owner {
                id: "o1".to_owned(),
                display_name: "alice".to_owned(),
            },
            CannedAcl::PublicRead,
        );
        index.set_object_acl("b1", "k", "v1", &acl).expect("acl");
        let tags = vec![Tag {
            key: "env".to_owned(),
            value: "prod".to_owned(),
        }];
        index.set_object_tags("b1", "k", "v1", &tags).expect("tags");

        let fetched = index.get_version("b1", "k", Some("v1")).expect("get");
        assert_eq!(fetched.acl, Some(acl));
        assert_eq!(fetched.tags, tags);

        assert!(matches!(
            index.set_object_tags("b1", "ghost", "v1", &tags),
            Err(IndexError::NoSuchKey(_))
        ));
    }
}
