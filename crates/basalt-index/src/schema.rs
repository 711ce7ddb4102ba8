//! Database schema.
//!
//! Composite primary keys mirror the identifying tuples of the data model;
//! object and config rows cascade away with their bucket.

/// Pragmas applied to every connection.
pub(crate) const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;
    PRAGMA synchronous = NORMAL;
";

/// Schema DDL, idempotent.
pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS buckets (
    name            TEXT PRIMARY KEY,
    region          TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    owner_id        TEXT NOT NULL,
    owner_display   TEXT NOT NULL,
    versioning      TEXT NOT NULL DEFAULT 'Unversioned',
    mfa_delete      INTEGER NOT NULL DEFAULT 0,
    acl             TEXT NOT NULL,
    tags            TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS bucket_configs (
    bucket          TEXT NOT NULL REFERENCES buckets(name) ON DELETE CASCADE,
    kind            TEXT NOT NULL,
    document        TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    PRIMARY KEY (bucket, kind)
);

CREATE TABLE IF NOT EXISTS object_versions (
    bucket          TEXT NOT NULL REFERENCES buckets(name) ON DELETE CASCADE,
    key             TEXT NOT NULL,
    version_id      TEXT NOT NULL,
    size            INTEGER NOT NULL,
    etag            TEXT NOT NULL,
    last_modified   TEXT NOT NULL,
    is_latest       INTEGER NOT NULL,
    is_delete_marker INTEGER NOT NULL,
    storage_class   TEXT NOT NULL DEFAULT 'STANDARD',
    owner_id        TEXT NOT NULL,
    owner_display   TEXT NOT NULL,
    metadata        TEXT NOT NULL DEFAULT '{}',
    checksum_algorithm TEXT,
    checksum_value  TEXT,
    parts_count     INTEGER,
    acl             TEXT,
    tags            TEXT NOT NULL DEFAULT '[]',
    PRIMARY KEY (bucket, key, version_id)
);

CREATE INDEX IF NOT EXISTS idx_versions_latest
    ON object_versions (bucket, key, is_latest);

CREATE TABLE IF NOT EXISTS multipart_uploads (
    upload_id       TEXT PRIMARY KEY,
    bucket          TEXT NOT NULL REFERENCES buckets(name) ON DELETE CASCADE,
    key             TEXT NOT NULL,
    initiated_at    TEXT NOT NULL,
    owner_id        TEXT NOT NULL,
    owner_display   TEXT NOT NULL,
    metadata        TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS multipart_parts (
    upload_id       TEXT NOT NULL REFERENCES multipart_uploads(upload_id) ON DELETE CASCADE,
    part_number     INTEGER NOT NULL,
    size            INTEGER NOT NULL,
    etag            TEXT NOT NULL,
    uploaded_at     TEXT NOT NULL,
    PRIMARY KEY (upload_id, part_number)
);

CREATE TABLE IF NOT EXISTS audit_events (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    id              TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    event_type      TEXT NOT NULL,
    principal       TEXT NOT NULL,
    source_ip       TEXT,
    user_agent      TEXT,
    request_id      TEXT NOT NULL,
    bucket          TEXT,
    key             TEXT,
    operation       TEXT NOT NULL,
    status          INTEGER NOT NULL,
    error_message   TEXT,
    additional_data TEXT
);

CREATE TABLE IF NOT EXISTS batch_jobs (
    id              TEXT PRIMARY KEY,
    operation_type  TEXT NOT NULL,
    parameters      TEXT NOT NULL DEFAULT '{}',
    manifest_location TEXT NOT NULL,
    status          TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    completed_at    TEXT,
    failure_reasons TEXT NOT NULL DEFAULT '[]',
    progress_total  INTEGER NOT NULL DEFAULT 0,
    progress_processed INTEGER NOT NULL DEFAULT 0,
    progress_failed INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS users (
    username        TEXT PRIMARY KEY,
    access_key      TEXT NOT NULL UNIQUE,
    secret_key      TEXT NOT NULL,
    canonical_id    TEXT NOT NULL UNIQUE,
    created_at      TEXT NOT NULL
);
";
