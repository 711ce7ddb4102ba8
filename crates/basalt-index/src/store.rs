//! The [`Index`] handle and shared row helpers.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::debug;

use crate::error::{IndexError, IndexResult};
use crate::schema;

/// Handle to the metadata database.
///
/// Cheap to share behind an `Arc`; all access funnels through one
/// connection guarded by a mutex. Queries are short and indexed, and no
/// guard escapes a method, so callers never hold the lock across awaits.
pub struct Index {
    pub(crate) conn: Mutex<Connection>,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index").finish_non_exhaustive()
    }
}

impl Index {
    /// Open (creating if needed) the database at `path` and apply the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot
    /// be applied.
    pub fn open(path: &Path) -> IndexResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path))
    }

    /// Open an in-memory database. Used by tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn open_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<&Path>) -> IndexResult<Self> {
        conn.execute_batch(schema::PRAGMAS)?;
        conn.execute_batch(schema::SCHEMA)?;
        debug!(path = ?path, "metadata index ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

// ---------------------------------------------------------------------------
// Row helpers shared by the table modules
// ---------------------------------------------------------------------------

/// Format a timestamp for storage.
pub(crate) fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a stored timestamp.
pub(crate) fn ts_from_sql(s: &str) -> IndexResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| IndexError::Corrupt(format!("bad timestamp '{s}': {e}")))
}

/// Decode a JSON column.
pub(crate) fn json_from_sql<T: serde::de::DeserializeOwned>(s: &str) -> IndexResult<T> {
    serde_json::from_str(s).map_err(|e| IndexError::Corrupt(format!("bad JSON column: {e}")))
}

/// Encode a JSON column.
pub(crate) fn json_to_sql<T: serde::Serialize>(value: &T) -> IndexResult<String> {
    serde_json::to_string(value).map_err(|e| IndexError::Corrupt(format!("encode JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_open_in_memory_index() {
        let index = Index::open_in_memory().expect("open");
        assert!(format!("{index:?}").contains("Index"));
    }

    #[test]
    fn test_should_open_file_backed_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metadata.db");
        {
            let _index = Index::open(&path).expect("open");
        }
        // Reopening an existing database applies the schema idempotently.
        let _index = Index::open(&path).expect("reopen");
        assert!(path.exists());
    }

    #[test]
    fn test_should_roundtrip_timestamps() {
        let now = Utc::now();
        let parsed = ts_from_sql(&ts_to_sql(now)).expect("parse");
        assert_eq!(parsed, now);
    }

    #[test]
    fn test_should_reject_bad_timestamp() {
        assert!(matches!(
            ts_from_sql("not-a-time"),
            Err(IndexError::Corrupt(_))
        ));
    }
}
