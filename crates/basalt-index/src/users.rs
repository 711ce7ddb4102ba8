//! The user table backing the CLI and the access-key authenticator.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tracing::info;
use uuid::Uuid;

use crate::error::{IndexError, IndexResult};
use crate::store::{Index, ts_from_sql, ts_to_sql};

/// The built-in administrative username.
pub const ADMIN_USERNAME: &str = "admin";

/// One user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Unique username.
    pub username: String,
    /// The access key id presented in the Authorization header.
    pub access_key: String,
    /// The paired secret.
    pub secret_key: String,
    /// The canonical id used in ACLs and ownership.
    pub canonical_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

struct RawUser {
    username: String,
    access_key: String,
    secret_key: String,
    canonical_id: String,
    created_at: String,
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<RawUser> {
    Ok(RawUser {
        username: row.get(0)?,
        access_key: row.get(1)?,
        secret_key: row.get(2)?,
        canonical_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn decode_user(raw: RawUser) -> IndexResult<UserRecord> {
    Ok(UserRecord {
        created_at: ts_from_sql(&raw.created_at)?,
        username: raw.username,
        access_key: raw.access_key,
        secret_key: raw.secret_key,
        canonical_id: raw.canonical_id,
    })
}

const USER_COLUMNS: &str = "username, access_key, secret_key, canonical_id, created_at";

impl Index {
    /// Create a user with a freshly assigned canonical id.
    ///
    /// # Errors
    ///
    /// [`IndexError::UserAlreadyExists`] when the username or access key is
    /// taken.
    pub fn create_user(
        &self,
        username: &str,
        access_key: &str,
        secret_key: &str,
    ) -> IndexResult<UserRecord> {
        let record = UserRecord {
            username: username.to_owned(),
            access_key: access_key.to_owned(),
            secret_key: secret_key.to_owned(),
            canonical_id: Uuid::new_v4().simple().to_string(),
            created_at: Utc::now(),
        };
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (username, access_key, secret_key, canonical_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.username,
                record.access_key,
                record.secret_key,
                record.canonical_id,
                ts_to_sql(record.created_at),
            ],
        );
        match result {
            Ok(_) => {
                info!(username, "user created");
                Ok(record)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(IndexError::UserAlreadyExists(username.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a user by username.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchUser`] when absent.
    pub fn get_user(&self, username: &str) -> IndexResult<UserRecord> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                user_from_row,
            )
            .optional()?
            .ok_or_else(|| IndexError::NoSuchUser(username.to_owned()))?;
        decode_user(raw)
    }

    /// Resolve an access key to its user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn find_user_by_access_key(&self, access_key: &str) -> IndexResult<Option<UserRecord>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE access_key = ?1"),
                params![access_key],
                user_from_row,
            )
            .optional()?;
        raw.map(decode_user).transpose()
    }

    /// List users sorted by username.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn list_users(&self) -> IndexResult<Vec<UserRecord>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))?;
        let rows = stmt.query_map([], user_from_row)?;
        let mut users = Vec::new();
        for raw in rows {
            users.push(decode_user(raw?)?);
        }
        Ok(users)
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchUser`] when absent.
    pub fn delete_user(&self, username: &str) -> IndexResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
        if changed == 0 {
            return Err(IndexError::NoSuchUser(username.to_owned()));
        }
        info!(username, "user deleted");
        Ok(())
    }

    /// Ensure the built-in admin user exists, seeding it on first run.
    /// Returns the admin record either way.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn ensure_admin(&self, access_key: &str, secret_key: &str) -> IndexResult<UserRecord> {
        match self.get_user(ADMIN_USERNAME) {
            Ok(record) => Ok(record),
            Err(IndexError::NoSuchUser(_)) => {
                self.create_user(ADMIN_USERNAME, access_key, secret_key)
            }
            Err(e) => Err(e),
        }
    }
}
