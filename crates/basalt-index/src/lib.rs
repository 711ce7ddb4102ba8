//! The Basalt metadata index.
//!
//! One embedded SQLite database file holds everything that is not object
//! bytes: buckets and their configurations, object version rows, multipart
//! upload state, the audit log, batch jobs, and users. All multi-row
//! mutations run inside a transaction so the `is_latest` invariant — at
//! most one current row per (bucket, key), exactly one whenever any version
//! exists — can never be observed broken.
//!
//! The handle is synchronous by design: every call is a short, indexed
//! query guarded by a `parking_lot::Mutex`, and no guard is ever held
//! across an await point in the crates above.

pub mod audit;
pub mod bucket;
pub mod error;
pub mod jobs;
pub mod multipart;
pub mod object;
mod schema;
pub mod store;
pub mod users;

pub use audit::AuditFilter;
pub use error::{IndexError, IndexResult};
pub use object::{ListPage, VersionPage};
pub use store::Index;
pub use users::{ADMIN_USERNAME, UserRecord};
