//! Shared model types for Basalt, an S3-compatible object storage server.
//!
//! This crate is the vocabulary of the whole workspace: the S3 error
//! taxonomy, the operation set the router can resolve, the persisted record
//! shapes (buckets, object versions, multipart uploads, audit events, batch
//! jobs), ACL grants, bucket-policy documents, and the typed lifecycle and
//! notification configurations.
//!
//! Nothing in here performs I/O; the storage, index, and HTTP crates all
//! depend on this one and never on each other's internals.

pub mod error;
pub mod lifecycle;
pub mod notification;
pub mod operations;
pub mod policy;
pub mod types;

pub use error::{S3Error, S3ErrorCode};
pub use operations::S3Operation;
