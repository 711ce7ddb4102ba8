//! Data-path storage for Basalt.
//!
//! Object bytes live in a content-addressed directory tree under a single
//! configurable root; multipart parts are staged per upload id next to it.
//! Writes go through a temp file and an atomic rename, computing MD5 (the
//! ETag) and SHA-256 (for the `x-amz-content-sha256` check) on the fly, so
//! a partially written blob is never observable — not even after a crash.
//!
//! ```text
//! <root>/objects/<bucket>/<hh>/<sha256(key, version)>.dat
//! <root>/multipart/<upload-id>/<part-number>.part
//! ```
//!
//! All reads and writes are streaming: the request body is consumed as a
//! pull-based chunk stream, and GET responses are produced the same way, so
//! backpressure propagates from the socket to the disk in both directions.

pub mod datapath;
pub mod etag;
pub mod layout;
pub mod range;

pub use datapath::{ByteStream, DataStore, StoreError, WriteOutcome, bytes_stream};
pub use range::{RangeSpec, parse_range_header, resolve_range};
