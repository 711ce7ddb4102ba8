//! Per-operation handlers, grouped by family.
//!
//! Every handler takes the shared state, the parsed request context, and
//! (where relevant) the body, and returns the transport-free
//! [`S3Response`](crate::request::S3Response). Authorization and the MFA
//! gate run in `dispatch` before any handler.

pub(crate) mod bucket;
pub(crate) mod bucket_config;
pub(crate) mod list;
pub(crate) mod multipart;
pub(crate) mod object;
pub(crate) mod object_config;
pub(crate) mod service;
pub(crate) mod util;
