//! The Basalt request orchestrator.
//!
//! This crate ties the storage crates together into S3 semantics: the
//! per-operation handlers, the dispatch pipeline (authorize → MFA gate →
//! handle → notify), the multipart coordinator, the lifecycle janitor, the
//! pluggable authenticator, server configuration, and the metrics
//! registry. The HTTP crate above it only routes and translates; every
//! rule that makes this server behave like S3 lives here.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod janitor;
pub mod metrics;
pub mod multipart;
pub mod notify;
mod ops;
pub mod request;
pub mod state;
pub mod validation;

pub use auth::{Authenticator, KeyAuthenticator};
pub use config::ServerConfig;
pub use dispatch::{action_for, handle};
pub use request::{RequestBody, RequestContext, ResponseBody, S3Response};
pub use state::ServiceState;
