//! The HTTP layer of Basalt.
//!
//! Routing resolves `(method, path, query)` to an operation through a
//! precomputed dispatch table; the hyper service threads the request
//! through authentication, the core dispatch pipeline, audit logging, and
//! the XML error envelope. Object bodies stream in both directions.

pub mod body;
pub mod response;
pub mod router;
pub mod service;

pub use body::S3ResponseBody;
pub use router::{Router, RoutingContext};
pub use service::BasaltService;
