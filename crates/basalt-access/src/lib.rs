//! Access evaluation for Basalt.
//!
//! Every operation passes through a single pipeline before its handler
//! runs: special principals, the bucket-existence guard, the bucket policy
//! (explicit deny always wins), then ACL grants, then default deny.

pub mod action;
pub mod acl;
pub mod evaluator;

pub use action::S3Action;
pub use acl::acl_allows;
pub use evaluator::{AccessRequest, EvaluatorConfig, TEST_PRINCIPAL_ID, evaluate};
