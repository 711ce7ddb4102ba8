//! S3 RestXml handling for Basalt.
//!
//! All non-error list/config responses are XML in the
//! `http://s3.amazonaws.com/doc/2006-03-01/` namespace; requests like bulk
//! delete, multipart completion, and configuration puts carry XML bodies.
//! Serialization and deserialization are hand-rolled over `quick-xml`
//! events — the S3 dialect (attribute-typed grantees, repeated elements,
//! optional wrappers) does not map cleanly onto serde.

pub mod deserialize;
pub mod error;
pub mod responses;
pub mod serialize;

pub use deserialize::{S3Deserialize, from_xml};
pub use error::{XmlError, error_to_xml};
pub use serialize::{S3Serialize, to_xml};
