//! The pluggable authenticator.
//!
//! Signature V4 cryptography is out of scope for this server: the
//! authenticator's contract is only to supply a [`Principal`]. The built-in
//! [`KeyAuthenticator`] extracts the access key id from a SigV4-shaped
//! `Authorization` header (or the `X-Amz-Credential` query parameter of a
//! presigned URL) and resolves it against the user table; requests without
//! either are anonymous.

use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;
use tracing::debug;

use basalt_index::Index;
use basalt_model::types::Principal;
use basalt_model::{S3Error, S3ErrorCode};

/// Supplies the acting principal for a request.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Resolve the request's principal.
    ///
    /// # Errors
    ///
    /// `InvalidAccessKeyId` for unknown keys; implementations verifying
    /// signatures may also answer `SignatureDoesNotMatch` or
    /// `ExpiredToken`.
    async fn authenticate(
        &self,
        headers: &HeaderMap,
        query: &[(String, String)],
    ) -> Result<Principal, S3Error>;
}

/// Extract the access key id from a SigV4 `Authorization` header:
/// `AWS4-HMAC-SHA256 Credential=<key>/<date>/<region>/s3/aws4_request, ...`.
#[must_use]
pub fn access_key_from_authorization(header: &str) -> Option<&str> {
    let credential = header
        .split(',')
        .map(str::trim)
        .find_map(|part| part.split_once("Credential=").map(|(_, rest)| rest))?;
    let key = credential.split('/').next()?;
    if key.is_empty() { None } else { Some(key) }
}

/// Extract the access key id from a presigned-URL `X-Amz-Credential`
/// query parameter.
#[must_use]
pub fn access_key_from_query(query: &[(String, String)]) -> Option<&str> {
    query
        .iter()
        .find(|(k, _)| k == "X-Amz-Credential")
        .and_then(|(_, v)| v.split('/').next())
        .filter(|key| !key.is_empty())
}

/// Access-key based authenticator backed by the user table.
#[derive(Debug, Clone)]
pub struct KeyAuthenticator {
    index: Arc<Index>,
}

impl KeyAuthenticator {
    /// Create an authenticator over the given index.
    #[must_use]
    pub fn new(index: Arc<Index>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Authenticator for KeyAuthenticator {
    async fn authenticate(
        &self,
        headers: &HeaderMap,
        query: &[(String, String)],
    ) -> Result<Principal, S3Error> {
        let access_key = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(access_key_from_authorization)
            .or_else(|| access_key_from_query(query));

        let Some(access_key) = access_key else {
            return Ok(Principal::Anonymous);
        };

        match self.index.find_user_by_access_key(access_key) {
            Ok(Some(user)) => {
                debug!(username = %user.username, "authenticated principal");
                Ok(Principal::user(user.canonical_id, user.username))
            }
            Ok(None) => Err(S3Error::new(S3ErrorCode::InvalidAccessKeyId)
                .with_resource(access_key.to_owned())),
            Err(e) => Err(e.into()),
        }
    }
}
